//! Pairing engine: one introduction round from pool to persisted matches
//!
//! Rounds are serialized by a lock shared between clones of the engine, so
//! two rounds in the same process never read the same available pool. The
//! store's own transactional guard covers concurrent processes.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use shared::{Job, Match, MemberId, MemberSet, job_debug, job_info, job_warn};
use tokio::sync::Mutex;

use crate::core::{PoolOrder, ShuffledOrder, plan_round};
use crate::error::MatchmakerResult;
use crate::traits::MemberStore;

/// A planned group whose persistence failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedMatch {
    pub members: MemberSet,
    pub error: String,
}

/// What one call to `create_matches` did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoundReport {
    pub created: Vec<Match>,
    pub unmatched: Vec<MemberId>,
    pub failed: Vec<FailedMatch>,
}

pub struct PairingEngine<S>
where
    S: MemberStore + 'static,
{
    store: Arc<S>,
    order: Arc<dyn PoolOrder>,
    round_lock: Arc<Mutex<()>>,
}

impl<S> Clone for PairingEngine<S>
where
    S: MemberStore + 'static,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            order: Arc::clone(&self.order),
            round_lock: Arc::clone(&self.round_lock),
        }
    }
}

impl<S> PairingEngine<S>
where
    S: MemberStore + 'static,
{
    pub fn new(store: Arc<S>, order: Box<dyn PoolOrder>) -> Self {
        Self {
            store,
            order: Arc::from(order),
            round_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Engine with a shuffled traversal order
    pub fn shuffled(store: Arc<S>) -> Self {
        Self::new(store, Box::new(ShuffledOrder))
    }

    /// Run one round: read pool and history, allocate, persist every group.
    ///
    /// Reading the pool or history is all-or-nothing. Persisting is not: a
    /// group that fails to save is reported in `failed` and the others stand.
    pub async fn create_matches(&self) -> MatchmakerResult<RoundReport> {
        let _round = self.round_lock.lock().await;

        let mut pool = self.store.available_members().await?;
        let history = self.store.meeting_history().await?;
        job_debug!(
            Job::current(),
            "Pool has {} available members, history has {} pairs",
            pool.len(),
            history.len()
        );

        self.order.arrange(&mut pool);
        let plan = plan_round(pool, &history);

        let matched_at = Utc::now();
        let mut report = RoundReport {
            unmatched: plan.unmatched,
            ..RoundReport::default()
        };

        for group in plan.groups {
            match self.store.create_match(&group, matched_at).await {
                Ok(record) => {
                    job_debug!(Job::current(), "Created match {} for {}", record.id, group);
                    report.created.push(record);
                }
                Err(e) => {
                    job_warn!(Job::current(), "Could not persist group {}: {}", group, e);
                    report.failed.push(FailedMatch {
                        members: group,
                        error: e.to_string(),
                    });
                }
            }
        }

        job_info!(
            Job::current(),
            "☕ Round complete: {} created, {} unmatched, {} failed",
            report.created.len(),
            report.unmatched.len(),
            report.failed.len()
        );
        Ok(report)
    }
}
