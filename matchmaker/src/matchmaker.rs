//! Workflow coordinator
//!
//! Each public method is one scheduled or user-triggered job: member sync,
//! a pairing round, channel reconciliation, reminders, and meeting
//! confirmation. Per-item failures are logged and counted so one bad member
//! or channel never aborts the whole job.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use shared::{
    ChannelId, ExternalGroup, Job, Match, MatchId, Member, PlatformUserId, job_debug, job_error, job_info, job_warn,
    logging,
};

use crate::core::{Announcement, GroupIndex, MatchSignature, PoolOrder, ReconcileMode, reconcile};
use crate::engine::{PairingEngine, RoundReport};
use crate::error::{MatchmakerError, MatchmakerResult};
use crate::traits::{GroupDirectory, MemberStore, Notifier};

/// How a pairing round treats the previous round and the summary post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOptions {
    /// Supersede the current matches before pairing
    pub retire_current: bool,
    /// Where to post the round summary, if anywhere
    pub summary_channel: Option<ChannelId>,
}

impl Default for RoundOptions {
    fn default() -> Self {
        Self {
            retire_current: true,
            summary_channel: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub synced: usize,
    pub skipped: usize,
    pub deactivated: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoundSummary {
    pub retired: usize,
    pub report: RoundReport,
    /// Matches whose group channel could not be opened or recorded
    pub channel_failures: Vec<MatchId>,
    pub notify_failures: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub mode: String,
    pub groups_seen: usize,
    pub resolved: Vec<(MatchId, ChannelId)>,
    pub unresolved: Vec<MatchId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReminderSummary {
    pub sent: Vec<MatchId>,
    pub skipped_without_channel: Vec<MatchId>,
    pub failed: Vec<MatchId>,
}

/// Coordinates the store, the chat platform and notifications
pub struct Matchmaker<S, D, N>
where
    S: MemberStore + 'static,
    D: GroupDirectory + 'static,
    N: Notifier + 'static,
{
    store: Arc<S>,
    directory: D,
    notifier: N,
    engine: PairingEngine<S>,
    /// Configured identity of the bot; looked up on demand when absent
    system_identity: Option<PlatformUserId>,
}

impl<S, D, N> Matchmaker<S, D, N>
where
    S: MemberStore + 'static,
    D: GroupDirectory + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, directory: D, notifier: N, order: Box<dyn PoolOrder>) -> Self {
        let engine = PairingEngine::new(Arc::clone(&store), order);
        Self {
            store,
            directory,
            notifier,
            engine,
            system_identity: None,
        }
    }

    pub fn with_system_identity(mut self, identity: Option<PlatformUserId>) -> Self {
        self.system_identity = identity;
        self
    }

    pub fn engine(&self) -> &PairingEngine<S> {
        &self.engine
    }

    /// Mirror the channel's membership into the store
    pub async fn sync_members(&self, channel: &ChannelId) -> MatchmakerResult<SyncReport> {
        let platform_ids = self.directory.group_members(channel).await?;
        job_info!(Job::current(), "Syncing {} users in {}", platform_ids.len(), channel);

        let mut report = SyncReport::default();
        for platform_id in &platform_ids {
            let profile = match self.directory.user_profile(platform_id).await {
                Ok(profile) => profile,
                Err(e) => {
                    job_warn!(Job::current(), "Skipping {}: profile fetch failed: {}", platform_id, e);
                    report.skipped += 1;
                    continue;
                }
            };
            if !profile.is_matchable() {
                job_debug!(Job::current(), "Skipping {} (bot, deleted or no e-mail)", platform_id);
                report.skipped += 1;
                continue;
            }
            self.store.upsert_member(&profile).await?;
            report.synced += 1;
        }

        // Skipped users are still in the channel and keep their current state
        report.deactivated = self.store.deactivate_members_not_in(&platform_ids).await?;
        logging::log_success(
            Job::current(),
            &format!(
                "Synced {} members ({} skipped, {} deactivated)",
                report.synced, report.skipped, report.deactivated
            ),
        );
        Ok(report)
    }

    /// Pair the available pool, then open and announce a group per match
    pub async fn run_pairing_round(&self, options: &RoundOptions) -> MatchmakerResult<RoundSummary> {
        let mut summary = RoundSummary::default();
        if options.retire_current {
            summary.retired = self.store.retire_current_matches().await?;
            job_info!(Job::current(), "Retired {} matches from the previous round", summary.retired);
        }

        summary.report = self.engine.create_matches().await?;

        for record in &summary.report.created {
            let members = match self.store.members_by_id(record.members.members()).await {
                Ok(members) => members,
                Err(e) => {
                    job_warn!(Job::current(), "Could not load members of match {}: {}", record.id, e);
                    summary.channel_failures.push(record.id);
                    continue;
                }
            };

            let channel = match self.open_channel(record, &members).await {
                Ok(channel) => channel,
                Err(e) => {
                    job_warn!(Job::current(), "No channel for match {} (left for reconciliation): {}", record.id, e);
                    summary.channel_failures.push(record.id);
                    continue;
                }
            };

            let announcement = Announcement::for_members(&members);
            if let Err(e) = self.notifier.announce_match(&channel, &announcement).await {
                job_warn!(Job::current(), "Announcement for match {} failed: {}", record.id, e);
                summary.notify_failures += 1;
            }
        }

        if let Some(channel) = &options.summary_channel {
            if let Err(e) = self.notifier.post_round_summary(channel, summary.report.created.len()).await {
                job_warn!(Job::current(), "Round summary post failed: {}", e);
                summary.notify_failures += 1;
            }
        }

        logging::log_success(
            Job::current(),
            &format!(
                "Round done: {} matches, {} without channel",
                summary.report.created.len(),
                summary.channel_failures.len()
            ),
        );
        Ok(summary)
    }

    async fn open_channel(&self, record: &Match, members: &[Member]) -> MatchmakerResult<ChannelId> {
        let platform_ids = platform_ids(record, members)?;
        let channel = self.directory.open_group(&platform_ids).await?;
        self.store.set_channel(record.id, &channel).await?;
        job_debug!(Job::current(), "Match {} -> channel {}", record.id, channel);
        Ok(channel)
    }

    /// Every group the bot belongs to, with its membership
    ///
    /// A group whose membership cannot be fetched is left out of this run.
    pub async fn collect_groups(&self) -> MatchmakerResult<Vec<ExternalGroup>> {
        let mut groups = Vec::new();
        let mut cursor = None;
        loop {
            let page = self.directory.list_groups(cursor).await?;
            for group_id in page.group_ids {
                match self.directory.group_members(&group_id).await {
                    Ok(members) => groups.push(ExternalGroup { id: group_id, members }),
                    Err(e) => job_warn!(Job::current(), "Excluding group {}: {}", group_id, e),
                }
            }
            cursor = page.next_cursor.filter(|c| !c.is_empty());
            if cursor.is_none() {
                break;
            }
        }
        job_debug!(Job::current(), "Collected {} groups", groups.len());
        Ok(groups)
    }

    async fn system_identity(&self) -> MatchmakerResult<PlatformUserId> {
        match &self.system_identity {
            Some(identity) => Ok(identity.clone()),
            None => self.directory.whoami().await,
        }
    }

    /// Recover channel ids for matches that never recorded one
    pub async fn reconcile_channels(&self, mode: ReconcileMode) -> MatchmakerResult<ReconcileSummary> {
        let mut summary = ReconcileSummary {
            mode: mode.to_string(),
            ..ReconcileSummary::default()
        };

        let pending = self.store.matches_without_channel().await?;
        if pending.is_empty() {
            job_info!(Job::current(), "Every match already has a channel");
            return Ok(summary);
        }

        let mut signatures = Vec::with_capacity(pending.len());
        for record in &pending {
            let members = self.store.members_by_id(record.members.members()).await?;
            match platform_ids(record, &members) {
                Ok(ids) => signatures.push(MatchSignature::new(record.id, ids)),
                Err(e) => {
                    job_debug!(Job::current(), "Match {} cannot be reconciled: {}", record.id, e);
                    summary.unresolved.push(record.id);
                }
            }
        }

        let identity = self.system_identity().await?;
        let groups = self.collect_groups().await?;
        summary.groups_seen = groups.len();
        let index = GroupIndex::new(&groups, Some(&identity));

        let outcome = reconcile(&index, &signatures, mode);
        summary.unresolved.extend(outcome.unresolved);
        for (match_id, channel) in outcome.resolved {
            match self.store.set_channel(match_id, &channel).await {
                Ok(()) => summary.resolved.push((match_id, channel)),
                Err(e) => {
                    job_error!(Job::current(), "Could not record channel {} for match {}: {}", channel, match_id, e);
                    summary.unresolved.push(match_id);
                }
            }
        }
        summary.unresolved.sort();

        if !summary.unresolved.is_empty() {
            let names: Vec<String> = summary.unresolved.iter().map(MatchId::to_string).collect();
            job_warn!(Job::current(), "Unresolved matches: {}", names.join(", "));
        }
        logging::log_success(
            Job::current(),
            &format!(
                "Reconciled {} of {} matches ({} mode)",
                summary.resolved.len(),
                pending.len(),
                mode
            ),
        );
        Ok(summary)
    }

    /// Nudge groups of current, unmet matches older than `older_than`
    pub async fn send_reminders(&self, older_than: Duration) -> MatchmakerResult<ReminderSummary> {
        let cutoff = Utc::now().checked_sub_signed(older_than).ok_or_else(|| {
            MatchmakerError::config("reminder age", format!("{} days is out of range", older_than.num_days()))
        })?;
        let due = self.store.pending_reminders(cutoff).await?;

        let mut summary = ReminderSummary::default();
        for record in due {
            let Some(channel) = record.channel_id.as_ref().filter(|_| record.has_channel()) else {
                summary.skipped_without_channel.push(record.id);
                continue;
            };
            match self.notifier.send_reminder(channel, record.id).await {
                Ok(()) => summary.sent.push(record.id),
                Err(e) => {
                    job_warn!(Job::current(), "Reminder for match {} failed: {}", record.id, e);
                    summary.failed.push(record.id);
                }
            }
        }

        if !summary.skipped_without_channel.is_empty() {
            let names: Vec<String> = summary.skipped_without_channel.iter().map(MatchId::to_string).collect();
            job_warn!(Job::current(), "No channel recorded for matches: {}", names.join(", "));
        }
        job_info!(
            Job::current(),
            "Reminders: {} sent, {} skipped, {} failed",
            summary.sent.len(),
            summary.skipped_without_channel.len(),
            summary.failed.len()
        );
        Ok(summary)
    }

    /// Mark a match as met and remember every pair in it
    pub async fn confirm_meeting(&self, match_id: MatchId) -> MatchmakerResult<Match> {
        let now = Utc::now();
        let record = self.store.set_met(match_id, Some(now)).await?;
        for pair in record.members.pairs() {
            self.store.record_meeting(pair, now).await?;
        }
        job_info!(Job::current(), "Match {} confirmed as met", match_id);
        Ok(record)
    }

    /// Undo a confirmation
    pub async fn revert_meeting(&self, match_id: MatchId) -> MatchmakerResult<Match> {
        let record = self.store.set_met(match_id, None).await?;
        for pair in record.members.pairs() {
            self.store.forget_meeting(pair).await?;
        }
        job_info!(Job::current(), "Match {} reverted to pending", match_id);
        Ok(record)
    }

    /// Confirm or revert the current match of a platform user
    pub async fn confirm_for_user(&self, platform_id: &PlatformUserId, met: bool) -> MatchmakerResult<Match> {
        let member = self
            .store
            .member_by_platform_id(platform_id)
            .await?
            .ok_or_else(|| MatchmakerError::MemberNotFound {
                reference: platform_id.to_string(),
            })?;
        let current = self
            .store
            .current_match_for(member.id)
            .await?
            .ok_or_else(|| MatchmakerError::NoCurrentMatch {
                reference: platform_id.to_string(),
            })?;

        if met {
            self.confirm_meeting(current.id).await
        } else {
            self.revert_meeting(current.id).await
        }
    }
}

/// Platform ids of every member of `record`, failing if any is missing
fn platform_ids(record: &Match, members: &[Member]) -> MatchmakerResult<Vec<PlatformUserId>> {
    let mut ids = Vec::with_capacity(record.members.len());
    for member_id in record.members.members() {
        let platform_id = members
            .iter()
            .find(|m| m.id == *member_id)
            .and_then(|m| m.platform_id.clone())
            .ok_or_else(|| MatchmakerError::MemberNotFound {
                reference: format!("platform id of member {member_id}"),
            })?;
        ids.push(platform_id);
    }
    Ok(ids)
}
