//! Group identity reconciliation
//!
//! Maps a match back to the external group it produced by comparing member
//! sets only. The system identity (the bot that is part of every group it
//! opened) is removed from each group before any comparison.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shared::{ChannelId, ExternalGroup, MatchId, PlatformUserId};

/// Acceptance rule for a candidate group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileMode {
    /// Cleaned membership must equal the match exactly
    Strict,
    /// Smallest cleaned membership containing the match; exact size wins at once
    BestFit,
}

impl fmt::Display for ReconcileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileMode::Strict => write!(f, "strict"),
            ReconcileMode::BestFit => write!(f, "best-fit"),
        }
    }
}

impl FromStr for ReconcileMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" | "exact" => Ok(ReconcileMode::Strict),
            "best-fit" | "bestfit" | "best_fit" => Ok(ReconcileMode::BestFit),
            _ => Err(format!("Unknown reconcile mode: {s}")),
        }
    }
}

/// Platform identities of one match awaiting a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSignature {
    pub match_id: MatchId,
    members: Vec<PlatformUserId>,
}

impl MatchSignature {
    pub fn new(match_id: MatchId, mut members: Vec<PlatformUserId>) -> Self {
        members.sort();
        members.dedup();
        Self { match_id, members }
    }

    pub fn members(&self) -> &[PlatformUserId] {
        &self.members
    }
}

#[derive(Debug, Clone)]
struct CleanedGroup {
    id: ChannelId,
    members: Vec<PlatformUserId>,
}

/// External groups cleaned once per run, in fetch order
#[derive(Debug, Clone, Default)]
pub struct GroupIndex {
    groups: Vec<CleanedGroup>,
}

impl GroupIndex {
    pub fn new(groups: &[ExternalGroup], system_identity: Option<&PlatformUserId>) -> Self {
        let groups = groups
            .iter()
            .filter_map(|group| {
                let mut members: Vec<PlatformUserId> = group
                    .members
                    .iter()
                    .filter(|member| Some(*member) != system_identity)
                    .cloned()
                    .collect();
                members.sort();
                members.dedup();
                (!members.is_empty()).then(|| CleanedGroup {
                    id: group.id.clone(),
                    members,
                })
            })
            .collect();
        Self { groups }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Find the group for a sorted member set; ties go to the first group fetched
    pub fn find(&self, wanted: &[PlatformUserId], mode: ReconcileMode) -> Option<&ChannelId> {
        if wanted.is_empty() {
            return None;
        }
        match mode {
            ReconcileMode::Strict => self
                .groups
                .iter()
                .find(|group| group.members.as_slice() == wanted)
                .map(|group| &group.id),
            ReconcileMode::BestFit => {
                let mut best: Option<&CleanedGroup> = None;
                for group in &self.groups {
                    let contains_all = wanted
                        .iter()
                        .all(|member| group.members.binary_search(member).is_ok());
                    if !contains_all {
                        continue;
                    }
                    if best.map_or(true, |current| group.members.len() < current.members.len()) {
                        best = Some(group);
                        if group.members.len() == wanted.len() {
                            break;
                        }
                    }
                }
                best.map(|group| &group.id)
            }
        }
    }
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub resolved: Vec<(MatchId, ChannelId)>,
    pub unresolved: Vec<MatchId>,
}

pub fn reconcile(index: &GroupIndex, signatures: &[MatchSignature], mode: ReconcileMode) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();
    for signature in signatures {
        match index.find(signature.members(), mode) {
            Some(channel) => outcome.resolved.push((signature.match_id, channel.clone())),
            None => outcome.unresolved.push(signature.match_id),
        }
    }
    outcome
}
