//! Trait definitions with mockall annotations for testing
//!
//! These traits are the seams between the matching logic and the outside
//! world: the member/match store, the external group directory, and the
//! notification boundary. Production implementations live in `services`.

use chrono::{DateTime, Utc};
use shared::{ChannelId, Match, MatchId, Member, MemberId, MemberPair, MemberProfile, MemberSet, PlatformUserId};

use crate::core::{Announcement, MeetingHistory};
use crate::error::MatchmakerResult;

/// One page of the external group listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupPage {
    pub group_ids: Vec<ChannelId>,
    /// None (or empty) when this is the last page
    pub next_cursor: Option<String>,
}

/// Member and match persistence
///
/// Implementations must keep "at most one current match per member" as a
/// transactional invariant: `create_match` fails with `AlreadyMatched` rather
/// than double-booking anyone.
#[mockall::automock]
#[async_trait::async_trait]
pub trait MemberStore: Send + Sync {
    /// Active members without a current match, in store order
    async fn available_members(&self) -> MatchmakerResult<Vec<MemberId>>;

    /// Every pair that has already met
    async fn meeting_history(&self) -> MatchmakerResult<MeetingHistory>;

    /// Record a meeting; recording it again has no effect
    async fn record_meeting(&self, pair: MemberPair, met_at: DateTime<Utc>) -> MatchmakerResult<()>;

    /// Remove a recorded meeting (used when a confirmation is reverted)
    async fn forget_meeting(&self, pair: MemberPair) -> MatchmakerResult<()>;

    /// Persist a new current match
    async fn create_match(&self, members: &MemberSet, matched_at: DateTime<Utc>) -> MatchmakerResult<Match>;

    /// Mark every current match as superseded; returns how many were retired
    async fn retire_current_matches(&self) -> MatchmakerResult<usize>;

    async fn get_match(&self, match_id: MatchId) -> MatchmakerResult<Option<Match>>;

    async fn current_match_for(&self, member_id: MemberId) -> MatchmakerResult<Option<Match>>;

    async fn set_channel(&self, match_id: MatchId, channel: &ChannelId) -> MatchmakerResult<()>;

    /// Matches with no (or a blank) external channel id, oldest first
    async fn matches_without_channel(&self) -> MatchmakerResult<Vec<Match>>;

    /// Set or clear the met flag together with its confirmation time
    async fn set_met(&self, match_id: MatchId, met_at: Option<DateTime<Utc>>) -> MatchmakerResult<Match>;

    /// Current, unmet matches created at or before `cutoff`
    async fn pending_reminders(&self, cutoff: DateTime<Utc>) -> MatchmakerResult<Vec<Match>>;

    async fn members_by_id(&self, ids: &[MemberId]) -> MatchmakerResult<Vec<Member>>;

    async fn member_by_platform_id(&self, platform_id: &PlatformUserId) -> MatchmakerResult<Option<Member>>;

    /// Insert or refresh a member from its platform profile, marking it active
    async fn upsert_member(&self, profile: &MemberProfile) -> MatchmakerResult<Member>;

    /// Deactivate synced members whose platform id is not in `keep`
    async fn deactivate_members_not_in(&self, keep: &[PlatformUserId]) -> MatchmakerResult<usize>;
}

/// External group directory (the chat platform)
#[mockall::automock]
#[async_trait::async_trait]
pub trait GroupDirectory: Send + Sync {
    /// Identity the directory is accessed as (the system member of every group)
    async fn whoami(&self) -> MatchmakerResult<PlatformUserId>;

    /// One page of groups the calling identity belongs to
    async fn list_groups(&self, cursor: Option<String>) -> MatchmakerResult<GroupPage>;

    /// Member ids of a group
    async fn group_members(&self, channel: &ChannelId) -> MatchmakerResult<Vec<PlatformUserId>>;

    /// Open (or reopen) a group conversation with the given users
    async fn open_group(&self, members: &[PlatformUserId]) -> MatchmakerResult<ChannelId>;

    async fn user_profile(&self, user: &PlatformUserId) -> MatchmakerResult<MemberProfile>;
}

/// Notification boundary; failures never affect persisted matches
#[mockall::automock]
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn announce_match(&self, channel: &ChannelId, announcement: &Announcement) -> MatchmakerResult<()>;

    async fn send_reminder(&self, channel: &ChannelId, match_id: MatchId) -> MatchmakerResult<()>;

    async fn post_round_summary(&self, channel: &ChannelId, created: usize) -> MatchmakerResult<()>;
}
