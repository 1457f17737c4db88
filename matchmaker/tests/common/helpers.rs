//! Test helpers and builder patterns for matchmaker tests
//!
//! The store is always a real in-memory SQLite database; the directory and
//! notifier are mocks with permissive defaults unless a test configures them.

use std::sync::Arc;

use matchmaker::core::ListedOrder;
use matchmaker::services::SqliteStore;
use matchmaker::{
    GroupPage, Matchmaker, MatchmakerError, MemberStore, MockGroupDirectory, MockNotifier, RoundOptions,
};
use shared::{ChannelId, ExternalGroup, Member, MemberProfile, PlatformUserId};

use super::fixtures::TestFixtures;

/// Type alias for a matchmaker over a real store and mocked platform
pub type TestMatchmaker = Matchmaker<SqliteStore, MockGroupDirectory, MockNotifier>;

/// Builder pattern for creating test matchmakers with sensible defaults
pub struct MatchmakerBuilder {
    store: Arc<SqliteStore>,
    directory: MockGroupDirectory,
    directory_configured: bool,
    notifier: MockNotifier,
    notifier_configured: bool,
    identity: Option<PlatformUserId>,
}

impl MatchmakerBuilder {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self {
            store,
            directory: MockGroupDirectory::new(),
            directory_configured: false,
            notifier: MockNotifier::new(),
            notifier_configured: false,
            identity: Some(PlatformUserId::new(TestFixtures::BOT)),
        }
    }

    /// Configure the directory mock; replaces the default behaviour
    pub fn with_directory<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(&mut MockGroupDirectory),
    {
        setup(&mut self.directory);
        self.directory_configured = true;
        self
    }

    /// Configure the notifier mock; replaces the default behaviour
    pub fn with_notifier<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(&mut MockNotifier),
    {
        setup(&mut self.notifier);
        self.notifier_configured = true;
        self
    }

    /// Leave the system identity to `whoami`
    pub fn without_configured_identity(mut self) -> Self {
        self.identity = None;
        self
    }

    pub fn build(mut self) -> TestMatchmaker {
        if !self.directory_configured {
            TestHelpers::opening_directory(&mut self.directory);
        }
        if !self.notifier_configured {
            TestHelpers::accepting_notifier(&mut self.notifier);
        }
        Matchmaker::new(self.store, self.directory, self.notifier, Box::new(ListedOrder))
            .with_system_identity(self.identity)
    }
}

/// Helper functions for common test operations
pub struct TestHelpers;

impl TestHelpers {
    /// In-memory store with fixture members 1..=count synced
    pub async fn seeded_store(count: usize) -> (Arc<SqliteStore>, Vec<Member>) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let mut members = Vec::with_capacity(count);
        for n in 1..=count {
            members.push(store.upsert_member(&TestFixtures::profile(n)).await.unwrap());
        }
        (store, members)
    }

    /// Channel id the default directory hands out for a set of users
    pub fn channel_for(users: &[PlatformUserId]) -> ChannelId {
        let ids: Vec<&str> = users.iter().map(PlatformUserId::as_str).collect();
        ChannelId::new(format!("G-{}", ids.join("-")))
    }

    /// Directory that opens a deterministic group for any set of users
    pub fn opening_directory(directory: &mut MockGroupDirectory) {
        directory
            .expect_open_group()
            .returning(|users| Ok(Self::channel_for(users)))
            .times(0..);
    }

    /// Directory serving a fixed group listing in a single page
    pub fn listing_directory(directory: &mut MockGroupDirectory, groups: Vec<ExternalGroup>) {
        let ids: Vec<ChannelId> = groups.iter().map(|g| g.id.clone()).collect();
        directory.expect_list_groups().returning(move |_| {
            Ok(GroupPage {
                group_ids: ids.clone(),
                next_cursor: None,
            })
        });
        directory.expect_group_members().returning(move |channel| {
            groups
                .iter()
                .find(|g| &g.id == channel)
                .map(|g| g.members.clone())
                .ok_or_else(|| MatchmakerError::platform("conversations.members", "channel_not_found"))
        });
    }

    /// Directory returning the given channel members and profiles
    pub fn syncing_directory(directory: &mut MockGroupDirectory, profiles: Vec<MemberProfile>) {
        let ids: Vec<PlatformUserId> = profiles.iter().map(|p| p.platform_id.clone()).collect();
        directory.expect_group_members().returning(move |_| Ok(ids.clone()));
        directory.expect_user_profile().returning(move |user| {
            profiles
                .iter()
                .find(|p| &p.platform_id == user)
                .cloned()
                .ok_or_else(|| MatchmakerError::platform("users.info", "user_not_found"))
        });
    }

    /// Notifier that accepts every message
    pub fn accepting_notifier(notifier: &mut MockNotifier) {
        notifier.expect_announce_match().returning(|_, _| Ok(())).times(0..);
        notifier.expect_send_reminder().returning(|_, _| Ok(())).times(0..);
        notifier.expect_post_round_summary().returning(|_, _| Ok(())).times(0..);
    }

    pub fn default_round() -> RoundOptions {
        RoundOptions::default()
    }
}
