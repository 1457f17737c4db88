//! Test fixtures and data for matchmaker tests

use shared::{ExternalGroup, MemberProfile, PlatformUserId};

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    /// Bot identity present in every group it opens
    pub const BOT: &'static str = "UBOT";

    /// Announcement channel
    pub const CHANNEL: &'static str = "CCOFFEE";

    pub const NAMES: [&'static str; 6] = ["Ada", "Grace", "Linus", "Barbara", "Ken", "Radia"];

    /// Platform id of the n-th fixture member (1-based)
    pub fn user(n: usize) -> PlatformUserId {
        PlatformUserId::new(format!("U{n}"))
    }

    /// Matchable profile for the n-th fixture member (1-based)
    pub fn profile(n: usize) -> MemberProfile {
        let name = Self::NAMES[(n - 1) % Self::NAMES.len()];
        MemberProfile {
            platform_id: Self::user(n),
            name: name.to_string(),
            email: Some(format!("{}@example.org", name.to_lowercase())),
            handle: Some(name.to_lowercase()),
            is_bot: false,
            deleted: false,
        }
    }

    pub fn bot_profile() -> MemberProfile {
        MemberProfile {
            platform_id: PlatformUserId::new(Self::BOT),
            name: "coffee-bot".to_string(),
            email: None,
            handle: None,
            is_bot: true,
            deleted: false,
        }
    }

    /// Group as the platform reports it, bot included
    pub fn group_with_bot(id: &str, users: &[usize]) -> ExternalGroup {
        let mut members: Vec<String> = users.iter().map(|n| format!("U{n}")).collect();
        members.push(Self::BOT.to_string());
        ExternalGroup::new(id, members)
    }
}
