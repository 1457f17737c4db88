//! Service-specific tests
//!
//! The store runs against an in-memory SQLite database; the Slack client runs
//! against a local mock HTTP server.

mod slack;

pub mod common {
    use shared::{MemberProfile, PlatformUserId};

    /// Profile of a real, matchable user
    pub fn profile(platform_id: &str, name: &str) -> MemberProfile {
        MemberProfile {
            platform_id: PlatformUserId::new(platform_id),
            name: name.to_string(),
            email: Some(format!("{}@example.org", name.to_lowercase())),
            handle: None,
            is_bot: false,
            deleted: false,
        }
    }
}
