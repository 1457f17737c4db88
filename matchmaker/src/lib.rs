//! Coffee-chat matchmaker
//!
//! Pairs community members who have never met into small groups, opens a
//! group conversation for each, and later maps conversations back to their
//! matches when a channel id was lost. Business logic in `core` is pure; all
//! I/O goes through the traits in `traits` so it can be mocked in tests.

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod matchmaker;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use config::MatchmakerConfig;
pub use crate::core::{Announcement, MeetingHistory, ReconcileMode, RoundPlan};
pub use engine::{FailedMatch, PairingEngine, RoundReport};
pub use error::{MatchmakerError, MatchmakerResult};
pub use matchmaker::{Matchmaker, ReconcileSummary, ReminderSummary, RoundOptions, RoundSummary, SyncReport};
pub use traits::{GroupDirectory, GroupPage, MemberStore, Notifier};
pub use traits::{MockGroupDirectory, MockMemberStore, MockNotifier};
