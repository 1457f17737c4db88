//! Core business logic modules
//!
//! This module contains pure business logic with no I/O dependencies.
//! All functions are deterministic given their inputs and easily testable.

pub mod announcement;
pub mod history;
pub mod pairing;
pub mod reconcile;

pub use announcement::Announcement;
pub use history::MeetingHistory;
pub use pairing::{ListedOrder, PoolOrder, RoundPlan, ShuffledOrder, plan_round};
pub use reconcile::{GroupIndex, MatchSignature, ReconcileMode, ReconcileOutcome, reconcile};
