//! Common test utilities and infrastructure
//!
//! Shared fixtures and a builder that wires a real in-memory store to mocked
//! platform collaborators.

#![allow(dead_code)]

pub mod fixtures;
pub mod helpers;

// Re-export commonly used items for convenience
pub use fixtures::TestFixtures;
pub use helpers::{MatchmakerBuilder, TestHelpers, TestMatchmaker};
