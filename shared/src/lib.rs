//! Shared identity model for the coffee-chat matchmaker
//!
//! Contains the types every component agrees on: member and match
//! identities, the fixed-arity member sets a match is made of, and the
//! externally observed groups used during reconciliation.

pub mod errors;
pub mod logging;
pub mod types;

pub use errors::*;
pub use logging::Job;
pub use types::*;
