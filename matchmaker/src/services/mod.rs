//! Service implementations
//!
//! Production implementations of the store, directory and notifier traits.
//! These are the only places that perform database or network I/O.

pub mod slack;
pub mod store;

#[cfg(test)]
mod tests;

// Re-export all service implementations
pub use slack::{DEFAULT_API_BASE, SlackClient};
pub use store::SqliteStore;
