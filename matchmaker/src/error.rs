//! Matchmaker-specific error types

use shared::{MatchId, MemberId, SharedError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatchmakerError {
    #[error("Member {member_id} already has a current match")]
    AlreadyMatched { member_id: MemberId },

    #[error("Match not found: {match_id}")]
    MatchNotFound { match_id: MatchId },

    #[error("Member not found: {reference}")]
    MemberNotFound { reference: String },

    #[error("No pending match for {reference}")]
    NoCurrentMatch { reference: String },

    #[error("Platform call {method} failed: {error}")]
    Platform { method: String, error: String },

    #[error("Configuration error: {field}: {message}")]
    Configuration { field: String, message: String },

    #[error("Lock poisoned: {resource}")]
    LockPoisoned { resource: String },

    #[error("Shared component error: {0}")]
    Shared(#[from] SharedError),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MatchmakerError {
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn platform(method: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Platform {
            method: method.into(),
            error: error.into(),
        }
    }
}

pub type MatchmakerResult<T> = Result<T, MatchmakerError>;
