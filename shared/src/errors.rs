//! Shared error types for the matchmaker identity model

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SharedError {
    #[error("A match must hold 2 or 3 members, got {size}")]
    InvalidGroupSize { size: usize },

    #[error("Member {member_id} appears more than once in a match")]
    DuplicateMember { member_id: i64 },
}

pub type SharedResult<T> = Result<T, SharedError>;
