// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid delivery status transition: {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Attempts {attempts} exceed max_attempts {max_attempts}")]
    AttemptsExceeded { attempts: i32, max_attempts: i32 },

    #[error("Unknown delivery status: {0}")]
    UnknownStatus(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
