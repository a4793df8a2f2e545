//! Error types for the mailbag-store crate.

use std::io;

use thiserror::Error;

use crate::MessageId;

/// Errors raised by a [`crate::MailStore`] or [`crate::Maildrop`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O operation failed (file read/write/delete).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No mailbox exists for this user.
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    /// The maildrop is already held by another session.
    #[error("Maildrop for {0} is locked")]
    Locked(String),

    /// Message not found in the mailbox.
    #[error("Message not found: {0}")]
    NotFound(MessageId),

    /// Internal error (lock poisoning, injected failures, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Returns `true` if the maildrop could not be taken because it is in use
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        matches!(self, Self::Locked(_))
    }
}

/// Specialized `Result` type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            StoreError::Locked("bob".to_string()).to_string(),
            "Maildrop for bob is locked"
        );
        assert_eq!(
            StoreError::UnknownUser("eve".to_string()).to_string(),
            "Unknown user: eve"
        );
        assert!(StoreError::Locked("bob".to_string()).is_locked());
        assert!(!StoreError::Internal("x".to_string()).is_locked());
    }
}
