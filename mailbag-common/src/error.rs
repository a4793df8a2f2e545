//! Error types shared by the mailbag protocol crates.
//!
//! [`CommandError`] is the per-command taxonomy: every variant is reported to
//! the client and leaves the session running. [`SessionError`] is what ends a
//! session early.

use std::io;

use thiserror::Error;

use crate::line::SyntaxError;

/// Why a single command was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The line failed structural validation.
    #[error("Syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    /// A well-formed command issued in a state that forbids it.
    #[error("Bad sequence of commands")]
    Sequence,

    /// The referenced message number does not resolve.
    #[error("No such message")]
    NoSuchMessage,

    /// The referenced user or recipient does not exist.
    #[error("Unknown user {0}")]
    UnknownUser(String),

    /// The message body reached its maximum size.
    #[error("Exceeded maximum message length of {limit} bytes")]
    Capacity { limit: usize },

    /// The mailbox collaborator failed.
    #[error("Storage failure: {0}")]
    Storage(String),

    /// A known verb this server deliberately does not support.
    #[error("Command not implemented")]
    NotImplemented,

    #[error("Command unrecognized")]
    Unrecognized,
}

/// Errors raised while validating a protocol before it is served.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfiguration { field: &'static str, reason: String },
}

/// Errors raised by a [`crate::connection::Connection`].
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Formatting error while preparing a response.
    #[error("Response formatting error: {0}")]
    Format(#[from] std::fmt::Error),
}

pub type ConnectionResult<T> = std::result::Result<T, ConnectionError>;

/// Errors that terminate a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The underlying stream failed; nothing more can be said to the client.
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// A protocol invariant was broken mid-response (e.g. a message vanished
    /// while it was being streamed).
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<io::Error> for SessionError {
    fn from(err: io::Error) -> Self {
        Self::Connection(ConnectionError::Io(err))
    }
}

/// Errors that can occur in the listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Failed to accept connection: {0}")]
    AcceptFailed(#[from] io::Error),

    #[error("Protocol validation failed: {0}")]
    Protocol(#[from] ProtocolError),
}
