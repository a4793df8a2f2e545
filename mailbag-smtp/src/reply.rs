use core::fmt::{self, Display, Formatter};
use std::borrow::Cow;

use mailbag_common::error::CommandError;

use crate::status::Status;

/// A single-line SMTP reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: Status,
    pub text: Cow<'static, str>,
}

impl Reply {
    #[must_use]
    pub const fn new(status: Status, text: &'static str) -> Self {
        Self {
            status,
            text: Cow::Borrowed(text),
        }
    }

    #[must_use]
    pub fn greeting(banner: &str) -> Self {
        Self {
            status: Status::Ready,
            text: Cow::Owned(banner.to_string()),
        }
    }

    #[must_use]
    pub fn shutting_down(banner: &str) -> Self {
        Self {
            status: Status::ServiceUnavailable,
            text: Cow::Owned(format!(
                "{banner} Service not available, closing transmission channel"
            )),
        }
    }

    /// HELO is answered by echoing the client's domain
    #[must_use]
    pub fn hello(domain: &str) -> Self {
        Self {
            status: Status::Completed,
            text: Cow::Owned(domain.to_string()),
        }
    }

    #[must_use]
    pub const fn ok() -> Self {
        Self::new(Status::Completed, "OK")
    }

    #[must_use]
    pub const fn start_mail_input() -> Self {
        Self::new(
            Status::StartInput,
            "Start mail input; end with <CRLF>.<CRLF>",
        )
    }

    #[must_use]
    pub const fn goodbye() -> Self {
        Self::new(Status::Closing, "OK")
    }
}

impl From<&CommandError> for Reply {
    fn from(error: &CommandError) -> Self {
        match error {
            CommandError::Syntax(_) => {
                Self::new(Status::ParameterSyntax, "Syntax error in parameters or arguments")
            }
            CommandError::Sequence => {
                Self::new(Status::BadSequence, "Bad sequence of commands")
            }
            CommandError::UnknownUser(_) => Self::new(Status::MailboxUnavailable, "Invalid user"),
            CommandError::NoSuchMessage => Self::new(Status::MailboxUnavailable, "Requested action not taken"),
            CommandError::Capacity { .. } => {
                Self::new(Status::MailboxUnavailable, "Exceeded maximum message length")
            }
            CommandError::Storage(_) => Self::new(
                Status::LocalError,
                "Requested action aborted: local error in processing",
            ),
            CommandError::NotImplemented => {
                Self::new(Status::CommandNotImplemented, "Command not implemented")
            }
            CommandError::Unrecognized => Self::new(Status::CommandUnrecognized, "Command unrecognized"),
        }
    }
}

impl From<CommandError> for Reply {
    fn from(error: CommandError) -> Self {
        Self::from(&error)
    }
}

impl Display for Reply {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.text)
    }
}
