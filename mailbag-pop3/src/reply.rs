use core::fmt::{self, Display, Formatter};
use std::borrow::Cow;

use mailbag_common::error::CommandError;

/// A single-line POP3 status reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok(Cow<'static, str>),
    Err(Cow<'static, str>),
}

impl Reply {
    #[must_use]
    pub fn greeting(banner: &str) -> Self {
        Self::Ok(format!("POP3 {banner} server ready").into())
    }

    #[must_use]
    pub fn shutting_down(banner: &str) -> Self {
        Self::Err(format!("{banner} server shutting down").into())
    }

    #[must_use]
    pub fn user_accepted(user: &str) -> Self {
        Self::Ok(format!("User {user} accepted").into())
    }

    #[must_use]
    pub const fn mailbox_open() -> Self {
        Self::Ok(Cow::Borrowed("Mailbox open"))
    }

    #[must_use]
    pub const fn invalid_credentials() -> Self {
        Self::Err(Cow::Borrowed("Invalid user/password combination"))
    }

    #[must_use]
    pub const fn locked() -> Self {
        Self::Err(Cow::Borrowed("Unable to lock maildrop"))
    }

    #[must_use]
    pub fn drop_listing(count: usize, size: u64) -> Self {
        Self::Ok(format!("{count} {size}").into())
    }

    #[must_use]
    pub fn scan_listing(number: usize, size: u64) -> Self {
        Self::Ok(format!("{number} {size}").into())
    }

    #[must_use]
    pub const fn scan_listing_follows() -> Self {
        Self::Ok(Cow::Borrowed("scan listing follows"))
    }

    #[must_use]
    pub fn octets(size: u64) -> Self {
        Self::Ok(format!("{size} octets").into())
    }

    #[must_use]
    pub fn unreadable(number: usize) -> Self {
        Self::Err(format!("Unable to read message {number}").into())
    }

    #[must_use]
    pub const fn deleted() -> Self {
        Self::Ok(Cow::Borrowed("message deleted"))
    }

    #[must_use]
    pub fn recovered(count: usize) -> Self {
        Self::Ok(format!("Recovered {count} messages.").into())
    }

    #[must_use]
    pub const fn noop() -> Self {
        Self::Ok(Cow::Borrowed(""))
    }

    #[must_use]
    pub const fn goodbye() -> Self {
        Self::Ok(Cow::Borrowed("Goodbye!"))
    }

    #[must_use]
    pub const fn not_all_removed() -> Self {
        Self::Err(Cow::Borrowed("Some deleted messages not removed"))
    }

    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

impl From<&CommandError> for Reply {
    fn from(error: &CommandError) -> Self {
        Self::Err(match error {
            CommandError::Syntax(_) => Cow::Borrowed("Syntax error"),
            CommandError::Sequence => Cow::Borrowed("Bad sequence of commands"),
            CommandError::NoSuchMessage => Cow::Borrowed("no such message"),
            CommandError::UnknownUser(user) => Cow::Owned(format!("No user {user} found")),
            CommandError::Capacity { .. } => Cow::Borrowed("Message too large"),
            CommandError::Storage(reason) => Cow::Owned(format!("Unable to {reason}")),
            CommandError::NotImplemented => Cow::Borrowed("Command not implemented"),
            CommandError::Unrecognized => Cow::Borrowed("Command unrecognized"),
        })
    }
}

impl From<CommandError> for Reply {
    fn from(error: CommandError) -> Self {
        Self::from(&error)
    }
}

impl Display for Reply {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (indicator, text) = match self {
            Self::Ok(text) => ("+OK", text),
            Self::Err(text) => ("-ERR", text),
        };

        if text.is_empty() {
            f.write_str(indicator)
        } else {
            write!(f, "{indicator} {text}")
        }
    }
}

#[cfg(test)]
mod tests {
    use mailbag_common::{error::CommandError, line::SyntaxError};
    use pretty_assertions::assert_eq;

    use super::Reply;

    #[test]
    fn rendering() {
        assert_eq!(
            Reply::greeting("mx.test").to_string(),
            "+OK POP3 mx.test server ready"
        );
        assert_eq!(Reply::noop().to_string(), "+OK");
        assert_eq!(Reply::drop_listing(2, 320).to_string(), "+OK 2 320");
        assert_eq!(Reply::recovered(1).to_string(), "+OK Recovered 1 messages.");
        assert_eq!(Reply::goodbye().to_string(), "+OK Goodbye!");
    }

    #[test]
    fn command_errors() {
        assert_eq!(
            Reply::from(CommandError::Syntax(SyntaxError::TooShort)).to_string(),
            "-ERR Syntax error"
        );
        assert_eq!(
            Reply::from(CommandError::Sequence).to_string(),
            "-ERR Bad sequence of commands"
        );
        assert_eq!(
            Reply::from(CommandError::UnknownUser("eve".to_string())).to_string(),
            "-ERR No user eve found"
        );
        assert_eq!(
            Reply::from(CommandError::NoSuchMessage).to_string(),
            "-ERR no such message"
        );
        assert_eq!(
            Reply::from(CommandError::Storage("open maildrop".to_string())).to_string(),
            "-ERR Unable to open maildrop"
        );
        assert!(!Reply::from(CommandError::Unrecognized).is_ok());
    }
}
