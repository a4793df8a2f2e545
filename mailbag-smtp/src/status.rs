use core::fmt::{self, Display, Formatter};

/// The reply codes a submission session can send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Status {
    Ready = 220,
    Closing = 221,
    Completed = 250,
    StartInput = 354,
    ServiceUnavailable = 421,
    LocalError = 451,
    CommandUnrecognized = 500,
    ParameterSyntax = 501,
    CommandNotImplemented = 502,
    BadSequence = 503,
    MailboxUnavailable = 550,
}

impl Status {
    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
