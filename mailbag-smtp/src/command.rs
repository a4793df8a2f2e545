use core::fmt::{self, Display, Formatter};

use mailbag_common::line::{CommandLine, SyntaxError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `HELO <domain>`
    Helo(String),
    /// `MAIL FROM:<address>`
    MailFrom(String),
    /// `RCPT TO:<address>`
    RcptTo(String),
    Data,
    Noop,
    Quit,
    /// A known verb this server does not support (EHLO, RSET, VRFY, EXPN,
    /// HELP)
    NotImplemented(&'static str),
    Unrecognized(String),
    /// A supported verb whose line failed validation
    Malformed {
        verb: &'static str,
        error: SyntaxError,
    },
}

const NOT_IMPLEMENTED: [&str; 5] = ["EHLO", "RSET", "VRFY", "EXPN", "HELP"];

impl Command {
    fn malformed(verb: &'static str) -> impl Fn(SyntaxError) -> Self {
        move |error| Self::Malformed { verb, error }
    }
}

impl From<&CommandLine> for Command {
    fn from(line: &CommandLine) -> Self {
        if line.is("HELO") {
            return line
                .argument()
                .map_or_else(Self::malformed("HELO"), |domain| Self::Helo(domain.to_string()));
        }

        if line.is("MAIL") {
            return line.enclosed(" FROM:<", ">").map_or_else(Self::malformed("MAIL"), |sender| {
                Self::MailFrom(sender.to_string())
            });
        }

        if line.is("RCPT") {
            return line.enclosed(" TO:<", ">").map_or_else(Self::malformed("RCPT"), |recipient| {
                Self::RcptTo(recipient.to_string())
            });
        }

        if line.is("DATA") {
            return line.bare().map_or_else(Self::malformed("DATA"), |()| Self::Data);
        }

        // NOOP takes an optional string that is ignored
        if line.is("NOOP") {
            return Self::Noop;
        }

        if line.is("QUIT") {
            return line.bare().map_or_else(Self::malformed("QUIT"), |()| Self::Quit);
        }

        if let Some(&verb) = NOT_IMPLEMENTED.iter().find(|verb| line.is(verb)) {
            return Self::NotImplemented(verb);
        }

        Self::Unrecognized(line.to_string())
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helo(domain) => write!(f, "HELO {domain}"),
            Self::MailFrom(sender) => write!(f, "MAIL FROM:<{sender}>"),
            Self::RcptTo(recipient) => write!(f, "RCPT TO:<{recipient}>"),
            Self::Data => f.write_str("DATA"),
            Self::Noop => f.write_str("NOOP"),
            Self::Quit => f.write_str("QUIT"),
            Self::NotImplemented(verb) => f.write_str(verb),
            Self::Unrecognized(line) => f.write_str(line),
            Self::Malformed { verb, error } => write!(f, "{verb} ({error})"),
        }
    }
}
