use core::fmt::{self, Display, Formatter};

use mailbag_common::line::{CommandLine, SyntaxError};

/// A message number as sent by the client
///
/// Parsed leniently: leading whitespace and a sign are accepted, parsing stops
/// at the first non-digit, and anything unparsable or negative becomes 0.
/// Zero never resolves to a message, so a non-numeric argument and an out of
/// range one are reported identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageNumber(usize);

impl MessageNumber {
    #[must_use]
    pub fn parse(argument: &str) -> Self {
        let trimmed = argument.trim_start();
        let (negative, digits) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        let value = digits
            .bytes()
            .take_while(u8::is_ascii_digit)
            .fold(0usize, |value, digit| {
                value
                    .saturating_mul(10)
                    .saturating_add(usize::from(digit - b'0'))
            });

        Self(if negative { 0 } else { value })
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }

    /// The 0-based snapshot index for this 1-based number, if it is within a
    /// snapshot of `snapshot` messages
    #[must_use]
    pub const fn index(self, snapshot: usize) -> Option<usize> {
        if self.0 == 0 || self.0 > snapshot {
            None
        } else {
            Some(self.0 - 1)
        }
    }
}

impl Display for MessageNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A PASS argument, redacted whenever it is formatted
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("Password(********)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    User(String),
    Pass(Password),
    Stat,
    List(Option<MessageNumber>),
    Retr(MessageNumber),
    Dele(MessageNumber),
    Rset,
    Noop,
    Quit,
    /// A known verb this server does not support (TOP, UIDL, APOP)
    NotImplemented(&'static str),
    Unrecognized(String),
    /// A supported verb whose line failed validation
    Malformed {
        verb: &'static str,
        error: SyntaxError,
    },
}

/// Verbs that take an argument and the constructor for each
type WithArgument = (&'static str, fn(&str) -> Command);

const WITH_ARGUMENT: [WithArgument; 4] = [
    ("USER", |name| Command::User(name.to_string())),
    ("PASS", |secret| Command::Pass(Password::new(secret))),
    ("RETR", |number| Command::Retr(MessageNumber::parse(number))),
    ("DELE", |number| Command::Dele(MessageNumber::parse(number))),
];

const BARE: [(&str, Command); 4] = [
    ("STAT", Command::Stat),
    ("RSET", Command::Rset),
    ("NOOP", Command::Noop),
    ("QUIT", Command::Quit),
];

const NOT_IMPLEMENTED: [&str; 3] = ["TOP", "UIDL", "APOP"];

impl From<&CommandLine> for Command {
    fn from(line: &CommandLine) -> Self {
        if let Some(&(verb, build)) = WITH_ARGUMENT.iter().find(|(verb, _)| line.is(verb)) {
            return line
                .argument()
                .map_or_else(|error| Self::Malformed { verb, error }, build);
        }

        if let Some((verb, command)) = BARE.iter().find(|(verb, _)| line.is(verb)) {
            let verb = *verb;
            return line
                .bare()
                .map_or_else(|error| Self::Malformed { verb, error }, |()| command.clone());
        }

        if line.is("LIST") {
            return line.optional_argument().map_or_else(
                |error| Self::Malformed {
                    verb: "LIST",
                    error,
                },
                |argument| Self::List(argument.map(MessageNumber::parse)),
            );
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
            Self::User(name) => write!(f, "USER {name}"),
            Self::Pass(_) => f.write_str("PASS ********"),
            Self::Stat => f.write_str("STAT"),
            Self::List(None) => f.write_str("LIST"),
            Self::List(Some(number)) => write!(f, "LIST {number}"),
            Self::Retr(number) => write!(f, "RETR {number}"),
            Self::Dele(number) => write!(f, "DELE {number}"),
            Self::Rset => f.write_str("RSET"),
            Self::Noop => f.write_str("NOOP"),
            Self::Quit => f.write_str("QUIT"),
            Self::NotImplemented(verb) => f.write_str(verb),
            Self::Unrecognized(line) => f.write_str(line),
            Self::Malformed { verb, error } => write!(f, "{verb} ({error})"),
        }
    }
}
