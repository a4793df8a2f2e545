//! Shared command-line grammar for the POP3 and SMTP sessions.
//!
//! Both protocols send one CRLF-terminated line per command and identify the
//! command by a fixed-width, case-sensitive verb in the first four bytes.
//! [`CommandLine`] tokenizes a raw line once into verb and remainder; the
//! protocol crates then apply their own argument grammar through
//! [`CommandLine::bare`], [`CommandLine::argument`],
//! [`CommandLine::optional_argument`] and [`CommandLine::enclosed`].

use core::fmt::{self, Display, Formatter};

use thiserror::Error;

/// Line terminator required on every command.
pub const CRLF: &[u8] = b"\r\n";

/// Width of a command verb.
pub const VERB_LEN: usize = 4;

/// Lines of this length or shorter carry no command and end the session.
pub const END_OF_INPUT_LEN: usize = 2;

/// Shortest `VERB ARG\r\n` line: verb, separator, one byte of argument, CRLF.
pub const MIN_ARGUMENT_LINE: usize = VERB_LEN + 1 + 1 + CRLF.len();

/// Structural problems with a command line.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("line is not terminated by CRLF")]
    Unterminated,

    #[error("line is too short to carry an argument")]
    TooShort,

    #[error("expected a single space after the verb")]
    MissingSeparator,

    #[error("expected `{0}` after the verb")]
    MissingPrefix(&'static str),

    #[error("expected `{0}` before CRLF")]
    MissingSuffix(&'static str),

    #[error("unexpected argument")]
    UnexpectedArgument,

    #[error("argument is empty")]
    EmptyArgument,

    #[error("argument is not valid UTF-8")]
    NotUtf8,
}

/// One raw client line, terminator included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    raw: Vec<u8>,
}

impl CommandLine {
    /// Wraps a line read from the client.
    ///
    /// Returns `None` when the line is at most [`END_OF_INPUT_LEN`] bytes
    /// long (a bare terminator, or nothing at all at end of stream): such a
    /// line ends the session silently.
    #[must_use]
    pub fn parse(line: &[u8]) -> Option<Self> {
        (line.len() > END_OF_INPUT_LEN).then(|| Self { raw: line.to_vec() })
    }

    /// The first [`VERB_LEN`] bytes, or the whole line if it is shorter.
    #[must_use]
    pub fn verb(&self) -> &[u8] {
        &self.raw[..self.raw.len().min(VERB_LEN)]
    }

    /// Case-sensitive match of `verb` against the start of the line.
    ///
    /// Only as many bytes as `verb` holds are compared, so three-letter verbs
    /// match on three bytes.
    #[must_use]
    pub fn is(&self, verb: &str) -> bool {
        self.raw.starts_with(verb.as_bytes())
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.raw.ends_with(CRLF)
    }

    /// Validates a `VERB\r\n` line.
    pub fn bare(&self) -> Result<(), SyntaxError> {
        if !self.is_terminated() {
            return Err(SyntaxError::Unterminated);
        }

        match self.raw.len().cmp(&(VERB_LEN + CRLF.len())) {
            core::cmp::Ordering::Equal => Ok(()),
            core::cmp::Ordering::Greater => Err(SyntaxError::UnexpectedArgument),
            core::cmp::Ordering::Less => Err(SyntaxError::TooShort),
        }
    }

    /// Extracts `ARG` from a `VERB ARG\r\n` line.
    pub fn argument(&self) -> Result<&str, SyntaxError> {
        if self.raw.len() < MIN_ARGUMENT_LINE {
            return Err(SyntaxError::TooShort);
        }

        let rest = self
            .raw
            .get(VERB_LEN..)
            .and_then(|rest| rest.strip_prefix(b" "))
            .ok_or(SyntaxError::MissingSeparator)?;

        let argument = rest.strip_suffix(CRLF).ok_or(SyntaxError::Unterminated)?;

        utf8(argument)
    }

    /// Accepts either `VERB\r\n` or `VERB ARG\r\n`.
    pub fn optional_argument(&self) -> Result<Option<&str>, SyntaxError> {
        if !self.is_terminated() {
            return Err(SyntaxError::Unterminated);
        }

        if self.raw.len() == VERB_LEN + CRLF.len() {
            Ok(None)
        } else {
            self.argument().map(Some)
        }
    }

    /// Extracts the non-empty text between `prefix` (directly after the
    /// verb) and `suffix` (directly before CRLF), e.g. the address in
    /// `MAIL FROM:<addr>\r\n`.
    pub fn enclosed(&self, prefix: &'static str, suffix: &'static str) -> Result<&str, SyntaxError> {
        let rest = self.raw.get(VERB_LEN..).ok_or(SyntaxError::TooShort)?;
        let rest = rest
            .strip_prefix(prefix.as_bytes())
            .ok_or(SyntaxError::MissingPrefix(prefix))?;
        let rest = rest.strip_suffix(CRLF).ok_or(SyntaxError::Unterminated)?;
        let inner = rest
            .strip_suffix(suffix.as_bytes())
            .ok_or(SyntaxError::MissingSuffix(suffix))?;

        if inner.is_empty() {
            return Err(SyntaxError::EmptyArgument);
        }

        utf8(inner)
    }
}

fn utf8(bytes: &[u8]) -> Result<&str, SyntaxError> {
    std::str::from_utf8(bytes).map_err(|_| SyntaxError::NotUtf8)
}

impl Display for CommandLine {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let line = self.raw.strip_suffix(CRLF).unwrap_or(&self.raw);
        f.write_str(&String::from_utf8_lossy(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(raw: &str) -> CommandLine {
        CommandLine::parse(raw.as_bytes()).unwrap()
    }

    #[test]
    fn short_lines_end_input() {
        assert!(CommandLine::parse(b"").is_none());
        assert!(CommandLine::parse(b"\r\n").is_none());
        assert!(CommandLine::parse(b"Q\n").is_none());
        assert!(CommandLine::parse(b"QU\n").is_some());
    }

    #[test]
    fn verb_is_fixed_width() {
        assert_eq!(line("USER bob\r\n").verb(), b"USER");
        assert_eq!(line("TOP\r\n").verb(), b"TOP\r");
        assert_eq!(line("NO\r\n").verb(), b"NO\r\n");
    }

    #[test]
    fn verb_match_is_case_sensitive() {
        assert!(line("QUIT\r\n").is("QUIT"));
        assert!(!line("quit\r\n").is("QUIT"));
        assert!(line("TOP 1 2\r\n").is("TOP"));
    }

    #[test]
    fn bare_commands() {
        assert_eq!(line("STAT\r\n").bare(), Ok(()));
        assert_eq!(line("STAT\n").bare(), Err(SyntaxError::Unterminated));
        assert_eq!(line("STAT 1\r\n").bare(), Err(SyntaxError::UnexpectedArgument));
        assert_eq!(line("STA\r\n").bare(), Err(SyntaxError::TooShort));
    }

    #[test]
    fn argument_grammar() {
        assert_eq!(line("USER bob\r\n").argument(), Ok("bob"));
        assert_eq!(line("USER b\r\n").argument(), Ok("b"));
        assert_eq!(line("USER\r\n").argument(), Err(SyntaxError::TooShort));
        assert_eq!(line("USERbob\r\n").argument(), Err(SyntaxError::MissingSeparator));
        assert_eq!(line("USER bob\n").argument(), Err(SyntaxError::Unterminated));
        assert_eq!(
            CommandLine::parse(b"USER \xff\xfe\r\n").unwrap().argument(),
            Err(SyntaxError::NotUtf8)
        );
    }

    #[test]
    fn optional_argument_grammar() {
        assert_eq!(line("LIST\r\n").optional_argument(), Ok(None));
        assert_eq!(line("LIST 2\r\n").optional_argument(), Ok(Some("2")));
        assert_eq!(line("LIST\n").optional_argument(), Err(SyntaxError::Unterminated));
        assert_eq!(line("LISTX\r\n").optional_argument(), Err(SyntaxError::TooShort));
        assert_eq!(
            line("LISTXY\r\n").optional_argument(),
            Err(SyntaxError::MissingSeparator)
        );
    }

    #[test]
    fn enclosed_grammar() {
        assert_eq!(
            line("MAIL FROM:<bob@a.com>\r\n").enclosed(" FROM:<", ">"),
            Ok("bob@a.com")
        );
        assert_eq!(
            line("MAIL FROM:<>\r\n").enclosed(" FROM:<", ">"),
            Err(SyntaxError::EmptyArgument)
        );
        assert_eq!(
            line("MAIL FROM: <bob@a.com>\r\n").enclosed(" FROM:<", ">"),
            Err(SyntaxError::MissingPrefix(" FROM:<"))
        );
        assert_eq!(
            line("MAIL FROM:<bob@a.com\r\n").enclosed(" FROM:<", ">"),
            Err(SyntaxError::MissingSuffix(">"))
        );
        assert_eq!(
            line("MAIL FROM:<bob@a.com>\n").enclosed(" FROM:<", ">"),
            Err(SyntaxError::Unterminated)
        );
        assert_eq!(
            line("RCP\r\n").enclosed(" TO:<", ">"),
            Err(SyntaxError::MissingPrefix(" TO:<"))
        );
    }

    #[test]
    fn display_strips_terminator() {
        assert_eq!(line("HELO a.com\r\n").to_string(), "HELO a.com");
    }
}
