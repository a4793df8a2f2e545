use mailbag_common::error::CommandError;

/// Terminates the message body
pub const END_OF_DATA: &[u8] = b".\r\n";

/// Sender and accepted recipients of the message being submitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    sender: String,
    recipients: Vec<String>,
}

impl Envelope {
    #[must_use]
    pub const fn new(sender: String) -> Self {
        Self {
            sender,
            recipients: Vec::new(),
        }
    }

    #[must_use]
    pub fn sender(&self) -> &str {
        &self.sender
    }

    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn add_recipient(&mut self, recipient: String) {
        self.recipients.push(recipient);
    }
}

/// Message content collected after DATA
///
/// The buffer never grows past the limit it was given. The first line that
/// would take it past the limit is refused, and so is every line after it, so
/// what was accumulated is always a clean prefix of the message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Body {
    content: Vec<u8>,
    overflowed: bool,
}

impl Body {
    /// Append one received line, removing dot-stuffing
    ///
    /// # Errors
    /// [`CommandError::Capacity`] when the line does not fit within `limit`
    /// bytes, or an earlier line already did not
    pub fn append(&mut self, line: &[u8], limit: usize) -> Result<(), CommandError> {
        let line = match line.strip_prefix(b".") {
            Some(rest) if rest.starts_with(b".") => rest,
            _ => line,
        };

        self.extend(line, limit)
    }

    /// Append the rest of a line whose start was already appended, as is
    ///
    /// # Errors
    /// As for [`Body::append`]
    pub fn extend(&mut self, chunk: &[u8], limit: usize) -> Result<(), CommandError> {
        if self.overflowed || self.content.len() + chunk.len() > limit {
            self.overflowed = true;
            return Err(CommandError::Capacity { limit });
        }

        self.content.extend_from_slice(chunk);
        Ok(())
    }

    #[must_use]
    pub fn into_content(self) -> Vec<u8> {
        self.content
    }
}
