/// Identifier for a stored message
///
/// A ULID, so identifiers sort in arrival order and double as file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId {
    id: ulid::Ulid,
}

/// Extension given to message files
pub const MESSAGE_EXTENSION: &str = ".eml";

impl MessageId {
    /// Parse a message ID from a filename like `01ARYZ6S41TSV4RRFFQ69G5FAV.eml`
    ///
    /// Anything containing path separators or traversal patterns, or whose stem
    /// is not a ULID, is rejected.
    #[must_use]
    pub fn from_filename(filename: &str) -> Option<Self> {
        if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
            return None;
        }

        let stem = filename.strip_suffix(MESSAGE_EXTENSION)?;
        let id = ulid::Ulid::from_string(stem).ok()?;

        Some(Self { id })
    }

    #[must_use]
    pub const fn new(id: ulid::Ulid) -> Self {
        Self { id }
    }

    /// Generate a new unique message ID
    #[must_use]
    pub fn generate() -> Self {
        Self {
            id: ulid::Ulid::new(),
        }
    }

    #[must_use]
    pub fn filename(&self) -> String {
        format!("{}{MESSAGE_EXTENSION}", self.id)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// One message in a mailbox listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailItem {
    pub id: MessageId,
    /// Size in octets
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_id_from_filename() {
        assert!(MessageId::from_filename("01ARZ3NDEKTSV4RRFFQ69G5FAV.eml").is_some());

        assert!(MessageId::from_filename("../01ARZ3NDEKTSV4RRFFQ69G5FAV.eml").is_none());
        assert!(MessageId::from_filename("foo/01ARZ3NDEKTSV4RRFFQ69G5FAV.eml").is_none());
        assert!(MessageId::from_filename("..\\windows\\system32.eml").is_none());

        assert!(MessageId::from_filename("not_a_valid_ulid.eml").is_none());
        assert!(MessageId::from_filename("01ARZ3NDEKTSV4RRFFQ69G5FAV.tmp").is_none());
        assert!(MessageId::from_filename("01ARZ3NDEKTSV4RRFFQ69G5FAV").is_none());
    }

    #[test]
    fn filename_round_trips() {
        let id = MessageId::generate();

        assert_eq!(MessageId::from_filename(&id.filename()), Some(id));
    }
}
