use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::AsyncBufRead;

use crate::types::{MailItem, MessageId};

/// Readable content of a single stored message
pub type Content = Pin<Box<dyn AsyncBufRead + Send>>;

/// Storage for user credentials and mailboxes
///
/// Implementations must be safe to share between sessions: opens, deletions
/// and deliveries against the same mailbox may arrive concurrently from
/// different connections.
#[async_trait]
pub trait MailStore: Send + Sync + std::fmt::Debug {
    /// Does a mailbox exist for `user`
    async fn user_exists(&self, user: &str) -> crate::Result<bool>;

    /// Does `password` match the one on record for `user`
    async fn authenticate(&self, user: &str, password: &str) -> crate::Result<bool>;

    /// Take the exclusive maildrop lock for `user`
    ///
    /// # Errors
    /// [`crate::StoreError::Locked`] when another session already holds it
    async fn lock(&self, user: &str) -> crate::Result<()>;

    /// Release the maildrop lock for `user`
    async fn unlock(&self, user: &str) -> crate::Result<()>;

    /// The messages currently in the mailbox of `user`, oldest first
    async fn list(&self, user: &str) -> crate::Result<Vec<MailItem>>;

    /// Open the content of one message
    async fn read(&self, user: &str, id: &MessageId) -> crate::Result<Content>;

    /// Permanently remove one message
    async fn remove(&self, user: &str, id: &MessageId) -> crate::Result<()>;

    /// Store `content` in the mailbox of every recipient
    async fn deliver(&self, recipients: &[String], content: &[u8]) -> crate::Result<MessageId>;
}
