use std::sync::Arc;

use mailbag_common::internal;
use mailbag_tracing::traced;

use crate::{Content, MailItem, MailStore, StoreError};

#[derive(Debug, Clone, Copy)]
struct Entry {
    item: MailItem,
    deleted: bool,
}

/// A user's mailbox, held exclusively for the length of a retrieval session
///
/// The message list is frozen when the maildrop is opened. Indices are
/// 0-based positions in that snapshot and stay valid until the maildrop is
/// closed, whatever happens to the backing store in the meantime. Deletion is
/// only a mark until [`Maildrop::close`] is asked to expunge.
#[derive(Debug)]
pub struct Maildrop {
    user: String,
    entries: Vec<Entry>,
    store: Arc<dyn MailStore>,
}

impl Maildrop {
    /// Lock and snapshot the mailbox of `user`
    ///
    /// # Errors
    /// [`StoreError::Locked`] if another session holds the maildrop, or any
    /// error from listing the mailbox. The lock is not held on error.
    #[traced(instrument(level = tracing::Level::TRACE, skip(store)), timing(precision = "us"))]
    pub async fn open(store: Arc<dyn MailStore>, user: &str) -> crate::Result<Self> {
        store.lock(user).await?;

        match store.list(user).await {
            Ok(items) => {
                internal!(level = DEBUG, "Opened maildrop for {user} with {} messages", items.len());

                Ok(Self {
                    user: user.to_string(),
                    entries: items
                        .into_iter()
                        .map(|item| Entry {
                            item,
                            deleted: false,
                        })
                        .collect(),
                    store,
                })
            }
            Err(err) => {
                if let Err(unlock) = store.unlock(user).await {
                    internal!(level = WARN, "Failed to release maildrop for {user}: {unlock}");
                }

                Err(err)
            }
        }
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Number of messages present when the maildrop was opened
    #[must_use]
    pub const fn snapshot_len(&self) -> usize {
        self.entries.len()
    }

    /// Number of messages not marked deleted
    #[must_use]
    pub fn count(&self) -> usize {
        self.live().count()
    }

    /// Total octets of the messages not marked deleted
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.live().map(|item| item.size).sum()
    }

    /// The message at `index`, unless it is out of range or marked deleted
    #[must_use]
    pub fn item(&self, index: usize) -> Option<&MailItem> {
        self.entries
            .get(index)
            .filter(|entry| !entry.deleted)
            .map(|entry| &entry.item)
    }

    /// Open the content of the message at `index`
    ///
    /// # Errors
    /// If the message does not resolve or the store fails to open it
    pub async fn content(&self, index: usize) -> crate::Result<Content> {
        let item = self
            .item(index)
            .ok_or_else(|| StoreError::Internal(format!("no message at index {index}")))?;

        self.store.read(&self.user, &item.id).await
    }

    /// Mark the message at `index` deleted, returning `false` if it does not
    /// resolve
    pub fn mark_deleted(&mut self, index: usize) -> bool {
        match self.entries.get_mut(index) {
            Some(entry) if !entry.deleted => {
                entry.deleted = true;
                true
            }
            _ => false,
        }
    }

    /// Clear every deleted mark, returning how many were cleared
    pub fn reset_deleted(&mut self) -> usize {
        self.entries
            .iter_mut()
            .filter(|entry| entry.deleted)
            .fold(0, |recovered, entry| {
                entry.deleted = false;
                recovered + 1
            })
    }

    /// Release the maildrop, removing marked messages first when `expunge` is
    /// set
    ///
    /// The lock is released even if removing a message fails.
    ///
    /// # Errors
    /// The first removal failure, or a failure to release the lock
    #[traced(instrument(level = tracing::Level::TRACE, skip(self), fields(user = %self.user)), timing(precision = "us"))]
    pub async fn close(self, expunge: bool) -> crate::Result<()> {
        let mut result = Ok(());

        if expunge {
            for entry in self.entries.iter().filter(|entry| entry.deleted) {
                if let Err(err) = self.store.remove(&self.user, &entry.item.id).await {
                    internal!(level = ERROR, "Failed to remove {} for {}: {err}", entry.item.id, self.user);
                    if result.is_ok() {
                        result = Err(err);
                    }
                }
            }
        }

        let unlocked = self.store.unlock(&self.user).await;
        result.and(unlocked)
    }

    fn live(&self) -> impl Iterator<Item = &MailItem> {
        self.entries
            .iter()
            .filter(|entry| !entry.deleted)
            .map(|entry| &entry.item)
    }
}
