use std::{
    io::Cursor,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use ahash::{AHashMap, AHashSet};
use async_trait::async_trait;

use crate::{Content, MailItem, MailStore, MessageId, StoreError};

/// Store operations that can be made to fail on purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Listing a mailbox while opening a maildrop
    Open,
    Read,
    Deliver,
    Remove,
}

#[derive(Debug, Default)]
struct Mailboxes {
    passwords: AHashMap<String, String>,
    messages: AHashMap<String, Vec<(MessageId, Arc<[u8]>)>>,
    locked: AHashSet<String>,
    failures: AHashSet<Operation>,
}

/// In-memory mail store
///
/// Users, mailboxes and maildrop locks live in maps behind an `RwLock`.
/// Primarily intended for tests: it can report what was delivered, how many
/// maildrops are open, and be told to fail specific operations.
#[derive(Debug, Clone, Default)]
pub struct MemoryMailStore {
    inner: Arc<RwLock<Mailboxes>>,
}

impl MemoryMailStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user with an empty mailbox
    #[must_use]
    pub fn with_user(self, user: &str, password: &str) -> Self {
        {
            let mut inner = self.state_mut();
            inner
                .passwords
                .insert(user.to_string(), password.to_string());
            inner.messages.entry(user.to_string()).or_default();
        }
        self
    }

    /// Append a message to the mailbox of `user`
    #[must_use]
    pub fn with_message(self, user: &str, content: impl Into<Vec<u8>>) -> Self {
        self.state_mut()
            .messages
            .entry(user.to_string())
            .or_default()
            .push((MessageId::generate(), Arc::from(content.into())));
        self
    }

    /// Make every subsequent `operation` fail with [`StoreError::Internal`]
    pub fn fail_on(&self, operation: Operation) {
        self.state_mut().failures.insert(operation);
    }

    /// Contents of the mailbox of `user`, oldest first
    #[must_use]
    pub fn messages(&self, user: &str) -> Vec<Vec<u8>> {
        self.state()
            .messages
            .get(user)
            .map(|messages| messages.iter().map(|(_, content)| content.to_vec()).collect())
            .unwrap_or_default()
    }

    /// Number of maildrops currently locked
    #[must_use]
    pub fn open_maildrops(&self) -> usize {
        self.state().locked.len()
    }

    fn state(&self) -> RwLockReadGuard<'_, Mailboxes> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, Mailboxes> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self, operation: Operation) -> crate::Result<()> {
        if self.state().failures.contains(&operation) {
            Err(StoreError::Internal(format!("{operation:?} failure injected")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MailStore for MemoryMailStore {
    async fn user_exists(&self, user: &str) -> crate::Result<bool> {
        Ok(self.state().passwords.contains_key(user))
    }

    async fn authenticate(&self, user: &str, password: &str) -> crate::Result<bool> {
        Ok(self
            .state()
            .passwords
            .get(user)
            .is_some_and(|expected| expected == password))
    }

    async fn lock(&self, user: &str) -> crate::Result<()> {
        let mut inner = self.state_mut();

        if !inner.passwords.contains_key(user) {
            return Err(StoreError::UnknownUser(user.to_string()));
        }

        if inner.locked.insert(user.to_string()) {
            Ok(())
        } else {
            Err(StoreError::Locked(user.to_string()))
        }
    }

    async fn unlock(&self, user: &str) -> crate::Result<()> {
        self.state_mut().locked.remove(user);
        Ok(())
    }

    async fn list(&self, user: &str) -> crate::Result<Vec<MailItem>> {
        self.check(Operation::Open)?;

        self.state()
            .messages
            .get(user)
            .map(|messages| {
                messages
                    .iter()
                    .map(|(id, content)| MailItem {
                        id: *id,
                        size: content.len() as u64,
                    })
                    .collect()
            })
            .ok_or_else(|| StoreError::UnknownUser(user.to_string()))
    }

    async fn read(&self, user: &str, id: &MessageId) -> crate::Result<Content> {
        self.check(Operation::Read)?;

        let content = self
            .state()
            .messages
            .get(user)
            .and_then(|messages| messages.iter().find(|(candidate, _)| candidate == id))
            .map(|(_, content)| Arc::clone(content))
            .ok_or(StoreError::NotFound(*id))?;

        let content: Content = Box::pin(Cursor::new(content));
        Ok(content)
    }

    async fn remove(&self, user: &str, id: &MessageId) -> crate::Result<()> {
        self.check(Operation::Remove)?;

        let mut inner = self.state_mut();
        let messages = inner
            .messages
            .get_mut(user)
            .ok_or_else(|| StoreError::UnknownUser(user.to_string()))?;
        let position = messages
            .iter()
            .position(|(candidate, _)| candidate == id)
            .ok_or(StoreError::NotFound(*id))?;

        messages.remove(position);
        Ok(())
    }

    async fn deliver(&self, recipients: &[String], content: &[u8]) -> crate::Result<MessageId> {
        self.check(Operation::Deliver)?;

        let id = MessageId::generate();
        let content: Arc<[u8]> = Arc::from(content);
        let mut inner = self.state_mut();

        if let Some(unknown) = recipients
            .iter()
            .find(|recipient| !inner.passwords.contains_key(recipient.as_str()))
        {
            return Err(StoreError::UnknownUser(unknown.clone()));
        }

        for recipient in recipients {
            inner
                .messages
                .entry(recipient.clone())
                .or_default()
                .push((id, Arc::clone(&content)));
        }

        Ok(id)
    }
}
