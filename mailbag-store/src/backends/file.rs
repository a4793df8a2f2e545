use std::{
    io,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use ahash::AHashSet;
use async_trait::async_trait;
use mailbag_common::internal;
use mailbag_tracing::traced;
use tokio::io::{AsyncWriteExt, BufReader};

use crate::{Content, MailItem, MailStore, MessageId, StoreError};

/// Name of the credentials file inside a store root
pub const USERS_FILE: &str = "users.txt";

/// Name of the mailbox directory inside a store root
pub const STORE_DIR: &str = "mail.store";

/// Staging directory for deliveries, inside the store directory
const STAGING_DIR: &str = "tmp";

/// File-backed mail store
///
/// Credentials come from a text file holding one `user password` pair per
/// line (blank lines and `#` comments are ignored); the file is re-read on
/// every lookup so edits apply to the next session. Each user owns a
/// directory of `<ulid>.eml` files under the store directory, so directory
/// order sorted by name is arrival order.
///
/// Deliveries are written to a staging file first and renamed into place,
/// so a reader never sees a partially written message. Maildrop locks are
/// held in memory and are only exclusive within this process.
pub struct FileMailStore {
    users_file: PathBuf,
    store_dir: PathBuf,
    locked: Mutex<AHashSet<String>>,
    ids: Mutex<ulid::Generator>,
}

impl FileMailStore {
    pub fn new(users_file: impl Into<PathBuf>, store_dir: impl Into<PathBuf>) -> Self {
        Self {
            users_file: users_file.into(),
            store_dir: store_dir.into(),
            locked: Mutex::default(),
            ids: Mutex::new(ulid::Generator::new()),
        }
    }

    /// A store using `users.txt` and `mail.store/` inside `root`
    pub fn from_dir(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self::new(root.join(USERS_FILE), root.join(STORE_DIR))
    }

    #[traced(instrument(level = tracing::Level::TRACE, skip(self)), timing(precision = "us"))]
    async fn password(&self, user: &str) -> crate::Result<Option<String>> {
        let users = match tokio::fs::read_to_string(&self.users_file).await {
            Ok(users) => users,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                internal!(level = WARN, "Users file {} not found", self.users_file.display());
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let password = parse_users(&users)
            .find(|(name, _)| *name == user)
            .map(|(_, password)| password.to_string());

        Ok(password)
    }

    /// Directory holding the mailbox of `user`
    ///
    /// Names that could escape the store directory are refused.
    fn mailbox(&self, user: &str) -> crate::Result<PathBuf> {
        if user.is_empty()
            || user == STAGING_DIR
            || user.contains(['/', '\\'])
            || user.contains("..")
        {
            return Err(StoreError::UnknownUser(user.to_string()));
        }

        Ok(self.store_dir.join(user))
    }

    fn next_id(&self) -> crate::Result<MessageId> {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()
            .map(MessageId::new)
            .map_err(|err| StoreError::Internal(err.to_string()))
    }
}

impl std::fmt::Debug for FileMailStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileMailStore")
            .field("users_file", &self.users_file)
            .field("store_dir", &self.store_dir)
            .finish_non_exhaustive()
    }
}

/// Credential pairs from the contents of a users file
fn parse_users(contents: &str) -> impl Iterator<Item = (&str, &str)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            Some((fields.next()?, fields.next().unwrap_or_default()))
        })
}

#[async_trait]
impl MailStore for FileMailStore {
    async fn user_exists(&self, user: &str) -> crate::Result<bool> {
        Ok(self.password(user).await?.is_some())
    }

    async fn authenticate(&self, user: &str, password: &str) -> crate::Result<bool> {
        Ok(self
            .password(user)
            .await?
            .is_some_and(|expected| expected == password))
    }

    async fn lock(&self, user: &str) -> crate::Result<()> {
        self.mailbox(user)?;

        if self
            .locked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user.to_string())
        {
            Ok(())
        } else {
            Err(StoreError::Locked(user.to_string()))
        }
    }

    async fn unlock(&self, user: &str) -> crate::Result<()> {
        self.locked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(user);
        Ok(())
    }

    async fn list(&self, user: &str) -> crate::Result<Vec<MailItem>> {
        let mailbox = self.mailbox(user)?;

        let mut entries = match tokio::fs::read_dir(&mailbox).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut items = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Some(id) = entry.file_name().to_str().and_then(MessageId::from_filename) else {
                continue;
            };

            let metadata = entry.metadata().await?;
            if metadata.is_file() {
                items.push(MailItem {
                    id,
                    size: metadata.len(),
                });
            }
        }

        items.sort_by_key(|item| item.id);

        Ok(items)
    }

    async fn read(&self, user: &str, id: &MessageId) -> crate::Result<Content> {
        let path = self.mailbox(user)?.join(id.filename());

        match tokio::fs::File::open(&path).await {
            Ok(file) => {
                let content: Content = Box::pin(BufReader::new(file));
                Ok(content)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound(*id)),
            Err(err) => Err(err.into()),
        }
    }

    async fn remove(&self, user: &str, id: &MessageId) -> crate::Result<()> {
        let path = self.mailbox(user)?.join(id.filename());

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound(*id)),
            Err(err) => Err(err.into()),
        }
    }

    async fn deliver(&self, recipients: &[String], content: &[u8]) -> crate::Result<MessageId> {
        let mut mailboxes = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            if !self.user_exists(recipient).await? {
                return Err(StoreError::UnknownUser(recipient.clone()));
            }
            mailboxes.push(self.mailbox(recipient)?);
        }

        let id = self.next_id()?;
        let staging = self.store_dir.join(STAGING_DIR);
        tokio::fs::create_dir_all(&staging).await?;

        for (index, mailbox) in mailboxes.iter().enumerate() {
            let staged = staging.join(format!("{id}.{index}"));

            let mut file = tokio::fs::File::create(&staged).await?;
            file.write_all(content).await?;
            file.sync_all().await?;
            drop(file);

            tokio::fs::create_dir_all(mailbox).await?;
            tokio::fs::rename(&staged, mailbox.join(id.filename())).await?;
        }

        internal!(level = DEBUG, "Delivered {id} to {} recipients", recipients.len());

        Ok(id)
    }
}
