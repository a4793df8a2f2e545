use std::sync::Arc;

use mailbag_common::{error::CommandError, error::SessionError, internal, outgoing};
use mailbag_store::{Content, Maildrop, StoreError};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite};

use super::{Flow, Session};
use crate::{
    command::MessageNumber,
    reply::Reply,
    state::{Action, Event, Login, Lookup},
};

/// Ends a multi-line response
const TERMINATOR: &str = ".";

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send> Session<Stream> {
    pub(super) async fn perform(&mut self, action: Action) -> Result<Flow, SessionError> {
        let reply = match action {
            Action::Reply(reply) => reply,
            Action::LookupUser(user) => {
                let lookup = match self.store.user_exists(&user).await {
                    Ok(true) => Lookup::Found,
                    Ok(false) => Lookup::Missing,
                    Err(err) => {
                        internal!(level = ERROR, "Looking up {user} failed: {err}");
                        Lookup::Failed
                    }
                };

                return Ok(Flow::Feed(Event::UserChecked { user, lookup }));
            }
            Action::Authenticate { user, password } => {
                let login = self.login(&user, password.expose()).await;
                return Ok(Flow::Feed(Event::LoggedIn(login)));
            }
            Action::Stat => {
                let maildrop = self.maildrop()?;
                Reply::drop_listing(maildrop.count(), maildrop.total_size())
            }
            Action::ListAll => {
                self.list_all().await?;
                return Ok(Flow::Continue);
            }
            Action::ListOne { number, index } => self.maildrop()?.item(index).map_or_else(
                || CommandError::NoSuchMessage.into(),
                |item| Reply::scan_listing(number.get(), item.size),
            ),
            Action::Retrieve { number, index } => {
                self.retrieve(number, index).await?;
                return Ok(Flow::Continue);
            }
            Action::Delete { index, .. } => {
                if self.maildrop_mut()?.mark_deleted(index) {
                    Reply::deleted()
                } else {
                    CommandError::NoSuchMessage.into()
                }
            }
            Action::Reset => Reply::recovered(self.maildrop_mut()?.reset_deleted()),
            Action::Quit => {
                let reply = self.quit().await;
                self.reply(&reply).await?;
                return Ok(Flow::Close);
            }
        };

        self.reply(&reply).await?;
        Ok(Flow::Continue)
    }

    /// Check credentials and take the maildrop
    async fn login(&mut self, user: &str, password: &str) -> Login {
        match self.store.authenticate(user, password).await {
            Ok(true) => {}
            Ok(false) => return Login::Rejected,
            Err(err) => {
                internal!(level = ERROR, "Authenticating {user} failed: {err}");
                return Login::Failed;
            }
        }

        match Maildrop::open(Arc::clone(&self.store), user).await {
            Ok(maildrop) => {
                let snapshot = maildrop.snapshot_len();
                self.maildrop = Some(maildrop);
                Login::Opened { snapshot }
            }
            Err(StoreError::Locked(_)) => Login::Locked,
            Err(err) => {
                internal!(level = ERROR, "Opening maildrop for {user} failed: {err}");
                Login::Failed
            }
        }
    }

    async fn list_all(&mut self) -> Result<(), SessionError> {
        let maildrop = self.maildrop()?;
        let listing: Vec<String> = (0..maildrop.snapshot_len())
            .filter_map(|index| {
                maildrop
                    .item(index)
                    .map(|item| format!("{} {}", index + 1, item.size))
            })
            .collect();

        self.reply(&Reply::scan_listing_follows()).await?;
        for line in &listing {
            outgoing!("{line}");
            self.connection.send(line).await?;
        }

        self.terminate().await
    }

    async fn retrieve(&mut self, number: MessageNumber, index: usize) -> Result<(), SessionError> {
        let maildrop = self.maildrop()?;
        let Some(size) = maildrop.item(index).map(|item| item.size) else {
            return self.reply(&CommandError::NoSuchMessage.into()).await;
        };

        let content = match maildrop.content(index).await {
            Ok(content) => content,
            Err(err) => {
                internal!(level = ERROR, "Unable to read message {number}: {err}");
                return self.reply(&Reply::unreadable(number.get())).await;
            }
        };

        self.reply(&Reply::octets(size)).await?;
        self.transmit(content).await?;
        self.terminate().await
    }

    /// Send message content line by line, byte-stuffing lines that begin with
    /// the terminator and ending every line with CRLF
    async fn transmit(&mut self, mut content: Content) -> Result<(), SessionError> {
        let mut line = Vec::new();

        loop {
            line.clear();
            line.push(b'.');

            let read = content
                .read_until(b'\n', &mut line)
                .await
                .map_err(|err| SessionError::Protocol(format!("Message unreadable mid-transfer: {err}")))?;
            if read == 0 {
                return Ok(());
            }

            if !line.ends_with(b"\r\n") {
                if line.last() == Some(&b'\n') {
                    line.pop();
                }
                line.extend_from_slice(b"\r\n");
            }

            let stuffed = if line.get(1) == Some(&b'.') { &line[..] } else { &line[1..] };
            self.connection.send_raw(stuffed).await?;
        }
    }

    async fn terminate(&mut self) -> Result<(), SessionError> {
        outgoing!("{TERMINATOR}");
        self.connection.send(&TERMINATOR).await?;
        Ok(())
    }

    /// Expunge and release the maildrop, if one is held
    async fn quit(&mut self) -> Reply {
        let Some(maildrop) = self.maildrop.take() else {
            return Reply::goodbye();
        };

        let user = maildrop.user().to_string();
        match maildrop.close(true).await {
            Ok(()) => Reply::goodbye(),
            Err(err) => {
                internal!(level = ERROR, "Updating maildrop for {user} failed: {err}");
                Reply::not_all_removed()
            }
        }
    }

    fn maildrop(&self) -> Result<&Maildrop, SessionError> {
        self.maildrop
            .as_ref()
            .ok_or_else(|| SessionError::Protocol("No maildrop held in transaction state".to_string()))
    }

    fn maildrop_mut(&mut self) -> Result<&mut Maildrop, SessionError> {
        self.maildrop
            .as_mut()
            .ok_or_else(|| SessionError::Protocol("No maildrop held in transaction state".to_string()))
    }
}
