use std::{net::SocketAddr, sync::Arc};

use mailbag_common::{
    Signal,
    config::SessionConfig,
    connection::Connection,
    error::SessionError,
    incoming, internal,
    line::CommandLine,
    outgoing,
    traits::{FiniteStateMachine, SessionHandler},
    tracing,
};
use mailbag_store::{MailStore, Maildrop};
use mailbag_tracing::traced;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::broadcast,
};

use crate::{
    command::Command,
    reply::Reply,
    state::{Event, State},
};

mod actions;

/// What the session does after performing an action
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Feed(Event),
    Close,
}

/// One POP3 conversation with a connected client
pub struct Session<Stream: AsyncRead + AsyncWrite + Unpin + Send> {
    peer: SocketAddr,
    state: State,
    banner: Arc<str>,
    connection: Connection<Stream>,
    store: Arc<dyn MailStore>,
    /// Held from a successful PASS until the session ends
    maildrop: Option<Maildrop>,
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send> Session<Stream> {
    #[traced(instrument(level = tracing::Level::TRACE, skip(stream, config, store)), timing)]
    pub fn create(
        stream: Stream,
        peer: SocketAddr,
        config: &SessionConfig,
        store: Arc<dyn MailStore>,
    ) -> Self {
        Self {
            peer,
            state: State::default(),
            banner: Arc::clone(&config.banner),
            connection: Connection::new(stream, config.max_line_length),
            store,
            maildrop: None,
        }
    }

    /// Serve the client until it quits, hangs up, or the server shuts down
    ///
    /// The maildrop, if one was opened, is released before returning whatever
    /// the outcome.
    #[traced(instrument(level = tracing::Level::TRACE, skip_all, fields(peer = %self.peer)), timing(precision = "ms"))]
    pub async fn serve(mut self, mut signal: broadcast::Receiver<Signal>) -> Result<(), SessionError> {
        internal!("Connected");

        let result = self.converse(&mut signal).await;

        if let Some(maildrop) = self.maildrop.take() {
            let user = maildrop.user().to_string();
            if let Err(err) = maildrop.close(false).await {
                internal!(level = ERROR, "Failed to release maildrop for {user}: {err}");
            }
        }

        if result.is_ok() {
            if let Err(err) = self.connection.shutdown().await {
                tracing::debug!("Closing connection to {} failed: {err}", self.peer);
            }
        }

        internal!("Connection closed");
        result
    }

    async fn converse(&mut self, signal: &mut broadcast::Receiver<Signal>) -> Result<(), SessionError> {
        self.reply(&Reply::greeting(&self.banner)).await?;

        loop {
            let line = tokio::select! {
                _ = signal.recv() => {
                    internal!(level = INFO, "Shutting down session with {}", self.peer);
                    self.reply(&Reply::shutting_down(&self.banner)).await?;
                    return Ok(());
                }
                line = self.connection.read_line() => line?,
            };

            if line.continuation && !line.is_end_of_stream() {
                internal!("Discarding the rest of an over-long line from {}", self.peer);
                continue;
            }

            let Some(line) = CommandLine::parse(&line.bytes) else {
                internal!("End of input from {}", self.peer);
                return Ok(());
            };

            let command = Command::from(&line);
            incoming!("{command}");

            if self.handle(command.into()).await? == Flow::Close {
                return Ok(());
            }
        }
    }

    /// Run `event` through the state machine, performing actions and feeding
    /// their outcomes back until the state machine has nothing more to do
    async fn handle(&mut self, event: Event) -> Result<Flow, SessionError> {
        let mut input = event;

        loop {
            let (state, action) = std::mem::take(&mut self.state).transition(input);
            self.state = state;

            tracing::debug!(state = ?self.state, ?action, "Transitioned");

            match self.perform(action).await? {
                Flow::Feed(next) => input = next,
                flow => return Ok(flow),
            }
        }
    }

    async fn reply(&mut self, reply: &Reply) -> Result<(), SessionError> {
        if reply.is_ok() {
            outgoing!("{reply}");
        } else {
            outgoing!(level = DEBUG, "{reply}");
        }

        self.connection.send(reply).await?;
        Ok(())
    }
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static> SessionHandler for Session<Stream> {
    async fn run(self, signal: broadcast::Receiver<Signal>) -> Result<(), SessionError> {
        self.serve(signal).await
    }
}
