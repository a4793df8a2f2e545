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
use mailbag_store::MailStore;
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

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Feed(Event),
    Close,
}

/// One SMTP conversation with a connected client
pub struct Session<Stream: AsyncRead + AsyncWrite + Unpin + Send> {
    peer: SocketAddr,
    state: State,
    banner: Arc<str>,
    connection: Connection<Stream>,
    store: Arc<dyn MailStore>,
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
            state: State::new(config.max_message_size),
            banner: Arc::clone(&config.banner),
            connection: Connection::new(stream, config.max_line_length),
            store,
        }
    }

    /// Serve the client until it quits, hangs up, or the server shuts down
    #[traced(instrument(level = tracing::Level::TRACE, skip_all, fields(peer = %self.peer)), timing(precision = "ms"))]
    pub async fn serve(mut self, mut signal: broadcast::Receiver<Signal>) -> Result<(), SessionError> {
        internal!("Connected");

        let result = self.converse(&mut signal).await;

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

            if line.is_end_of_stream() {
                internal!("End of input from {}", self.peer);
                return Ok(());
            }

            let event = if self.state.is_receiving() {
                // A bare CRLF is content here; only a closed stream ends the session
                if line.continuation {
                    Event::BodyContinuation(line.bytes)
                } else {
                    Event::BodyLine(line.bytes)
                }
            } else if line.continuation {
                internal!("Discarding the rest of an over-long line from {}", self.peer);
                continue;
            } else {
                let Some(line) = CommandLine::parse(&line.bytes) else {
                    internal!("End of input from {}", self.peer);
                    return Ok(());
                };

                let command = Command::from(&line);
                incoming!("{command}");
                command.into()
            };

            if self.handle(event).await? == Flow::Close {
                return Ok(());
            }
        }
    }

    async fn handle(&mut self, event: Event) -> Result<Flow, SessionError> {
        let mut input = event;

        loop {
            let (state, action) = std::mem::take(&mut self.state).transition(input);
            self.state = state;

            tracing::debug!(state = ?self.state.phase(), ?action, "Transitioned");

            match self.perform(action).await? {
                Flow::Feed(next) => input = next,
                flow => return Ok(flow),
            }
        }
    }

    async fn reply(&mut self, reply: &Reply) -> Result<(), SessionError> {
        outgoing!("{reply}");
        self.connection.send(reply).await?;
        Ok(())
    }
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static> SessionHandler for Session<Stream> {
    async fn run(self, signal: broadcast::Receiver<Signal>) -> Result<(), SessionError> {
        self.serve(signal).await
    }
}
