use std::net::SocketAddr;

use futures_util::future::join_all;
use mailbag_tracing::traced;
use tokio::{net::TcpListener, sync::broadcast, task::JoinHandle};

use crate::{
    Signal,
    error::ListenerError,
    internal,
    traits::protocol::{Protocol, SessionHandler},
};

/// Accepts connections on one socket and runs a session for each of them
pub struct Listener<Proto: Protocol> {
    handler: Proto,
    socket: SocketAddr,
}

impl<Proto: Protocol> Listener<Proto> {
    pub const fn new(handler: Proto, socket: SocketAddr) -> Self {
        Self { handler, socket }
    }

    #[must_use]
    pub const fn socket(&self) -> SocketAddr {
        self.socket
    }

    ///
    /// Validate the protocol before anything is bound
    ///
    /// # Errors
    /// If the protocol configuration is unusable
    ///
    #[traced(instrument(skip(self)), timing(precision = "ns"))]
    pub fn init(&self) -> Result<(), ListenerError> {
        internal!("Initialising {} listener on {}", Proto::ty(), self.socket);

        Ok(self.handler.validate()?)
    }

    ///
    /// Serve connections from an already bound listener until shutdown
    ///
    /// On shutdown no further connections are accepted and every open session
    /// is awaited before returning.
    ///
    /// # Errors
    /// If accepting a connection fails
    ///
    #[traced(instrument(level = tracing::Level::TRACE, skip_all), timing(precision = "s"))]
    pub async fn serve_on(
        &self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<Signal>,
    ) -> Result<(), ListenerError> {
        let local = listener.local_addr().unwrap_or(self.socket);
        internal!(level = INFO, "{} listening on {}", Proto::ty(), local);

        let mut sessions: Vec<JoinHandle<()>> = Vec::default();

        loop {
            tokio::select! {
                sig = shutdown.recv() => {
                    if matches!(sig, Ok(Signal::Shutdown) | Err(broadcast::error::RecvError::Closed)) {
                        internal!(
                            level = INFO,
                            "{} listener {} received shutdown signal, finishing {} sessions ...",
                            Proto::ty(),
                            local,
                            sessions.len()
                        );
                        join_all(sessions).await;
                        return Ok(());
                    }
                }

                connection = listener.accept() => {
                    let (stream, peer) = connection?;
                    tracing::debug!("Connection received on {local} from {peer}");

                    let session = self.handler.handle(stream, peer);
                    let signal = shutdown.resubscribe();

                    sessions.retain(|handle| !handle.is_finished());
                    sessions.push(tokio::spawn(async move {
                        if let Err(err) = session.run(signal).await {
                            internal!(level = ERROR, "Session with {peer} failed: {err}");
                        }
                    }));
                }
            }
        }
    }
}
