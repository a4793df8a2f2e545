use std::net::SocketAddr;

use tokio::{net::TcpStream, sync::broadcast};

use crate::{
    Signal,
    error::{ProtocolError, SessionError},
};

pub trait SessionHandler {
    fn run(
        self,
        signal: broadcast::Receiver<Signal>,
    ) -> impl std::future::Future<Output = Result<(), SessionError>> + Send;
}

pub trait Protocol: Send + Sync {
    type Session: SessionHandler + Send + 'static;

    /// Build the session that will own `stream` for its whole lifetime
    fn handle(&self, stream: TcpStream, peer: SocketAddr) -> Self::Session;

    ///
    /// Validate the protocol configuration before any socket is bound
    ///
    /// # Errors
    /// When the configuration could never produce a working session, e.g. a
    /// maximum line length too short to hold the shortest command.
    ///
    fn validate(&self) -> Result<(), ProtocolError>;

    fn ty() -> &'static str;
}
