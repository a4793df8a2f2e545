pub mod command;
pub mod envelope;
pub mod reply;
pub mod session;
pub mod state;
pub mod status;

use std::{net::SocketAddr, sync::Arc};

use mailbag_common::{config::SessionConfig, error::ProtocolError, traits::Protocol};
use mailbag_store::MailStore;
use tokio::net::TcpStream;

pub use session::Session;

/// SMTP submission into a shared mail store
#[derive(Debug, Clone)]
pub struct Smtp {
    config: SessionConfig,
    store: Arc<dyn MailStore>,
}

impl Smtp {
    #[must_use]
    pub fn new(config: SessionConfig, store: Arc<dyn MailStore>) -> Self {
        Self { config, store }
    }
}

impl Protocol for Smtp {
    type Session = Session<TcpStream>;

    fn handle(&self, stream: TcpStream, peer: SocketAddr) -> Self::Session {
        Session::create(stream, peer, &self.config, Arc::clone(&self.store))
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        self.config.validate()
    }

    fn ty() -> &'static str {
        "SMTP"
    }
}
