use std::{net::SocketAddr, time::Duration};

use mailbag_common::{
    Signal,
    connection::Connection,
    error::{ProtocolError, SessionError},
    listener::Listener,
    traits::{Protocol, SessionHandler},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::broadcast,
};

/// Replies to every line with its length until the client hangs up
struct Echo {
    connection: Connection<TcpStream>,
}

impl SessionHandler for Echo {
    async fn run(mut self, mut signal: broadcast::Receiver<Signal>) -> Result<(), SessionError> {
        loop {
            tokio::select! {
                _ = signal.recv() => {
                    self.connection.send(&"bye").await?;
                    return Ok(());
                }
                line = self.connection.read_line() => {
                    let line = line?;
                    if line.is_end_of_stream() {
                        return Ok(());
                    }
                    self.connection.send(&line.bytes.len()).await?;
                }
            }
        }
    }
}

struct EchoProtocol {
    max_line_length: usize,
}

impl Protocol for EchoProtocol {
    type Session = Echo;

    fn handle(&self, stream: TcpStream, _peer: SocketAddr) -> Self::Session {
        Echo {
            connection: Connection::new(stream, self.max_line_length),
        }
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        if self.max_line_length == 0 {
            return Err(ProtocolError::InvalidConfiguration {
                field: "max_line_length",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    fn ty() -> &'static str {
        "Echo"
    }
}

#[tokio::test]
async fn serves_until_shutdown() {
    let socket = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = socket.local_addr().unwrap();

    let listener = Listener::new(EchoProtocol { max_line_length: 64 }, address);
    listener.init().unwrap();

    let (tx, rx) = broadcast::channel(1);
    let server = tokio::spawn(async move { listener.serve_on(socket, rx).await });

    let mut client = TcpStream::connect(address).await.unwrap();
    client.write_all(b"NOOP\r\n").await.unwrap();

    let mut reply = [0; 3];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(&reply, b"6\r\n");

    tx.send(Signal::Shutdown).unwrap();

    let mut rest = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut rest))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rest, b"bye\r\n");

    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[test]
fn init_rejects_invalid_protocol() {
    let listener = Listener::new(
        EchoProtocol { max_line_length: 0 },
        "127.0.0.1:0".parse().unwrap(),
    );

    assert!(listener.init().is_err());
}
