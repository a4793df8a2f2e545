use std::{
    future::Future,
    net::{Ipv4Addr, SocketAddr},
};

use anyhow::Context;
use mailbag_common::{Signal, internal, listener::Listener, traits::Protocol};
use tokio::{
    net::TcpListener,
    signal::unix::{SignalKind, signal},
    sync::broadcast,
};

///
/// Serve `protocol` on every interface at `port` until SIGINT or SIGTERM
///
/// # Errors
/// If the protocol configuration is invalid, the port cannot be bound, the
/// signal handlers cannot be installed, or accepting a connection fails
///
pub async fn serve<Proto: Protocol>(protocol: Proto, port: u16) -> anyhow::Result<()> {
    let address = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let listener = Listener::new(protocol, address);
    listener.init()?;

    let socket = TcpListener::bind(listener.socket())
        .await
        .with_context(|| format!("Unable to listen on {address}"))?;

    serve_until(&listener, socket, shutdown_requested()?).await
}

///
/// Serve on an already bound socket until `shutdown` completes, then stop
/// accepting and wait for open sessions to wind down
///
/// # Errors
/// If accepting a connection fails
///
pub async fn serve_until<Proto: Protocol>(
    listener: &Listener<Proto>,
    socket: TcpListener,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let (sender, receiver) = broadcast::channel(1);

    let serving = listener.serve_on(socket, receiver);
    tokio::pin!(serving);

    tokio::select! {
        result = &mut serving => return Ok(result?),
        () = shutdown => {
            sender
                .send(Signal::Shutdown)
                .context("Listener stopped before shutdown")?;
        }
    }

    serving.await?;
    internal!(level = INFO, "{} server stopped", Proto::ty());

    Ok(())
}

/// Completes on the first SIGINT or SIGTERM
fn shutdown_requested() -> std::io::Result<impl Future<Output = ()>> {
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                internal!(level = INFO, "CTRL+C received, shutting down");
            }
            _ = terminate.recv() => {
                internal!(level = INFO, "SIGTERM received, shutting down");
            }
        }
    })
}
