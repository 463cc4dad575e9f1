//! The accept loop: one command per connection.
//!
//! Accepts are serial and each connection is served to completion before
//! the next accept, so at most one command is ever in flight — the arena
//! mutex in the dispatcher guards against logical races from the many
//! client processes, not against threads here. A per-connection read
//! deadline keeps a half-open client from wedging the loop.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use mnemo_server::Dispatcher;

/// Upper bound on one received command.
const RECV_BUFFER: usize = 4096;

/// How long a connected client gets to send its command.
const READ_DEADLINE: Duration = Duration::from_secs(5);

/// Listener backlog. Clients connect once per command, so bursts are normal.
const BACKLOG: i32 = 128;

pub async fn run(dispatcher: Dispatcher, port: u16) -> Result<()> {
    let listener = bind(port)?;
    tracing::info!(port, "listening");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                return Ok(());
            }

            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                if let Err(e) = serve_one(&dispatcher, stream).await {
                    tracing::warn!(peer = %peer, error = %e, "connection failed");
                }
            }
        }
    }
}

/// Build the listening socket with address reuse before tokio takes over.
fn bind(port: u16) -> Result<TcpListener> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
        .context("failed to create listening socket")?;
    socket
        .set_reuse_address(true)
        .context("failed to set SO_REUSEADDR")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    socket
        .bind(&addr.into())
        .with_context(|| format!("failed to bind {addr}"))?;
    socket.listen(BACKLOG).context("failed to listen")?;
    socket
        .set_nonblocking(true)
        .context("failed to set nonblocking")?;

    TcpListener::from_std(socket.into()).context("failed to register listener with tokio")
}

/// Read one command, dispatch it, send the reply, close.
async fn serve_one(dispatcher: &Dispatcher, mut stream: TcpStream) -> Result<()> {
    let mut buf = vec![0u8; RECV_BUFFER];
    let n = tokio::time::timeout(READ_DEADLINE, stream.read(&mut buf))
        .await
        .context("client sent nothing before the read deadline")?
        .context("receive failed")?;
    if n == 0 {
        anyhow::bail!("connection closed before a command arrived");
    }

    let text = String::from_utf8_lossy(&buf[..n]);
    tracing::debug!(command = %text.trim_end(), "received");

    let reply = dispatcher.handle(&text);
    stream
        .write_all(reply.as_bytes())
        .await
        .context("failed to send reply")?;
    tracing::debug!(reply = %reply.lines().next().unwrap_or(""), "replied");

    let _ = stream.shutdown().await;
    Ok(())
}
