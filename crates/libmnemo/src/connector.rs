//! The transport: one TCP connection per command.
//!
//! The server closes the connection after every reply, so the client opens
//! a fresh socket each time: connect, write the command, half-close the
//! write side, read the whole reply. Replies carry no status field — the
//! typed helpers below detect outcomes by the protocol's two load-bearing
//! substrings (`ID=`, `->`) and by the "no encontrado" diagnostic.

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use mnemo_core::{reply, BlockId, Command, TypeTag};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const IO_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to reach the arena server at {addr} — is mnemod running?")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("i/o error talking to the arena server")]
    Io(#[from] std::io::Error),
    #[error("no address resolved for {0:?}")]
    BadAddress(String),
    #[error("unexpected reply from the server: {0:?}")]
    Protocol(String),
    #[error("block {0} is gone on the server")]
    UnknownBlock(BlockId),
    #[error("could not decode {literal:?} as {ty}")]
    Decode { literal: String, ty: &'static str },
}

/// Handle to one arena server. Cheap to clone; every clone talks to the
/// same address and owns no connection state.
#[derive(Debug, Clone)]
pub struct ArenaClient {
    addr: SocketAddr,
}

impl ArenaClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Resolve a `host:port` string.
    pub fn connect(addr: &str) -> Result<Self, ClientError> {
        let resolved = addr
            .to_socket_addrs()
            .map_err(|_| ClientError::BadAddress(addr.to_string()))?
            .next()
            .ok_or_else(|| ClientError::BadAddress(addr.to_string()))?;
        Ok(Self::new(resolved))
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Send one raw command and return the server's reply verbatim.
    pub fn send(&self, command: &str) -> Result<String, ClientError> {
        let mut stream =
            TcpStream::connect_timeout(&self.addr, CONNECT_TIMEOUT).map_err(|source| {
                ClientError::Connect {
                    addr: self.addr,
                    source,
                }
            })?;
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;

        stream.write_all(command.as_bytes())?;
        stream.shutdown(Shutdown::Write)?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw)?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    // ── Typed commands ────────────────────────────────────────────────────────

    /// `create <size> <type>` — returns the new block's id.
    pub fn create_block(&self, size: usize, tag: TypeTag) -> Result<BlockId, ClientError> {
        let text = self.send(&Command::Create { size, tag }.to_string())?;
        reply::parse_created(&text).ok_or(ClientError::Protocol(text))
    }

    /// `set <id> <literal>`.
    pub fn set_block(&self, id: BlockId, literal: &str) -> Result<(), ClientError> {
        let text = self.send(
            &Command::Set {
                id,
                literal: literal.to_string(),
            }
            .to_string(),
        )?;
        if reply::is_not_found(&text) {
            return Err(ClientError::UnknownBlock(id));
        }
        Ok(())
    }

    /// `get <id>` — returns the formatted value after `->`.
    pub fn get_block(&self, id: BlockId) -> Result<String, ClientError> {
        let text = self.send(&Command::Get { id }.to_string())?;
        if reply::is_not_found(&text) {
            return Err(ClientError::UnknownBlock(id));
        }
        reply::parse_value(&text)
            .map(|v| v.to_string())
            .ok_or(ClientError::Protocol(text))
    }

    /// `increase <id>`.
    pub fn increase(&self, id: BlockId) -> Result<(), ClientError> {
        let text = self.send(&Command::Increase { id }.to_string())?;
        if reply::is_not_found(&text) {
            return Err(ClientError::UnknownBlock(id));
        }
        Ok(())
    }

    /// `decrease <id>`.
    pub fn decrease(&self, id: BlockId) -> Result<(), ClientError> {
        let text = self.send(&Command::Decrease { id }.to_string())?;
        if reply::is_not_found(&text) {
            return Err(ClientError::UnknownBlock(id));
        }
        Ok(())
    }

    /// `status` — the server's one-line summary.
    pub fn status(&self) -> Result<String, ClientError> {
        self.send(&Command::Status.to_string())
    }

    /// `map` — the server's full memory map.
    pub fn map(&self) -> Result<String, ClientError> {
        self.send(&Command::Map.to_string())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
