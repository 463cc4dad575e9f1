//! libmnemo — client side of the mnemo arena.
//!
//! `ArenaClient` speaks the one-command-per-connection text protocol;
//! `RemotePtr<T>` wraps a block id in pointer-like ownership: cloning a
//! handle adds a server-side reference, dropping one releases it, and the
//! block is freed when the last reference goes.
//!
//! All I/O is blocking `std::net` — a handle must be able to release its
//! reference from `Drop`, and destructors cannot await.

pub mod connector;
pub mod remote;

pub use connector::{ArenaClient, ClientError};
pub use remote::{RemotePtr, RemoteValue, DEFAULT_STRING_CAPACITY};

pub use mnemo_core::{BlockId, TypeTag, NULL_BLOCK};
