//! Remote pointers: block ids with ownership semantics.
//!
//! A `RemotePtr<T>` stores nothing but a block id and the client it talks
//! through. Ownership maps onto the server's reference counts:
//!
//! - allocating a block starts it at one reference, owned by the new handle
//! - `Clone` sends `increase` — two handles, two references
//! - `Drop` sends `decrease` — the last drop frees the block
//!
//! Reads and writes are explicit methods, and each one is a network round
//! trip; there is no cached local copy. Updating one field of a compound
//! value is therefore read-modify-write by construction.

use std::marker::PhantomData;

use mnemo_core::{BlockId, TypeTag, NULL_BLOCK};

use crate::connector::{ArenaClient, ClientError};

/// Remote capacity allocated for a `String` block when no explicit size is
/// given. `ArenaClient::alloc_sized` overrides it.
pub const DEFAULT_STRING_CAPACITY: usize = 32;

// ── RemoteValue ───────────────────────────────────────────────────────────────

/// A value that can live in an arena block.
///
/// The tag picks the server-side representation; `encode`/`decode` convert
/// between the value and the textual literal that crosses the wire.
/// Compound types (a list node, say) implement this themselves and embed
/// other handles by serializing their ids, conventionally `<data>;<id>`.
pub trait RemoteValue: Default {
    const TYPE_TAG: TypeTag;

    /// Bytes to request when allocating a block for this type.
    fn byte_size() -> usize;

    /// The literal sent in a `set` command.
    fn encode(&self) -> String;

    /// Parse the literal a `get` reply carries.
    fn decode(literal: &str) -> Result<Self, ClientError>;
}

fn decode_failed(literal: &str, ty: &'static str) -> ClientError {
    ClientError::Decode {
        literal: literal.to_string(),
        ty,
    }
}

impl RemoteValue for i32 {
    const TYPE_TAG: TypeTag = TypeTag::Int;

    fn byte_size() -> usize {
        4
    }

    fn encode(&self) -> String {
        self.to_string()
    }

    fn decode(literal: &str) -> Result<Self, ClientError> {
        literal.parse().map_err(|_| decode_failed(literal, "i32"))
    }
}

impl RemoteValue for i64 {
    const TYPE_TAG: TypeTag = TypeTag::Long;

    fn byte_size() -> usize {
        8
    }

    fn encode(&self) -> String {
        self.to_string()
    }

    fn decode(literal: &str) -> Result<Self, ClientError> {
        literal.parse().map_err(|_| decode_failed(literal, "i64"))
    }
}

impl RemoteValue for f32 {
    const TYPE_TAG: TypeTag = TypeTag::Float;

    fn byte_size() -> usize {
        4
    }

    fn encode(&self) -> String {
        self.to_string()
    }

    fn decode(literal: &str) -> Result<Self, ClientError> {
        literal.parse().map_err(|_| decode_failed(literal, "f32"))
    }
}

impl RemoteValue for f64 {
    const TYPE_TAG: TypeTag = TypeTag::Double;

    fn byte_size() -> usize {
        8
    }

    fn encode(&self) -> String {
        self.to_string()
    }

    fn decode(literal: &str) -> Result<Self, ClientError> {
        literal.parse().map_err(|_| decode_failed(literal, "f64"))
    }
}

impl RemoteValue for bool {
    const TYPE_TAG: TypeTag = TypeTag::Bool;

    fn byte_size() -> usize {
        1
    }

    fn encode(&self) -> String {
        if *self { "true" } else { "false" }.to_string()
    }

    fn decode(literal: &str) -> Result<Self, ClientError> {
        match literal {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(decode_failed(other, "bool")),
        }
    }
}

impl RemoteValue for char {
    const TYPE_TAG: TypeTag = TypeTag::Char;

    fn byte_size() -> usize {
        1
    }

    fn encode(&self) -> String {
        self.to_string()
    }

    /// An empty literal is the NUL character — a one-byte block holding 0
    /// formats to it.
    fn decode(literal: &str) -> Result<Self, ClientError> {
        Ok(literal.chars().next().unwrap_or('\0'))
    }
}

impl RemoteValue for u8 {
    const TYPE_TAG: TypeTag = TypeTag::Byte;

    fn byte_size() -> usize {
        1
    }

    fn encode(&self) -> String {
        self.to_string()
    }

    fn decode(literal: &str) -> Result<Self, ClientError> {
        literal.parse().map_err(|_| decode_failed(literal, "u8"))
    }
}

impl RemoteValue for String {
    const TYPE_TAG: TypeTag = TypeTag::Str;

    fn byte_size() -> usize {
        DEFAULT_STRING_CAPACITY
    }

    fn encode(&self) -> String {
        self.clone()
    }

    fn decode(literal: &str) -> Result<Self, ClientError> {
        Ok(literal.to_string())
    }
}

// ── RemotePtr ─────────────────────────────────────────────────────────────────

/// A pointer-like handle to a typed block.
pub struct RemotePtr<T: RemoteValue> {
    client: ArenaClient,
    id: BlockId,
    _type: PhantomData<fn() -> T>,
}

impl ArenaClient {
    /// Allocate a block sized for `T` and hand back its owning pointer.
    pub fn alloc<T: RemoteValue>(&self) -> Result<RemotePtr<T>, ClientError> {
        self.alloc_sized(T::byte_size())
    }

    /// Allocate with an explicit size — string blocks with a chosen
    /// capacity, raw buffers, compound values.
    pub fn alloc_sized<T: RemoteValue>(&self, size: usize) -> Result<RemotePtr<T>, ClientError> {
        let id = self.create_block(size, T::TYPE_TAG)?;
        Ok(RemotePtr {
            client: self.clone(),
            id,
            _type: PhantomData,
        })
    }
}

impl<T: RemoteValue> RemotePtr<T> {
    /// The null handle: reads return `T::default()`, writes are no-ops,
    /// drops send nothing.
    pub fn null(client: &ArenaClient) -> Self {
        Self {
            client: client.clone(),
            id: NULL_BLOCK,
            _type: PhantomData,
        }
    }

    /// Re-materialize a handle from a serialized id (a `next` field read
    /// out of a compound value, say). The new handle owns a reference, so
    /// the server's count is increased; a negative id yields the null
    /// handle without touching the server.
    pub fn bind(client: &ArenaClient, id: BlockId) -> Result<Self, ClientError> {
        if id < 0 {
            return Ok(Self::null(client));
        }
        client.increase(id)?;
        Ok(Self {
            client: client.clone(),
            id,
            _type: PhantomData,
        })
    }

    /// The block id, `NULL_BLOCK` for the null handle. This is the value to
    /// embed when serializing compound structures.
    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn is_null(&self) -> bool {
        self.id < 0
    }

    /// Fetch and decode the block's value. The null handle reads as
    /// `T::default()` without a round trip.
    pub fn read(&self) -> Result<T, ClientError> {
        if self.is_null() {
            return Ok(T::default());
        }
        let literal = self.client.get_block(self.id)?;
        T::decode(&literal)
    }

    /// Encode and store a value into the block. A no-op on the null handle.
    pub fn write(&self, value: &T) -> Result<(), ClientError> {
        if self.is_null() {
            return Ok(());
        }
        self.client.set_block(self.id, &value.encode())
    }
}

/// Copying a handle copies the binding and adds a server-side reference.
/// The increase cannot be reported from here; a failure is logged and the
/// clone still points at the block.
impl<T: RemoteValue> Clone for RemotePtr<T> {
    fn clone(&self) -> Self {
        if self.id >= 0 {
            if let Err(e) = self.client.increase(self.id) {
                tracing::warn!(id = self.id, error = %e, "increase on clone failed");
            }
        }
        Self {
            client: self.client.clone(),
            id: self.id,
            _type: PhantomData,
        }
    }
}

/// Dropping a handle releases its reference; the last drop frees the
/// block. Best-effort — a dead server just means a leaked block there.
impl<T: RemoteValue> Drop for RemotePtr<T> {
    fn drop(&mut self) {
        if self.id >= 0 {
            if let Err(e) = self.client.decrease(self.id) {
                tracing::warn!(id = self.id, error = %e, "decrease on drop failed");
            }
            self.id = NULL_BLOCK;
        }
    }
}

impl<T: RemoteValue> std::fmt::Debug for RemotePtr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "RemotePtr<{}>(null)", T::TYPE_TAG)
        } else {
            write!(f, "RemotePtr<{}>({})", T::TYPE_TAG, self.id)
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
