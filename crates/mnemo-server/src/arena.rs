//! The arena: one contiguous buffer, a map of live blocks, and a free list.
//!
//! Allocation is first-fit over free extents kept sorted by offset, carving
//! from the low end of the chosen extent. Freeing returns the extent to the
//! list and immediately coalesces adjacent neighbours, so after every
//! completed operation the live blocks and free extents partition the whole
//! buffer and no two free extents touch. Blocks never move; a reported
//! offset stays valid for the block's whole life.
//!
//! Ids come from a monotonic counter and are never reused, so a stale id
//! held by a client after a free can only fail lookup.

use std::collections::BTreeMap;

use mnemo_core::{BlockId, TypeTag};

use crate::value::{self, WriteOutcome};

/// A live allocation.
#[derive(Debug, Clone)]
pub struct Block {
    pub offset: usize,
    pub size: usize,
    pub tag: TypeTag,
    pub ref_count: u32,
}

/// An unallocated span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeExtent {
    pub offset: usize,
    pub size: usize,
}

/// Outcome of a successful `decrease`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecreaseOutcome {
    /// The block survives with this many references.
    Alive(u32),
    /// The count reached zero; the block was freed and its extent coalesced.
    Freed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArenaError {
    #[error("no free extent fits {0} bytes")]
    NoSpace(usize),
    #[error("size {size} is below the minimum {min} for type {tag}")]
    TooSmall {
        size: usize,
        tag: TypeTag,
        min: usize,
    },
    #[error("no block has id {0}")]
    UnknownBlock(BlockId),
    #[error(transparent)]
    ParseFailed(#[from] value::ParseError),
}

pub struct Arena {
    buf: Vec<u8>,
    blocks: BTreeMap<BlockId, Block>,
    free: Vec<FreeExtent>,
    next_id: BlockId,
    used: usize,
}

impl Arena {
    /// An arena over `capacity` zeroed bytes, all of it one free extent.
    pub fn new(capacity: usize) -> Self {
        let mut free = Vec::new();
        if capacity > 0 {
            free.push(FreeExtent {
                offset: 0,
                size: capacity,
            });
        }
        Self {
            buf: vec![0u8; capacity],
            blocks: BTreeMap::new(),
            free,
            next_id: 1,
            used: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Live blocks in id order. Diagnostics and tests only.
    pub fn live_blocks(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.blocks.iter().map(|(id, b)| (*id, b))
    }

    /// Free extents in offset order. Diagnostics and tests only.
    pub fn free_extents(&self) -> &[FreeExtent] {
        &self.free
    }

    // ── Operations ────────────────────────────────────────────────────────────

    /// Allocate a block: first-fit over the free list, carved from the low
    /// end of the chosen extent. The new block starts with one reference.
    pub fn create(&mut self, size: usize, tag: TypeTag) -> Result<BlockId, ArenaError> {
        let min = tag.min_size().max(1);
        if size < min {
            return Err(ArenaError::TooSmall {
                size,
                tag,
                min,
            });
        }

        let slot = self
            .free
            .iter()
            .position(|e| e.size >= size)
            .ok_or(ArenaError::NoSpace(size))?;

        let offset = self.free[slot].offset;
        self.free[slot].offset += size;
        self.free[slot].size -= size;
        if self.free[slot].size == 0 {
            self.free.remove(slot);
        }

        let id = self.next_id;
        self.next_id += 1;
        self.blocks.insert(
            id,
            Block {
                offset,
                size,
                tag,
                ref_count: 1,
            },
        );
        self.used += size;

        tracing::debug!(id, size, %tag, offset, "block created");
        Ok(id)
    }

    /// Parse `literal` as the block's tag and write it into the block.
    /// A failed parse leaves the block bytes untouched.
    pub fn set(&mut self, id: BlockId, literal: &str) -> Result<WriteOutcome, ArenaError> {
        let block = self
            .blocks
            .get(&id)
            .ok_or(ArenaError::UnknownBlock(id))?;
        let (offset, size, tag) = (block.offset, block.size, block.tag);

        let outcome = value::write_literal(&mut self.buf[offset..offset + size], tag, literal)?;
        if outcome == WriteOutcome::Truncated {
            tracing::warn!(id, size, %tag, "literal truncated to block size");
        }
        Ok(outcome)
    }

    /// Format the block's bytes per its tag.
    pub fn get(&self, id: BlockId) -> Result<String, ArenaError> {
        let block = self
            .blocks
            .get(&id)
            .ok_or(ArenaError::UnknownBlock(id))?;
        Ok(value::format_bytes(
            &self.buf[block.offset..block.offset + block.size],
            block.tag,
        ))
    }

    /// Add one reference. Returns the new count.
    pub fn increase(&mut self, id: BlockId) -> Result<u32, ArenaError> {
        let block = self
            .blocks
            .get_mut(&id)
            .ok_or(ArenaError::UnknownBlock(id))?;
        block.ref_count += 1;
        Ok(block.ref_count)
    }

    /// Drop one reference. At zero the block is removed, its extent joins
    /// the free list, and adjacent free extents are merged — all in this
    /// call, so a zero-count block is never observable.
    pub fn decrease(&mut self, id: BlockId) -> Result<DecreaseOutcome, ArenaError> {
        let block = self
            .blocks
            .get_mut(&id)
            .ok_or(ArenaError::UnknownBlock(id))?;

        if block.ref_count > 1 {
            block.ref_count -= 1;
            return Ok(DecreaseOutcome::Alive(block.ref_count));
        }

        let block = self.blocks.remove(&id).ok_or(ArenaError::UnknownBlock(id))?;
        self.used -= block.size;
        self.free.push(FreeExtent {
            offset: block.offset,
            size: block.size,
        });
        self.coalesce();
        tracing::debug!(id, size = block.size, offset = block.offset, "block freed");
        Ok(DecreaseOutcome::Freed)
    }

    /// One-line summary: capacity, used, free, next id, live block count.
    pub fn status_text(&self) -> String {
        format!(
            "totalSize={}, usedSize={}, freeSize={}, nextID={}, blocks={}",
            self.capacity(),
            self.used,
            self.capacity() - self.used,
            self.next_id,
            self.blocks.len()
        )
    }

    /// Every live block plus every free extent. The `addr` field is the
    /// buffer base plus the offset; it exists for eyeballing dumps only.
    pub fn map_text(&self) -> String {
        let base = self.buf.as_ptr() as usize;
        let mut out = String::from("Mapa de memoria:\n");
        if self.blocks.is_empty() {
            out.push_str("  (sin bloques)\n");
        }
        for (id, b) in &self.blocks {
            let rendered =
                value::format_bytes(&self.buf[b.offset..b.offset + b.size], b.tag);
            out.push_str(&format!(
                "  ID={} offset={} addr={:#x} size={} tipo={} refs={} valor={}\n",
                id,
                b.offset,
                base + b.offset,
                b.size,
                b.tag,
                b.ref_count,
                rendered
            ));
        }
        out.push_str("Bloques libres:\n");
        if self.free.is_empty() {
            out.push_str("  (ninguno)\n");
        }
        for e in &self.free {
            out.push_str(&format!("  offset={} size={}\n", e.offset, e.size));
        }
        out
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    /// Sort the free list by offset and merge touching neighbours.
    fn coalesce(&mut self) {
        self.free.sort_by_key(|e| e.offset);
        let mut merged: Vec<FreeExtent> = Vec::with_capacity(self.free.len());
        for extent in self.free.drain(..) {
            match merged.last_mut() {
                Some(last) if last.offset + last.size == extent.offset => {
                    last.size += extent.size;
                }
                _ => merged.push(extent),
            }
        }
        self.free = merged;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
