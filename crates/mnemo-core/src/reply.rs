//! Reply shapes shared by server and client.
//!
//! The protocol has no machine-readable status field: replies are short
//! human-readable strings, and clients detect success by substring. Two
//! shapes are load-bearing and must never change:
//!
//!   `Bloque creado con ID=<n>`   — clients scan for `ID=` and parse the id
//!   `Bloque <id> -> <value>`     — clients scan for `->` and take the rest
//!
//! Everything else is diagnostic text; clients ignore its content.

use crate::types::BlockId;

/// Reply to a failed `create`.
pub const CREATE_FAILED: &str = "Error al crear bloque (espacio insuficiente o inválido).";

/// Reply to a command the grammar does not recognize.
pub const INVALID_COMMAND: &str = "Comando inválido";

/// Successful `create` reply. Clients parse this one.
pub fn created(id: BlockId) -> String {
    format!("Bloque creado con ID={id}")
}

/// Successful `get` reply. Clients parse this one.
pub fn value_of(id: BlockId, value: &str) -> String {
    format!("Bloque {id} -> {value}")
}

/// Successful `set` reply.
pub fn set_ok(id: BlockId) -> String {
    format!("Valor asignado al bloque {id}")
}

/// Successful `increase` reply.
pub fn increase_ok(id: BlockId) -> String {
    format!("RefCount incrementado en bloque {id}")
}

/// Successful `decrease` reply.
pub fn decrease_ok(id: BlockId) -> String {
    format!("RefCount decrementado en bloque {id}")
}

/// Reply for any operation naming an id with no live block.
pub fn not_found(id: BlockId) -> String {
    format!("Bloque {id} no encontrado")
}

// ── Client-side scanners ──────────────────────────────────────────────────────

/// Extract the block id from a `create` reply, if it reports one.
pub fn parse_created(reply: &str) -> Option<BlockId> {
    let (_, after) = reply.split_once("ID=")?;
    let end = after
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && *c == '-')))
        .map(|(i, _)| i)
        .unwrap_or(after.len());
    after[..end].parse().ok()
}

/// Extract the formatted value from a `get` reply: everything after the
/// first `->`, trimmed of surrounding whitespace.
pub fn parse_value(reply: &str) -> Option<&str> {
    let (_, after) = reply.split_once("->")?;
    Some(after.trim())
}

/// Whether a reply reports the "unknown block" condition.
pub fn is_not_found(reply: &str) -> bool {
    reply.contains("no encontrado")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
