//! Turns the bytes of one connection into an allocator call and a reply.
//!
//! The dispatcher owns the arena behind a single mutex; every command runs
//! inside one critical section, and the journal record for a state change
//! is written while the guard is still held, so the status and map in the
//! record are exactly the state the command produced.
//!
//! No command ever fails the connection: errors become short diagnostic
//! replies (plus a warn event), and the two load-bearing reply shapes come
//! from `mnemo_core::reply`.

use std::sync::Mutex;

use mnemo_core::{reply, Command};

use crate::arena::{Arena, ArenaError, DecreaseOutcome};
use crate::journal::Journal;
use crate::value::WriteOutcome;

pub struct Dispatcher {
    arena: Mutex<Arena>,
    journal: Journal,
}

impl Dispatcher {
    pub fn new(arena: Arena, journal: Journal) -> Self {
        Self {
            arena: Mutex::new(arena),
            journal,
        }
    }

    /// Handle one raw command and produce the reply to send back.
    pub fn handle(&self, raw: &str) -> String {
        let command = match Command::parse(raw) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, raw = raw.trim_end(), "rejected command");
                return reply::INVALID_COMMAND.to_string();
            }
        };

        let mut arena = self.arena.lock().unwrap_or_else(|e| e.into_inner());

        match command {
            Command::Create { size, tag } => match arena.create(size, tag) {
                Ok(id) => {
                    self.journal.record(
                        &format!("CREATE -> ID={id}, size={size}, type={tag}"),
                        &arena.status_text(),
                        &arena.map_text(),
                    );
                    reply::created(id)
                }
                Err(e) => {
                    tracing::warn!(size, %tag, error = %e, "create failed");
                    reply::CREATE_FAILED.to_string()
                }
            },

            Command::Set { id, literal } => match arena.set(id, &literal) {
                Ok(outcome) => {
                    self.journal.record(
                        &format!("SET -> ID={id}"),
                        &arena.status_text(),
                        &arena.map_text(),
                    );
                    let mut text = reply::set_ok(id);
                    if outcome == WriteOutcome::Truncated {
                        text.push_str(" (valor truncado)");
                    }
                    text
                }
                Err(ArenaError::UnknownBlock(_)) => {
                    tracing::warn!(id, "set on unknown block");
                    reply::not_found(id)
                }
                Err(e) => {
                    tracing::warn!(id, error = %e, "set failed");
                    format!("No se pudo convertir el valor al tipo del bloque {id}")
                }
            },

            Command::Get { id } => match arena.get(id) {
                Ok(value) => reply::value_of(id, &value),
                Err(e) => {
                    tracing::warn!(id, error = %e, "get on unknown block");
                    reply::not_found(id)
                }
            },

            Command::Increase { id } => match arena.increase(id) {
                Ok(refs) => {
                    self.journal.record(
                        &format!("INCREASE -> ID={id}, refs={refs}"),
                        &arena.status_text(),
                        &arena.map_text(),
                    );
                    reply::increase_ok(id)
                }
                Err(e) => {
                    tracing::warn!(id, error = %e, "increase on unknown block");
                    reply::not_found(id)
                }
            },

            Command::Decrease { id } => match arena.decrease(id) {
                Ok(outcome) => {
                    let action = match outcome {
                        DecreaseOutcome::Alive(refs) => {
                            format!("DECREASE -> ID={id}, refs={refs}")
                        }
                        DecreaseOutcome::Freed => {
                            format!("DECREASE -> ID={id}, refs=0 (LIBERADO)")
                        }
                    };
                    self.journal
                        .record(&action, &arena.status_text(), &arena.map_text());
                    reply::decrease_ok(id)
                }
                Err(e) => {
                    tracing::warn!(id, error = %e, "decrease on unknown block");
                    reply::not_found(id)
                }
            },

            Command::Status => arena.status_text(),
            Command::Map => arena.map_text(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
