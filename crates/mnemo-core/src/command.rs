//! The command grammar: one text command per TCP connection.
//!
//! Tokens are separated by ASCII whitespace and the first token is the verb:
//!
//! ```text
//! create   <size> <type>
//! set      <id>   <literal…>
//! get      <id>
//! increase <id>
//! decrease <id>
//! status
//! map
//! ```
//!
//! The `set` literal is everything after the single space that follows the
//! id token, verbatim, up to the end of the received text (a trailing
//! `\r\n`/`\n` is stripped first). It may be empty and may contain interior
//! or leading spaces beyond the separator.

use std::fmt;

use crate::types::{BlockId, TypeTag, TypeTagError};

/// One parsed protocol command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Create { size: usize, tag: TypeTag },
    Set { id: BlockId, literal: String },
    Get { id: BlockId },
    Increase { id: BlockId },
    Decrease { id: BlockId },
    Status,
    Map,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown verb: {0:?}")]
    UnknownVerb(String),
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("not a number: {0:?}")]
    BadNumber(String),
    #[error(transparent)]
    BadType(#[from] TypeTagError),
    #[error("trailing input after {0:?}")]
    TrailingInput(&'static str),
}

impl Command {
    /// Parse the raw bytes of one connection, interpreted as text.
    pub fn parse(raw: &str) -> Result<Command, CommandError> {
        let text = raw.trim_end_matches(['\r', '\n']);
        let text = text.trim_start();
        let (verb, rest) = match text.find(|c: char| c.is_ascii_whitespace()) {
            Some(i) => (&text[..i], &text[i..]),
            None => (text, ""),
        };

        match verb {
            "" => Err(CommandError::Empty),
            "create" => {
                let mut args = rest.split_ascii_whitespace();
                let size = args
                    .next()
                    .ok_or(CommandError::MissingArgument("size"))
                    .and_then(parse_size)?;
                let tag = args
                    .next()
                    .ok_or(CommandError::MissingArgument("type"))
                    .and_then(|t| Ok(TypeTag::parse(t)?))?;
                if args.next().is_some() {
                    return Err(CommandError::TrailingInput("create"));
                }
                Ok(Command::Create { size, tag })
            }
            "set" => {
                // Single-space literal rule: consume the id token, then
                // exactly one space; the remainder is the literal, verbatim.
                let rest = rest.trim_start();
                let (id_token, literal) = match rest.split_once(' ') {
                    Some((id, lit)) => (id, lit),
                    None => (rest, ""),
                };
                let id = parse_id(id_token)?;
                Ok(Command::Set {
                    id,
                    literal: literal.to_string(),
                })
            }
            "get" => Ok(Command::Get {
                id: single_id(rest, "get")?,
            }),
            "increase" => Ok(Command::Increase {
                id: single_id(rest, "increase")?,
            }),
            "decrease" => Ok(Command::Decrease {
                id: single_id(rest, "decrease")?,
            }),
            "status" => bare(rest, "status", Command::Status),
            "map" => bare(rest, "map", Command::Map),
            other => Err(CommandError::UnknownVerb(other.to_string())),
        }
    }
}

fn parse_size(token: &str) -> Result<usize, CommandError> {
    token
        .parse()
        .map_err(|_| CommandError::BadNumber(token.to_string()))
}

fn parse_id(token: &str) -> Result<BlockId, CommandError> {
    if token.is_empty() {
        return Err(CommandError::MissingArgument("id"));
    }
    token
        .parse()
        .map_err(|_| CommandError::BadNumber(token.to_string()))
}

fn single_id(rest: &str, verb: &'static str) -> Result<BlockId, CommandError> {
    let mut args = rest.split_ascii_whitespace();
    let id = args
        .next()
        .ok_or(CommandError::MissingArgument("id"))
        .and_then(parse_id)?;
    if args.next().is_some() {
        return Err(CommandError::TrailingInput(verb));
    }
    Ok(id)
}

fn bare(rest: &str, verb: &'static str, cmd: Command) -> Result<Command, CommandError> {
    if rest.split_ascii_whitespace().next().is_some() {
        return Err(CommandError::TrailingInput(verb));
    }
    Ok(cmd)
}

/// Renders the command exactly as a client puts it on the wire.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Create { size, tag } => write!(f, "create {size} {tag}"),
            Command::Set { id, literal } => write!(f, "set {id} {literal}"),
            Command::Get { id } => write!(f, "get {id}"),
            Command::Increase { id } => write!(f, "increase {id}"),
            Command::Decrease { id } => write!(f, "decrease {id}"),
            Command::Status => f.write_str("status"),
            Command::Map => f.write_str("map"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
