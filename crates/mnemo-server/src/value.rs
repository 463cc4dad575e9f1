//! Typed block contents: parse a text literal into a block's bytes and
//! format the bytes back to text.
//!
//! Scalars are written in host byte order at the start of the block; any
//! bytes beyond the scalar width are left untouched. Strings always keep a
//! NUL terminator inside the block, so at most `size - 1` payload bytes are
//! stored. Writes that had to cut the literal report `Truncated` and still
//! succeed; only an unparseable numeric literal fails, and a failed parse
//! leaves the block bytes exactly as they were.

use mnemo_core::TypeTag;

/// Outcome of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The literal did not fit and was cut to the block size.
    Truncated,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("literal {literal:?} is not a valid {tag}")]
pub struct ParseError {
    pub literal: String,
    pub tag: TypeTag,
}

fn parse_failed(literal: &str, tag: TypeTag) -> ParseError {
    ParseError {
        literal: literal.to_string(),
        tag,
    }
}

/// Parse `literal` as `tag` and write it into `dest` (the block's bytes).
///
/// `dest.len()` is the block size; `create` already guaranteed it holds the
/// tag's minimum, so the fixed-width branches index unconditionally.
pub fn write_literal(
    dest: &mut [u8],
    tag: TypeTag,
    literal: &str,
) -> Result<WriteOutcome, ParseError> {
    match tag {
        TypeTag::Int => {
            let v: i32 = literal
                .trim()
                .parse()
                .map_err(|_| parse_failed(literal, tag))?;
            dest[..4].copy_from_slice(&v.to_ne_bytes());
            Ok(WriteOutcome::Written)
        }
        TypeTag::Long => {
            let v: i64 = literal
                .trim()
                .parse()
                .map_err(|_| parse_failed(literal, tag))?;
            dest[..8].copy_from_slice(&v.to_ne_bytes());
            Ok(WriteOutcome::Written)
        }
        TypeTag::Float => {
            let v: f32 = literal
                .trim()
                .parse()
                .map_err(|_| parse_failed(literal, tag))?;
            dest[..4].copy_from_slice(&v.to_ne_bytes());
            Ok(WriteOutcome::Written)
        }
        TypeTag::Double => {
            let v: f64 = literal
                .trim()
                .parse()
                .map_err(|_| parse_failed(literal, tag))?;
            dest[..8].copy_from_slice(&v.to_ne_bytes());
            Ok(WriteOutcome::Written)
        }
        TypeTag::Bool => {
            let v = match literal.trim() {
                "true" | "1" => 1u8,
                "false" | "0" => 0u8,
                _ => return Err(parse_failed(literal, tag)),
            };
            dest[0] = v;
            Ok(WriteOutcome::Written)
        }
        TypeTag::Char => {
            // Exactly one byte; an empty literal writes NUL.
            dest[0] = literal.bytes().next().unwrap_or(0);
            if literal.len() > 1 {
                Ok(WriteOutcome::Truncated)
            } else {
                Ok(WriteOutcome::Written)
            }
        }
        TypeTag::Byte => {
            let v: u8 = literal
                .trim()
                .parse()
                .map_err(|_| parse_failed(literal, tag))?;
            dest[0] = v;
            Ok(WriteOutcome::Written)
        }
        TypeTag::Str => {
            if dest.is_empty() {
                // Nothing to store, not even the terminator.
                return Ok(WriteOutcome::Truncated);
            }
            let capacity = dest.len() - 1;
            let bytes = literal.as_bytes();
            let copy_len = bytes.len().min(capacity);
            dest[..copy_len].copy_from_slice(&bytes[..copy_len]);
            dest[copy_len] = 0;
            if bytes.len() > capacity {
                Ok(WriteOutcome::Truncated)
            } else {
                Ok(WriteOutcome::Written)
            }
        }
        TypeTag::Raw => {
            let bytes = literal.as_bytes();
            let copy_len = bytes.len().min(dest.len());
            dest[..copy_len].copy_from_slice(&bytes[..copy_len]);
            if bytes.len() > dest.len() {
                Ok(WriteOutcome::Truncated)
            } else {
                Ok(WriteOutcome::Written)
            }
        }
    }
}

/// Format a block's bytes per its tag.
pub fn format_bytes(src: &[u8], tag: TypeTag) -> String {
    match tag {
        TypeTag::Int => {
            let mut b = [0u8; 4];
            b.copy_from_slice(&src[..4]);
            i32::from_ne_bytes(b).to_string()
        }
        TypeTag::Long => {
            let mut b = [0u8; 8];
            b.copy_from_slice(&src[..8]);
            i64::from_ne_bytes(b).to_string()
        }
        TypeTag::Float => {
            let mut b = [0u8; 4];
            b.copy_from_slice(&src[..4]);
            f32::from_ne_bytes(b).to_string()
        }
        TypeTag::Double => {
            let mut b = [0u8; 8];
            b.copy_from_slice(&src[..8]);
            f64::from_ne_bytes(b).to_string()
        }
        TypeTag::Bool => {
            if src[0] != 0 { "true" } else { "false" }.to_string()
        }
        TypeTag::Char => char::from(src[0]).to_string(),
        TypeTag::Byte => src[0].to_string(),
        TypeTag::Str => {
            let len = src.iter().position(|&b| b == 0).unwrap_or(src.len());
            String::from_utf8_lossy(&src[..len]).into_owned()
        }
        TypeTag::Raw => src
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" "),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
