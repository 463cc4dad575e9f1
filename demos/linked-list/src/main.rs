//! A singly linked list built out of remote handles.
//!
//! Each node lives in its own arena block; the link to the next node is a
//! serialized block id inside the node's value, `<data>;<next_id>`.
//! Changing a link is read-modify-write: fetch the node, rewrite the field
//! locally, store the whole node back.
//!
//! Run a daemon first:  mnemod --port 8080 --memsize 1 --dumpFolder dumps
//! Then:                linked-list-demo [--addr 127.0.0.1:8080]

use anyhow::{Context, Result};

use libmnemo::{ArenaClient, ClientError, RemotePtr, RemoteValue};
use mnemo_core::{BlockId, TypeTag, NULL_BLOCK};

/// One list cell: a payload and the id of the next cell's block.
#[derive(Debug, Clone, PartialEq)]
struct Node {
    data: i64,
    next: BlockId,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            data: 0,
            next: NULL_BLOCK,
        }
    }
}

impl RemoteValue for Node {
    // Stored as text so the round trip is exact: string blocks come back
    // as their NUL-scanned prefix, not a hex dump.
    const TYPE_TAG: TypeTag = TypeTag::Str;

    fn byte_size() -> usize {
        64
    }

    fn encode(&self) -> String {
        format!("{};{}", self.data, self.next)
    }

    fn decode(literal: &str) -> Result<Self, ClientError> {
        let bad = || ClientError::Decode {
            literal: literal.to_string(),
            ty: "Node",
        };
        let (data, next) = literal.split_once(';').ok_or_else(bad)?;
        Ok(Node {
            data: data.trim().parse().map_err(|_| bad())?,
            next: next.trim().parse().map_err(|_| bad())?,
        })
    }
}

/// Allocate a node block holding `data` with no successor yet.
fn push_node(client: &ArenaClient, data: i64) -> Result<RemotePtr<Node>> {
    let ptr: RemotePtr<Node> = client.alloc()?;
    ptr.write(&Node {
        data,
        next: NULL_BLOCK,
    })?;
    Ok(ptr)
}

/// Point `node` at `next` — the read-modify-write dance.
fn link(node: &RemotePtr<Node>, next: &RemotePtr<Node>) -> Result<()> {
    let mut value = node.read()?;
    value.next = next.id();
    node.write(&value)?;
    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut addr = "127.0.0.1:8080".to_string();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--addr" {
            i += 1;
            addr = args.get(i).context("--addr requires a value")?.clone();
        }
        i += 1;
    }

    let client = ArenaClient::connect(&addr)?;
    println!("before: {}", client.status()?);

    // Build a -> b -> c.
    let a = push_node(&client, 10)?;
    let b = push_node(&client, 20)?;
    let c = push_node(&client, 30)?;
    link(&b, &c)?;
    link(&a, &b)?;

    // Walk from the head. Binding the next id takes a reference for the
    // duration of the visit; reassigning `cursor` releases the previous one.
    println!("list:");
    let mut cursor = a.clone();
    loop {
        let node = cursor.read()?;
        println!("  block {} holds {}", cursor.id(), node.data);
        if node.next == NULL_BLOCK {
            break;
        }
        cursor = RemotePtr::bind(&client, node.next)?;
    }
    drop(cursor);

    println!("with the list alive: {}", client.status()?);

    // The link ids inside node values hold no references; dropping the
    // three handles frees all three blocks.
    drop(a);
    drop(b);
    drop(c);

    println!("after dropping: {}", client.status()?);
    Ok(())
}
