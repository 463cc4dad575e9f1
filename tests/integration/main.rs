//! mnemo integration test harness.
//!
//! Every test spawns a real mnemod on a private port and talks to it over
//! the wire exactly as clients do: one TCP connection per command. Build
//! the workspace first; tests skip themselves when the daemon binary is
//! missing:
//!
//!   cargo build
//!   cargo test --test integration
//!
//! Daemon tests run serialized via DAEMON_LOCK so their listeners and dump
//! folders never collide.

use anyhow::{bail, Context, Result};
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::path::PathBuf;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::thread;
use std::time::Duration;

use libmnemo::{ArenaClient, ClientError, RemotePtr, RemoteValue};
use mnemo_core::reply::parse_created;
use mnemo_core::{BlockId, TypeTag, NULL_BLOCK};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Serializes all daemon-based tests.
static DAEMON_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Each test daemon gets its own port.
static NEXT_PORT: AtomicU16 = AtomicU16::new(7850);

/// Default arena for tests: 1 MiB.
const TEST_CAPACITY: usize = 1024 * 1024;

// ── Binary paths ──────────────────────────────────────────────────────────────

fn mnemod_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("target/debug/mnemod")
}

fn binaries_available() -> bool {
    mnemod_path().exists()
}

// ── Daemon helpers ────────────────────────────────────────────────────────────

/// A running mnemod, killed and cleaned up on drop.
struct Daemon {
    child: Child,
    port: u16,
    dump_dir: PathBuf,
}

impl Daemon {
    /// Spawn a daemon with a 1 MiB arena and wait until it answers.
    fn spawn() -> Result<Daemon> {
        let port = NEXT_PORT.fetch_add(1, Ordering::Relaxed);
        let dump_dir = std::env::temp_dir().join(format!(
            "mnemo-test-{}-{}",
            std::process::id(),
            port
        ));
        let _ = std::fs::remove_dir_all(&dump_dir);

        let child = Command::new(mnemod_path())
            .args(["--port", &port.to_string()])
            .args(["--memsize", "1"])
            .args(["--dumpFolder", dump_dir.to_str().unwrap()])
            .env("RUST_LOG", "warn")
            .spawn()
            .context("failed to spawn mnemod")?;

        let daemon = Daemon {
            child,
            port,
            dump_dir,
        };
        daemon.wait_until_ready(40)?;
        Ok(daemon)
    }

    /// Poll with real `status` commands until the daemon answers.
    fn wait_until_ready(&self, max_attempts: u32) -> Result<()> {
        for attempt in 1..=max_attempts {
            if let Ok(reply) = send(self.port, "status") {
                if reply.contains("totalSize=") {
                    return Ok(());
                }
            }
            if attempt < max_attempts {
                thread::sleep(Duration::from_millis(250));
            }
        }
        bail!("mnemod on port {} never became ready", self.port)
    }

    fn client(&self) -> ArenaClient {
        ArenaClient::new(SocketAddr::from(([127, 0, 0, 1], self.port)))
    }

    fn dump_file(&self) -> PathBuf {
        self.dump_dir.join("memory_dump.txt")
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.dump_dir);
    }
}

/// One command, one connection: connect, write, half-close, read the reply.
fn send(port: u16, command: &str) -> Result<String> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let mut stream = TcpStream::connect_timeout(&addr, Duration::from_secs(2))
        .with_context(|| format!("failed to connect to mnemod on port {port}"))?;
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;

    stream.write_all(command.as_bytes())?;
    stream.shutdown(Shutdown::Write)?;

    let mut reply = Vec::new();
    stream.read_to_end(&mut reply)?;
    Ok(String::from_utf8_lossy(&reply).into_owned())
}

/// `create` via raw text, returning the parsed id.
fn create(port: u16, size: usize, ty: &str) -> Result<BlockId> {
    let reply = send(port, &format!("create {size} {ty}"))?;
    parse_created(&reply).with_context(|| format!("create did not return an id: {reply:?}"))
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[test]
fn create_set_get_free_cycle() -> Result<()> {
    if !binaries_available() {
        eprintln!("skipping: build mnemod first (cargo build)");
        return Ok(());
    }
    let _guard = DAEMON_LOCK.lock().unwrap();
    let daemon = Daemon::spawn()?;

    let id = create(daemon.port, 4, "int")?;
    assert_eq!(id, 1);

    let reply = send(daemon.port, &format!("set {id} 42"))?;
    assert_eq!(reply, "Valor asignado al bloque 1");

    let reply = send(daemon.port, &format!("get {id}"))?;
    assert!(reply.contains("-> 42"), "unexpected get reply: {reply:?}");

    send(daemon.port, &format!("decrease {id}"))?;
    let status = send(daemon.port, "status")?;
    assert!(status.contains("usedSize=0"), "status: {status:?}");
    assert!(
        status.contains(&format!("freeSize={TEST_CAPACITY}")),
        "status: {status:?}"
    );
    assert!(status.contains("blocks=0"), "status: {status:?}");
    Ok(())
}

#[test]
fn exhaustion_then_reuse_of_freed_space() -> Result<()> {
    if !binaries_available() {
        eprintln!("skipping: build mnemod first (cargo build)");
        return Ok(());
    }
    let _guard = DAEMON_LOCK.lock().unwrap();
    let daemon = Daemon::spawn()?;

    // Fill the whole arena with one raw block.
    let big = create(daemon.port, TEST_CAPACITY, "raw")?;

    let reply = send(daemon.port, "create 1 char")?;
    assert!(
        reply.contains("Error al crear bloque"),
        "expected exhaustion, got: {reply:?}"
    );

    // Freeing the big block makes room; the new id keeps increasing.
    send(daemon.port, &format!("decrease {big}"))?;
    let small = create(daemon.port, 1, "char")?;
    assert!(small > big);

    let map = send(daemon.port, "map")?;
    assert!(map.contains(&format!("ID={small} offset=0")), "map: {map}");
    Ok(())
}

#[test]
fn string_blocks_truncate_with_advisory() -> Result<()> {
    if !binaries_available() {
        eprintln!("skipping: build mnemod first (cargo build)");
        return Ok(());
    }
    let _guard = DAEMON_LOCK.lock().unwrap();
    let daemon = Daemon::spawn()?;

    let id = create(daemon.port, 4, "string")?;
    let reply = send(daemon.port, &format!("set {id} Hello"))?;
    assert!(reply.contains("valor truncado"), "reply: {reply:?}");

    let reply = send(daemon.port, &format!("get {id}"))?;
    assert!(reply.contains("-> Hel"), "reply: {reply:?}");
    Ok(())
}

#[test]
fn refcount_survives_three_increases() -> Result<()> {
    if !binaries_available() {
        eprintln!("skipping: build mnemod first (cargo build)");
        return Ok(());
    }
    let _guard = DAEMON_LOCK.lock().unwrap();
    let daemon = Daemon::spawn()?;

    let id = create(daemon.port, 4, "int")?;
    for _ in 0..3 {
        send(daemon.port, &format!("increase {id}"))?;
    }

    // Three decreases leave the block alive.
    for _ in 0..3 {
        send(daemon.port, &format!("decrease {id}"))?;
        let status = send(daemon.port, "status")?;
        assert!(status.contains("blocks=1"), "status: {status:?}");
    }

    // The fourth frees it.
    send(daemon.port, &format!("decrease {id}"))?;
    let status = send(daemon.port, "status")?;
    assert!(status.contains("blocks=0"), "status: {status:?}");
    assert!(status.contains("usedSize=0"), "status: {status:?}");

    // And a fifth finds nothing.
    let reply = send(daemon.port, &format!("decrease {id}"))?;
    assert!(reply.contains("no encontrado"), "reply: {reply:?}");
    Ok(())
}

#[test]
fn freed_neighbours_coalesce_into_one_extent() -> Result<()> {
    if !binaries_available() {
        eprintln!("skipping: build mnemod first (cargo build)");
        return Ok(());
    }
    let _guard = DAEMON_LOCK.lock().unwrap();
    let daemon = Daemon::spawn()?;

    let a = create(daemon.port, 4, "int")?;
    let b = create(daemon.port, 4, "int")?;
    send(daemon.port, &format!("decrease {a}"))?;
    send(daemon.port, &format!("decrease {b}"))?;

    let map = send(daemon.port, "map")?;
    assert!(map.contains("(sin bloques)"), "map: {map}");
    assert!(
        map.contains(&format!("offset=0 size={TEST_CAPACITY}")),
        "free list did not collapse: {map}"
    );
    Ok(())
}

#[test]
fn ids_stay_unique_across_frees() -> Result<()> {
    if !binaries_available() {
        eprintln!("skipping: build mnemod first (cargo build)");
        return Ok(());
    }
    let _guard = DAEMON_LOCK.lock().unwrap();
    let daemon = Daemon::spawn()?;

    let mut last = 0;
    for _ in 0..5 {
        let id = create(daemon.port, 8, "double")?;
        assert!(id > last, "id {id} did not increase past {last}");
        send(daemon.port, &format!("decrease {id}"))?;
        last = id;
    }

    // A long-freed id stays dead.
    let reply = send(daemon.port, "get 1")?;
    assert!(reply.contains("no encontrado"), "reply: {reply:?}");
    Ok(())
}

#[test]
fn set_literals_keep_interior_spaces() -> Result<()> {
    if !binaries_available() {
        eprintln!("skipping: build mnemod first (cargo build)");
        return Ok(());
    }
    let _guard = DAEMON_LOCK.lock().unwrap();
    let daemon = Daemon::spawn()?;

    let id = create(daemon.port, 32, "string")?;
    send(daemon.port, &format!("set {id} hola mundo feliz"))?;
    let reply = send(daemon.port, &format!("get {id}"))?;
    assert!(reply.contains("-> hola mundo feliz"), "reply: {reply:?}");
    Ok(())
}

#[test]
fn malformed_and_unknown_commands_get_normal_replies() -> Result<()> {
    if !binaries_available() {
        eprintln!("skipping: build mnemod first (cargo build)");
        return Ok(());
    }
    let _guard = DAEMON_LOCK.lock().unwrap();
    let daemon = Daemon::spawn()?;

    assert_eq!(send(daemon.port, "destroy 1")?, "Comando inválido");
    assert_eq!(send(daemon.port, "create 4")?, "Comando inválido");

    let reply = send(daemon.port, "get 999")?;
    assert!(reply.contains("no encontrado"), "reply: {reply:?}");

    // The daemon is still healthy afterwards.
    let id = create(daemon.port, 4, "int")?;
    assert_eq!(id, 1);
    Ok(())
}

#[test]
fn scalar_round_trips_over_the_wire() -> Result<()> {
    if !binaries_available() {
        eprintln!("skipping: build mnemod first (cargo build)");
        return Ok(());
    }
    let _guard = DAEMON_LOCK.lock().unwrap();
    let daemon = Daemon::spawn()?;

    let cases = [
        (4, "int", "-2147483648"),
        (8, "long", "9007199254740993"),
        (4, "float", "1.5"),
        (8, "double", "-2.25"),
        (1, "bool", "true"),
        (1, "char", "z"),
        (1, "byte", "255"),
        (16, "string", "hola"),
    ];
    for (size, ty, literal) in cases {
        let id = create(daemon.port, size, ty)?;
        send(daemon.port, &format!("set {id} {literal}"))?;
        let reply = send(daemon.port, &format!("get {id}"))?;
        assert!(
            reply.contains(&format!("-> {literal}")),
            "{ty} round trip failed: {reply:?}"
        );
        send(daemon.port, &format!("decrease {id}"))?;
    }
    Ok(())
}

#[test]
fn journal_records_every_state_change() -> Result<()> {
    if !binaries_available() {
        eprintln!("skipping: build mnemod first (cargo build)");
        return Ok(());
    }
    let _guard = DAEMON_LOCK.lock().unwrap();
    let daemon = Daemon::spawn()?;

    let id = create(daemon.port, 4, "int")?;
    send(daemon.port, &format!("set {id} 7"))?;
    send(daemon.port, &format!("increase {id}"))?;
    send(daemon.port, &format!("decrease {id}"))?;
    send(daemon.port, &format!("decrease {id}"))?;

    let text = std::fs::read_to_string(daemon.dump_file())
        .context("dump file was not written")?;
    assert!(text.contains("CREATE -> ID=1, size=4, type=int"), "{text}");
    assert!(text.contains("SET -> ID=1"), "{text}");
    assert!(text.contains("INCREASE -> ID=1, refs=2"), "{text}");
    assert!(text.contains("DECREASE -> ID=1, refs=1"), "{text}");
    assert!(text.contains("DECREASE -> ID=1, refs=0 (LIBERADO)"), "{text}");
    // Records open with a bracketed timestamp and embed the full state.
    assert!(text.starts_with("[20"), "no timestamp: {text}");
    assert!(text.contains("Mapa de memoria:"), "{text}");
    Ok(())
}

// ── The handle API end to end ─────────────────────────────────────────────────

/// Same node convention the linked-list demo uses: `<data>;<next_id>`.
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

#[test]
fn linked_list_via_remote_handles() -> Result<()> {
    if !binaries_available() {
        eprintln!("skipping: build mnemod first (cargo build)");
        return Ok(());
    }
    let _guard = DAEMON_LOCK.lock().unwrap();
    let daemon = Daemon::spawn()?;
    let client = daemon.client();

    // Build a -> b -> c by read-modify-write of the next fields.
    let a: RemotePtr<Node> = client.alloc()?;
    let b: RemotePtr<Node> = client.alloc()?;
    let c: RemotePtr<Node> = client.alloc()?;
    a.write(&Node { data: 10, next: NULL_BLOCK })?;
    b.write(&Node { data: 20, next: NULL_BLOCK })?;
    c.write(&Node { data: 30, next: NULL_BLOCK })?;

    let mut value = b.read()?;
    value.next = c.id();
    b.write(&value)?;

    let mut value = a.read()?;
    value.next = b.id();
    a.write(&value)?;

    // Traverse from the head until the null sentinel.
    let mut seen = Vec::new();
    let mut cursor = a.clone();
    loop {
        let node = cursor.read()?;
        seen.push(node.data);
        if node.next == NULL_BLOCK {
            break;
        }
        cursor = RemotePtr::bind(&client, node.next)?;
    }
    drop(cursor);
    assert_eq!(seen, vec![10, 20, 30]);

    // Embedded ids hold no references: after the transient traversal
    // handles are gone, every node is back to one owner.
    let map = client.map()?;
    for ptr in [&a, &b, &c] {
        assert!(
            map.contains(&format!("ID={} ", ptr.id())),
            "missing block in map: {map}"
        );
    }
    assert_eq!(map.matches("refs=1").count(), 3, "map: {map}");

    drop(a);
    drop(b);
    drop(c);

    let status = client.status()?;
    assert!(status.contains("blocks=0"), "status: {status:?}");
    assert!(status.contains("usedSize=0"), "status: {status:?}");
    Ok(())
}

#[test]
fn handle_clone_holds_the_block_alive() -> Result<()> {
    if !binaries_available() {
        eprintln!("skipping: build mnemod first (cargo build)");
        return Ok(());
    }
    let _guard = DAEMON_LOCK.lock().unwrap();
    let daemon = Daemon::spawn()?;
    let client = daemon.client();

    let original: RemotePtr<i32> = client.alloc()?;
    original.write(&99)?;
    let copy = original.clone();

    drop(original);

    // The copy still owns a reference; the value is intact.
    assert_eq!(copy.read()?, 99);
    let status = client.status()?;
    assert!(status.contains("blocks=1"), "status: {status:?}");

    drop(copy);
    let status = client.status()?;
    assert!(status.contains("blocks=0"), "status: {status:?}");
    Ok(())
}

#[test]
fn stale_handle_reads_fail_cleanly() -> Result<()> {
    if !binaries_available() {
        eprintln!("skipping: build mnemod first (cargo build)");
        return Ok(());
    }
    let _guard = DAEMON_LOCK.lock().unwrap();
    let daemon = Daemon::spawn()?;
    let client = daemon.client();

    let ptr: RemotePtr<i32> = client.alloc()?;
    let id = ptr.id();

    // Another client frees the block out from under the handle.
    send(daemon.port, &format!("decrease {id}"))?;

    assert!(matches!(
        ptr.read(),
        Err(ClientError::UnknownBlock(stale)) if stale == id
    ));
    assert!(matches!(
        ptr.write(&1),
        Err(ClientError::UnknownBlock(_))
    ));
    Ok(())
}
