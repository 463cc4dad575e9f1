//! mnemo-ctl — command-line client for a running mnemod.

use anyhow::{Context, Result};

use libmnemo::ArenaClient;
use mnemo_core::TypeTag;

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

fn print_usage() {
    println!("Usage: mnemo-ctl [--addr <host:port>] <command>");
    println!();
    println!("Arena");
    println!("  status                     Size, usage, and block count");
    println!("  map                        Every live block and free extent");
    println!();
    println!("Blocks");
    println!("  create <size> <type>       Allocate a block (type: int, long, float,");
    println!("                             double, bool, char, string, byte, raw)");
    println!("  set <id> <value...>        Write a value into a block");
    println!("  get <id>                   Read a block's value");
    println!("  increase <id>              Add a reference");
    println!("  decrease <id>              Drop a reference (frees at zero)");
    println!();
    println!("Escape hatch");
    println!("  raw <text...>              Send the text verbatim");
    println!();
    println!(
        "Options:\n  --addr <host:port>         Server address (default: {})",
        DEFAULT_ADDR
    );
    println!();
    println!("Examples:");
    println!("  mnemo-ctl create 4 int");
    println!("  mnemo-ctl set 1 42");
    println!("  mnemo-ctl get 1");
    println!("  mnemo-ctl --addr 10.0.0.5:8080 status");
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --addr option
    let mut addr = DEFAULT_ADDR.to_string();
    let mut remaining: Vec<String> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--addr" {
            i += 1;
            addr = args
                .get(i)
                .context("--addr requires a value")?
                .clone();
        } else {
            remaining.push(args[i].clone());
        }
        i += 1;
    }

    let remaining_refs: Vec<&str> = remaining.iter().map(|s| s.as_str()).collect();

    // set takes the rest of the argv as the literal, spaces included.
    if remaining_refs.first() == Some(&"set") && remaining_refs.len() >= 2 {
        let client = ArenaClient::connect(&addr)?;
        let id = remaining_refs[1];
        let literal = remaining[2..].join(" ");
        let reply = client.send(&format!("set {id} {literal}"))?;
        println!("{reply}");
        return Ok(());
    }

    // raw ships whatever follows, verbatim.
    if remaining_refs.first() == Some(&"raw") && remaining_refs.len() >= 2 {
        let client = ArenaClient::connect(&addr)?;
        let reply = client.send(&remaining[1..].join(" "))?;
        println!("{reply}");
        return Ok(());
    }

    match remaining_refs.as_slice() {
        ["status"] | [] => {
            let client = ArenaClient::connect(&addr)?;
            println!("{}", client.status()?);
            Ok(())
        }
        ["map"] => {
            let client = ArenaClient::connect(&addr)?;
            print!("{}", client.map()?);
            Ok(())
        }
        ["create", size, ty] => {
            let size: usize = size.parse().context("<size> must be a number of bytes")?;
            let tag = TypeTag::parse(ty)
                .map_err(|e| anyhow::anyhow!("{e} (try int, long, float, double, bool, char, string, byte, raw)"))?;
            let client = ArenaClient::connect(&addr)?;
            let id = client.create_block(size, tag)?;
            println!("Bloque creado con ID={id}");
            Ok(())
        }
        ["get", id] => {
            let id = id.parse().context("<id> must be a number")?;
            let client = ArenaClient::connect(&addr)?;
            println!("{}", client.get_block(id)?);
            Ok(())
        }
        ["increase", id] => {
            let id = id.parse().context("<id> must be a number")?;
            let client = ArenaClient::connect(&addr)?;
            client.increase(id)?;
            println!("RefCount incrementado en bloque {id}");
            Ok(())
        }
        ["decrease", id] => {
            let id = id.parse().context("<id> must be a number")?;
            let client = ArenaClient::connect(&addr)?;
            client.decrease(id)?;
            println!("RefCount decrementado en bloque {id}");
            Ok(())
        }
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
