//! mnemod — the mnemo arena daemon.
//!
//! Owns one contiguous arena and serves the text protocol on a TCP port,
//! one command per connection.

mod server;

use std::path::PathBuf;

use anyhow::{Context, Result};

use mnemo_core::config::MnemoConfig;
use mnemo_server::{Arena, Dispatcher, Journal};

fn print_usage() {
    println!("Usage: mnemod [options]");
    println!();
    println!("Options:");
    println!("  --port <n>           Listening TCP port (default: 8080)");
    println!("  --memsize <MB>       Arena size in mebibytes (default: 100)");
    println!("  --dumpFolder <path>  Action log directory; relative paths resolve");
    println!("                       against the executable's directory (default: dumps)");
    println!("  --help               Show this message");
    println!();
    println!("Flags override MNEMO_* environment variables, which override");
    println!("the config file ({}).", MnemoConfig::file_path().display());
}

/// Flag overrides on top of the loaded config.
#[derive(Default)]
struct Flags {
    port: Option<u16>,
    mem_size_mb: Option<usize>,
    dump_folder: Option<String>,
    help: bool,
}

fn parse_flags(args: &[String]) -> Result<Flags> {
    let mut flags = Flags::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                i += 1;
                flags.port = Some(
                    args.get(i)
                        .context("--port requires a value")?
                        .parse()
                        .context("--port must be a number")?,
                );
            }
            "--memsize" => {
                i += 1;
                let mb: usize = args
                    .get(i)
                    .context("--memsize requires a value")?
                    .parse()
                    .context("--memsize must be a number of mebibytes")?;
                anyhow::ensure!(mb > 0, "--memsize must be positive");
                flags.mem_size_mb = Some(mb);
            }
            "--dumpFolder" => {
                i += 1;
                flags.dump_folder = Some(
                    args.get(i)
                        .context("--dumpFolder requires a value")?
                        .clone(),
                );
            }
            "--help" | "-h" => flags.help = true,
            other => anyhow::bail!("unknown option: {other}"),
        }
        i += 1;
    }
    Ok(flags)
}

/// Relative dump folders resolve against the executable's directory, so a
/// daemon started from anywhere writes next to its own binary.
fn resolve_dump_folder(raw: &str) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        return path;
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&path)))
        .unwrap_or(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity, e.g. RUST_LOG=debug mnemod
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let flags = match parse_flags(&args) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("{e}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };
    if flags.help {
        print_usage();
        return Ok(());
    }

    let mut config = MnemoConfig::load().context("failed to load configuration")?;
    if let Some(port) = flags.port {
        config.network.port = port;
    }
    if let Some(mb) = flags.mem_size_mb {
        config.arena.mem_size_mb = mb;
    }
    if let Some(folder) = flags.dump_folder {
        config.journal.dump_folder = folder;
    }

    let capacity = config.capacity_bytes();
    let journal = if config.journal.dump_folder.is_empty() {
        Journal::disabled()
    } else {
        let dir = resolve_dump_folder(&config.journal.dump_folder);
        let journal = Journal::new(&dir)
            .with_context(|| format!("failed to create dump folder {}", dir.display()))?;
        tracing::info!(folder = %dir.display(), "action log enabled");
        journal
    };

    tracing::info!(
        port = config.network.port,
        capacity,
        "mnemod starting"
    );

    let dispatcher = Dispatcher::new(Arena::new(capacity), journal);
    server::run(dispatcher, config.network.port).await
}
