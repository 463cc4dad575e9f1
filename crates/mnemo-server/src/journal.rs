//! The action log: an append-only, human-readable trace of every state
//! change, written to `<dump_folder>/memory_dump.txt`.
//!
//! Each record is self-contained — a local timestamp with millisecond
//! precision, a one-line action summary, then the full status and memory
//! map at that instant — so any single record can be read without the ones
//! before it. Writes are best-effort: an I/O failure is logged and the
//! operation that triggered the record still succeeds.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// File name inside the dump folder.
pub const DUMP_FILE: &str = "memory_dump.txt";

pub struct Journal {
    dir: Option<PathBuf>,
}

impl Journal {
    /// A journal that records nothing. Used until a dump folder is set.
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    /// A journal writing under `dir`. The directory is created if absent.
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir: Some(dir) })
    }

    /// Path of the dump file, when enabled.
    pub fn path(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join(DUMP_FILE))
    }

    /// Append one record. Failures are warnings, never errors.
    pub fn record(&self, action: &str, status: &str, map: &str) {
        let Some(path) = self.path() else {
            return;
        };

        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let mut entry = format!("[{stamp}] {action}\n{status}\n{map}");
        if !entry.ends_with('\n') {
            entry.push('\n');
        }

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| file.write_all(entry.as_bytes()));

        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "journal write failed");
        }
    }
}
