//! Socket path allocation.
//!
//! Paths are `<dir>/<name>-<uuid>.sock`. The allocator also remembers every
//! path it handed out and skips paths already present on disk, so a path is
//! never issued twice while the process runs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use uuid::Uuid;

/// Longest name fragment kept in a socket file name. Unix socket paths are
/// limited to ~108 bytes in total.
const MAX_NAME_LEN: usize = 24;

/// Hands out collision-resistant socket paths.
pub trait SocketAllocator: Send + Sync {
    fn allocate(&self, name: &str) -> PathBuf;
}

/// Allocates sockets in a directory (the system temp dir by default).
#[derive(Debug)]
pub struct TempSocketAllocator {
    dir: PathBuf,
    issued: Mutex<HashSet<PathBuf>>,
}

impl TempSocketAllocator {
    pub fn new() -> Self {
        Self::in_dir(std::env::temp_dir())
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            issued: Mutex::new(HashSet::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Default for TempSocketAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl SocketAllocator for TempSocketAllocator {
    fn allocate(&self, name: &str) -> PathBuf {
        let stem = socket_stem(name);
        let mut issued = self.issued.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            let path = self
                .dir
                .join(format!("{}-{}.sock", stem, Uuid::new_v4().simple()));
            if !path.exists() && issued.insert(path.clone()) {
                return path;
            }
        }
    }
}

/// File-name-safe fragment derived from a plugin name or executable path.
fn socket_stem(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name);

    let stem: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(MAX_NAME_LEN)
        .collect();

    if stem.is_empty() {
        "plugin".to_string()
    } else {
        stem
    }
}
