//! Bootstrap descriptor exchanged on a plugin's stdin.
//!
//! One JSON object on one line:
//!
//! ```text
//! {"socket_path":"/tmp/proxy-3f2c….sock","forward_socket_path":"","configuration":"dXJsOi…"}
//! ```
//!
//! `configuration` holds the plugin's raw configuration bytes, base64-encoded.
//! An empty `forward_socket_path` marks the terminal link.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Error type for reading a descriptor on the plugin side.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to read bootstrap descriptor: {0}")]
    Io(#[from] std::io::Error),

    #[error("stdin closed before a bootstrap descriptor arrived")]
    Empty,

    #[error("malformed bootstrap descriptor: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapDescriptor {
    /// Socket the plugin must listen on.
    pub socket_path: String,

    /// Socket of the next link; empty for the terminal link.
    #[serde(default)]
    pub forward_socket_path: String,

    /// Raw plugin configuration.
    #[serde(default, with = "base64_bytes")]
    pub configuration: Vec<u8>,
}

impl BootstrapDescriptor {
    /// Next link's socket, if any.
    pub fn forward_socket(&self) -> Option<&Path> {
        if self.forward_socket_path.is_empty() {
            None
        } else {
            Some(Path::new(&self.forward_socket_path))
        }
    }

    /// Encode as a single newline-terminated JSON line.
    pub fn to_line(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }

    /// Read exactly one descriptor line from `reader`.
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, BootstrapError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Err(BootstrapError::Empty);
            }
            if !line.trim().is_empty() {
                break;
            }
        }
        Ok(serde_json::from_str(line.trim())?)
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
