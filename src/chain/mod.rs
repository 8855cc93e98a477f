//! Plugin chain subsystem.
//!
//! # Data Flow
//! ```text
//! PluginSpec[] → launch_chain (back to front)
//!     → SocketAllocator::allocate → BootstrapDescriptor
//!     → ProcessSupervisor::spawn (descriptor on stdin, output → LogSink)
//!     → ChainLink (Launching → Ready → Terminated)
//!
//! Host → entry link socket → plugin → next link socket → … → target
//! ```
//!
//! # Design Decisions
//! - Each link learns only its own socket and its successor's
//! - Process spawning sits behind a trait so chains can be tested without
//!   real executables
//! - Links are stopped when the `Chain` is dropped

pub mod bootstrap;
pub mod launcher;
pub mod link;
pub mod socket;
pub mod supervisor;

use std::time::Duration;

use thiserror::Error;

pub use bootstrap::{BootstrapDescriptor, BootstrapError};
pub use launcher::{Chain, PluginChainLauncher, PluginSpec, DEFAULT_READY_TIMEOUT};
pub use link::{ChainLink, LinkState};
pub use socket::{SocketAllocator, TempSocketAllocator};
pub use supervisor::{
    LogSink, ProcessHandle, ProcessState, ProcessSupervisor, StdStream, TokioSupervisor,
    TracingLogSink,
};

/// Error type for launching plugins.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("plugin executable not found: {0}")]
    NotFound(String),

    #[error("failed to start plugin {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode bootstrap descriptor: {0}")]
    Descriptor(#[from] serde_json::Error),

    #[error("failed to deliver bootstrap descriptor to {name}: {source}")]
    Bootstrap {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("plugin {name} did not open its socket within {timeout:?}")]
    NotReady { name: String, timeout: Duration },

    #[error("plugin {name} exited during startup")]
    Exited { name: String },
}
