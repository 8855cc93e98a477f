//! Process lifecycle.
//!
//! # Data Flow
//! ```text
//! SIGINT / SIGTERM (signals.rs)
//!     → Shutdown::trigger (shutdown.rs)
//!     → every server subscribed to the broadcast stops accepting
//!     → in-flight requests finish → main returns
//! ```
//!
//! # Design Decisions
//! - One broadcast channel per process; servers subscribe before they start
//! - The chain host stops its links after its own server has drained

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_termination;
