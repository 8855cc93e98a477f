//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Plugin startup:
//!     → unix.rs bind_unix (socket_path from the bootstrap descriptor)
//!     → Hand off to HTTP layer (http::server)
//!
//! Calls into a chain link:
//!     → unix.rs UnixProxy (connect, HTTP/1.1 handshake, send)
//!     → streamed response back to the caller
//! ```

pub mod unix;

pub use unix::{bind_unix, UnixProxy};
