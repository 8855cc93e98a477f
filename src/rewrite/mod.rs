//! Request rewriting ("director") subsystem.
//!
//! # Data Flow
//! ```text
//! inbound path + TargetConfig
//!     → path.rs (strip proxy_path, join onto target base path)
//! inbound headers + TargetConfig
//!     → headers.rs (drop internal headers unless preserved)
//! ```
//!
//! Everything here is pure and allocation-light; no I/O, no errors.

pub mod headers;
pub mod path;

pub use headers::{apply_header_policy, is_internal_header, INTERNAL_HEADER_PREFIX};
pub use path::{join_paths, rewrite_path, strip_proxy_path};
