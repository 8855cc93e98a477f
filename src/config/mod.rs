//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! raw bytes (bootstrap descriptor / operator file, JSON or YAML)
//!     → loader.rs (detect format & deserialize into PluginDocument)
//!     → TryFrom<PluginDocument> (URL, durations, flush policy)
//!     → TargetConfig (validated, immutable)
//!     → owned by exactly one ForwardingHandler
//!
//! On reconfiguration:
//!     → loader.rs loads the new document
//!     → a new ForwardingHandler is built
//!     → atomic swap (see http::reload)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a full replacement
//! - Every field except `url` has a default
//! - A document that does not validate never produces a handler

pub mod duration;
pub mod loader;
pub mod schema;

pub use loader::{load_target, parse_document, ConfigError};
pub use schema::{FlushPolicy, PluginDocument, TargetConfig};
