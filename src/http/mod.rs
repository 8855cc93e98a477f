//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Unix socket (plugin) / TCP (chain host)
//!     → server.rs (Axum setup, tracing layer, graceful shutdown)
//!     → reload.rs (load the active handler once per request)
//!     → forward.rs (route: target or next link; rewrite; dispatch)
//!     → response.rs (header policy, flush policy, error → 502/504)
//!     → Send to caller
//! ```

pub mod forward;
pub mod reload;
pub mod response;
pub mod server;

pub use forward::ForwardingHandler;
pub use reload::ReloadableHandler;
pub use response::{adapt_body, UpstreamError};
pub use server::PluginServer;
