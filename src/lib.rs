//! Chained HTTP reverse-proxy plugin.
//!
//! A plugin is one link in a chain of local processes. It receives HTTP on a
//! Unix socket, rewrites the path under its configured prefix, and forwards
//! to one configured target (or relays residual traffic to the next link).

pub mod chain;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod plugin;
pub mod rewrite;

pub use chain::{Chain, ChainLink, LaunchError, PluginChainLauncher, PluginSpec};
pub use config::{ConfigError, TargetConfig};
pub use http::{ForwardingHandler, PluginServer, ReloadableHandler, UpstreamError};
pub use lifecycle::Shutdown;
