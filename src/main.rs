//! `proxy-plugin`: one link of a proxy chain.
//!
//! ```text
//!                 ┌──────────────────────── proxy-plugin ───────────────────────┐
//!   stdin ───────▶│ bootstrap descriptor → config → ForwardingHandler           │
//!                 │                                                             │
//!   socket_path ─▶│ PluginServer ─┬─ prefix match ─▶ rewrite ─▶ HTTP client ────┼──▶ target
//!                 │               └─ unmatched (pass_unmatched) ──▶ UnixProxy ──┼──▶ next link
//!                 └─────────────────────────────────────────────────────────────┘
//!   stderr ◀── tracing
//! ```
//!
//! Exits non-zero when the descriptor or configuration is invalid.

use proxy_plugin::lifecycle::Shutdown;
use proxy_plugin::observability::logging;
use proxy_plugin::plugin;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init(logging::DEFAULT_FILTER);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "proxy-plugin starting");

    let descriptor = match plugin::read_bootstrap(tokio::io::stdin()).await {
        Ok(descriptor) => descriptor,
        Err(e) => {
            tracing::error!(error = %e, "No usable bootstrap descriptor");
            return Err(e.into());
        }
    };

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    shutdown.spawn_signal_listener();

    if let Err(e) = plugin::serve(descriptor, receiver).await {
        tracing::error!(error = %e, "proxy-plugin refused to start");
        return Err(e.into());
    }

    tracing::info!("proxy-plugin stopped");
    Ok(())
}
