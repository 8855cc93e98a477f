//! Structured logging.
//!
//! Binaries call [`init`] once in `main`. Library components never touch the
//! global subscriber; they record into the span they were constructed with.
//! Plugins write to stderr so the launcher can tag their lines.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "proxy_plugin=info,tower_http=info";

/// Install the tracing subscriber (env filter + fmt layer on stderr).
pub fn init(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
