//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events inside the span injected at construction
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → logging.rs subscriber (stderr; the launcher tags plugin lines)
//!     → Prometheus scrape endpoint (proxy-chain only)
//! ```

pub mod logging;
pub mod metrics;
