//! Configuration schema definitions.
//!
//! `PluginDocument` is the document exactly as the operator wrote it.
//! `TargetConfig` is the validated, immutable form that a forwarding handler
//! closes over.

use std::time::Duration;

use axum::http::uri::{Authority, Scheme};
use axum::http::HeaderValue;
use serde::{Deserialize, Serialize};
use url::Url;

/// Raw plugin configuration document (JSON or YAML).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PluginDocument {
    /// Absolute target URL, e.g. `http://backend:8080/base`.
    pub url: String,

    /// Prefix stripped from inbound request paths.
    #[serde(default)]
    pub proxy_path: String,

    /// Forward headers carrying the internal prefix instead of dropping them.
    #[serde(default)]
    pub preserve_internal_headers: bool,

    /// Flush interval for streamed responses ("0" = flush at end only).
    #[serde(default = "default_zero_duration")]
    pub flush_interval: String,

    /// Upstream request timeout ("0" = none).
    #[serde(default = "default_zero_duration")]
    pub timeout: String,

    /// Relay requests outside `proxy_path` to the next chain link.
    #[serde(default)]
    pub pass_unmatched: bool,
}

fn default_zero_duration() -> String {
    "0".to_string()
}

/// How response bytes are pushed to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
    /// Coalesce and flush when the buffer fills or the body ends.
    Buffered,
    /// Like `Buffered`, plus a flush on every tick.
    Periodic(Duration),
    /// Push every chunk as soon as it arrives.
    Immediate,
}

/// Validated forwarding target.
#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub(crate) url: Url,
    pub(crate) scheme: Scheme,
    pub(crate) authority: Authority,
    pub(crate) host_header: HeaderValue,
    pub(crate) proxy_path: String,
    pub(crate) preserve_internal_headers: bool,
    pub(crate) flush: FlushPolicy,
    pub(crate) timeout: Option<Duration>,
    pub(crate) pass_unmatched: bool,
}

impl TargetConfig {
    /// Full target URL as configured.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Base path requests are joined onto.
    pub fn base_path(&self) -> &str {
        self.url.path()
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Proxy path with trailing slashes removed.
    pub fn proxy_path(&self) -> &str {
        &self.proxy_path
    }

    pub fn preserve_internal_headers(&self) -> bool {
        self.preserve_internal_headers
    }

    pub fn flush_policy(&self) -> FlushPolicy {
        self.flush
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn pass_unmatched(&self) -> bool {
        self.pass_unmatched
    }
}
