//! Atomic handler replacement.
//!
//! A reconfiguration never mutates a live handler. A new `ForwardingHandler`
//! is built from the new document and swapped in whole; requests that loaded
//! the old one keep it until they finish.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::ConfigError;
use crate::http::forward::ForwardingHandler;

/// Holds the active forwarding handler.
#[derive(Debug)]
pub struct ReloadableHandler {
    current: ArcSwap<ForwardingHandler>,
}

impl ReloadableHandler {
    pub fn new(handler: ForwardingHandler) -> Self {
        Self {
            current: ArcSwap::from_pointee(handler),
        }
    }

    /// The handler a new request should use.
    pub fn current(&self) -> Arc<ForwardingHandler> {
        self.current.load_full()
    }

    /// Swap in a prebuilt handler.
    pub fn replace(&self, handler: ForwardingHandler) {
        self.current.store(Arc::new(handler));
    }

    /// Build a handler from `raw` and swap it in.
    ///
    /// The next-link relay and the span of the current handler carry over.
    /// On error the current handler stays active.
    pub fn reconfigure(&self, raw: &[u8]) -> Result<(), ConfigError> {
        let current = self.current();
        let span = current.span().clone();
        let _entered = span.enter();

        let fresh = match ForwardingHandler::from_raw_config(raw) {
            Ok(handler) => handler.with_span(span.clone()),
            Err(e) => {
                tracing::error!(error = %e, "Reconfiguration rejected, keeping current target");
                return Err(e);
            }
        };

        let fresh = match current.next_link() {
            Some(next) => fresh.with_next_link(next.clone()),
            None => fresh,
        };

        tracing::info!(upstream = %fresh.config().url(), "Forwarding handler replaced");
        self.replace(fresh);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::UnixProxy;

    fn reloadable(raw: &str) -> ReloadableHandler {
        ReloadableHandler::new(ForwardingHandler::from_raw_config(raw.as_bytes()).unwrap())
    }

    #[test]
    fn test_reconfigure_swaps_target() {
        let handler = reloadable(r#"{"url": "http://one.example"}"#);
        let before = handler.current();

        handler
            .reconfigure(br#"{"url": "http://two.example/base"}"#)
            .unwrap();

        assert_eq!(before.config().url().as_str(), "http://one.example/");
        assert_eq!(handler.current().config().url().as_str(), "http://two.example/base");
    }

    #[test]
    fn test_failed_reconfigure_keeps_current() {
        let handler = reloadable(r#"{"url": "http://one.example"}"#);
        let err = handler.reconfigure(br#"{"url": "not a url"}"#).unwrap_err();

        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
        assert_eq!(handler.current().config().url().as_str(), "http://one.example/");
    }

    #[test]
    fn test_reconfigure_keeps_next_link() {
        let first = ForwardingHandler::from_raw_config(br#"{"url": "http://one.example"}"#)
            .unwrap()
            .with_next_link(UnixProxy::new("/tmp/next-link.sock"));
        let handler = ReloadableHandler::new(first);

        handler.reconfigure(br#"{"url": "http://two.example"}"#).unwrap();
        let next = handler.current().next_link().cloned().unwrap();
        assert_eq!(next.socket_path(), std::path::Path::new("/tmp/next-link.sock"));
    }

    #[test]
    fn test_reconfigure_keeps_injected_span() {
        tracing::subscriber::with_default(tracing_subscriber::registry(), || {
            let span = tracing::info_span!("plugin", socket = "/tmp/a.sock");
            let first = ForwardingHandler::from_raw_config(br#"{"url": "http://one.example"}"#)
                .unwrap()
                .with_span(span.clone());
            let handler = ReloadableHandler::new(first);

            handler.reconfigure(br#"{"url": "http://two.example"}"#).unwrap();
            let current = handler.current();
            assert!(span.id().is_some());
            assert_eq!(current.span().id(), span.id());
            assert_eq!(current.config().url().as_str(), "http://two.example/");
        });
    }
}
