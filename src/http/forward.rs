//! Request forwarding.
//!
//! # Responsibilities
//! - Decide per request: configured target, or relay to the next chain link
//! - Build the outbound request (scheme, authority, rewritten path, query,
//!   filtered headers, `Host`), keeping method and body stream verbatim
//! - Send it through a pooled HTTP/1.1 client, bounded by the optional timeout
//! - Copy status, filtered headers and the flush-adapted body back
//!
//! # Design Decisions
//! - The handler is `Clone + Send + Sync`; the only state is the immutable
//!   `TargetConfig` and the client pool, so there is no locking per request
//! - Dropping the returned future (caller went away) drops the upstream call
//! - Relayed requests are not rewritten; the next link sees them unchanged

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::header::HOST;
use axum::http::{Request, Response, Uri, Version};
use axum::response::IntoResponse;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tracing::{Instrument, Span};

use crate::config::{load_target, ConfigError, TargetConfig};
use crate::http::response::{adapt_body, UpstreamError};
use crate::net::UnixProxy;
use crate::observability::metrics::{self, RouteLabel};
use crate::rewrite::{apply_header_policy, rewrite_path, strip_proxy_path};

/// Forwards requests to one configured target.
#[derive(Clone)]
pub struct ForwardingHandler {
    config: Arc<TargetConfig>,
    client: Client<HttpsConnector<HttpConnector>, Body>,
    next: Option<UnixProxy>,
    span: Span,
}

impl ForwardingHandler {
    /// Create a handler for a validated target.
    ///
    /// The client speaks plain HTTP and HTTPS (webpki roots, ring provider),
    /// so one handler type serves both target schemes.
    pub fn new(config: TargetConfig) -> Result<Self, ConfigError> {
        let connector = HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())
            .map_err(|e| ConfigError::Tls(e.to_string()))?
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);
        let span = tracing::info_span!("forward", upstream = %config.url());
        Ok(Self {
            config: Arc::new(config),
            client,
            next: None,
            span,
        })
    }

    /// Parse a raw JSON/YAML document and create a handler from it.
    pub fn from_raw_config(raw: &[u8]) -> Result<Self, ConfigError> {
        let config = load_target(raw)?;
        tracing::info!(
            upstream = %config.url(),
            proxy_path = %config.proxy_path(),
            preserve_internal_headers = config.preserve_internal_headers(),
            flush = ?config.flush_policy(),
            "Forwarding handler configured"
        );
        Self::new(config)
    }

    /// Relay residual traffic to the chain link listening on `next`.
    pub fn with_next_link(mut self, next: UnixProxy) -> Self {
        self.next = Some(next);
        self
    }

    /// Record this handler's events inside `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    pub fn next_link(&self) -> Option<&UnixProxy> {
        self.next.as_ref()
    }

    /// Span this handler records its events in.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Where a request with this path is dispatched.
    pub fn route_for(&self, path: &str) -> RouteLabel {
        let unmatched = strip_proxy_path(path, self.config.proxy_path()).is_none();
        if unmatched && self.config.pass_unmatched() && self.next.is_some() {
            RouteLabel::NextLink
        } else {
            RouteLabel::Target
        }
    }

    /// Turn an inbound request into the request sent to the target.
    pub fn rewrite(&self, request: Request<Body>) -> Result<Request<Body>, UpstreamError> {
        let config = &self.config;
        let (mut parts, body) = request.into_parts();

        let path = rewrite_path(parts.uri.path(), config.proxy_path(), config.base_path());
        let path_and_query = match parts.uri.query() {
            Some(query) => format!("{}?{}", path, query),
            None => path,
        };

        parts.uri = Uri::builder()
            .scheme(config.scheme().clone())
            .authority(config.authority().clone())
            .path_and_query(path_and_query)
            .build()
            .map_err(|e| UpstreamError::InvalidUri(e.to_string()))?;
        parts.version = Version::HTTP_11;

        apply_header_policy(&mut parts.headers, config.preserve_internal_headers());
        parts.headers.insert(HOST, config.host_header.clone());

        Ok(Request::from_parts(parts, body))
    }

    /// Forward one request and return the upstream response.
    pub async fn handle(&self, request: Request<Body>) -> Result<Response<Body>, UpstreamError> {
        let route = self.route_for(request.uri().path());
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        async move {
            tracing::debug!(method = %method, path = %path, route = route.as_str(), "Forwarding request");

            let pending = self.dispatch(route, request);
            let response = match self.config.timeout() {
                Some(limit) => tokio::time::timeout(limit, pending)
                    .await
                    .map_err(|_| UpstreamError::Timeout(limit))??,
                None => pending.await?,
            };

            let (mut parts, body) = response.into_parts();
            if route == RouteLabel::Target {
                apply_header_policy(&mut parts.headers, self.config.preserve_internal_headers());
            }
            Ok::<_, UpstreamError>(Response::from_parts(
                parts,
                adapt_body(body, self.config.flush_policy()),
            ))
        }
        .instrument(self.span.clone())
        .await
    }

    async fn dispatch(
        &self,
        route: RouteLabel,
        request: Request<Body>,
    ) -> Result<Response<Body>, UpstreamError> {
        if let (RouteLabel::NextLink, Some(next)) = (route, self.next.as_ref()) {
            return next.send(request).await;
        }

        let outbound = self.rewrite(request)?;
        tracing::trace!(uri = %outbound.uri(), "Outbound request");
        let response = self.client.request(outbound).await?;
        Ok(response.map(Body::new))
    }

    /// Forward one request, converting failures into a gateway response.
    pub async fn serve(&self, request: Request<Body>) -> Response<Body> {
        let start = Instant::now();
        let method = request.method().to_string();
        let route = self.route_for(request.uri().path());

        let response = match self.handle(request).await {
            Ok(response) => response,
            Err(e) => {
                self.span.in_scope(|| {
                    tracing::warn!(method = %method, error = %e, "Upstream error");
                });
                e.into_response()
            }
        };

        metrics::record_request(&method, response.status().as_u16(), route, start);
        response
    }
}

impl std::fmt::Debug for ForwardingHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardingHandler")
            .field("target", &self.config.url().as_str())
            .field("proxy_path", &self.config.proxy_path())
            .field("next", &self.next)
            .finish()
    }
}
