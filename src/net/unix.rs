//! HTTP over Unix domain sockets.
//!
//! # Responsibilities
//! - Bind a plugin's listening socket (removing a stale socket file first)
//! - Provide `UnixProxy`, an HTTP/1.1 client handle bound to one socket path
//!
//! A fresh connection is opened per request. Chain links live on the same
//! host, so connect cost is a filesystem lookup plus a handshake.

use std::io;
use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::http::header::HOST;
use axum::http::{HeaderValue, Request, Response, Uri, Version};
use hyper_util::rt::TokioIo;
use tokio::net::{UnixListener, UnixStream};

use crate::http::UpstreamError;

/// Bind `path`, replacing a leftover socket file from an earlier run.
pub fn bind_unix(path: &Path) -> io::Result<UnixListener> {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed stale socket file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    let listener = UnixListener::bind(path)?;
    tracing::info!(path = %path.display(), "Unix listener bound");
    Ok(listener)
}

/// HTTP handle for the plugin listening on a Unix socket.
#[derive(Debug, Clone)]
pub struct UnixProxy {
    path: PathBuf,
}

impl UnixProxy {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn socket_path(&self) -> &Path {
        &self.path
    }

    /// Open a raw connection to the socket.
    pub async fn connect(&self) -> io::Result<UnixStream> {
        UnixStream::connect(&self.path).await
    }

    /// Send `request` over the socket and return the streamed response.
    ///
    /// Method, path, query, headers and body are passed through untouched;
    /// only the URI is reduced to origin-form and a `Host` header is supplied
    /// if the request has none.
    pub async fn send(&self, request: Request<Body>) -> Result<Response<Body>, UpstreamError> {
        let stream = self.connect().await.map_err(|source| UpstreamError::Socket {
            path: self.path.clone(),
            source,
        })?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake::<_, Body>(TokioIo::new(stream))
            .await
            .map_err(UpstreamError::Link)?;

        let path = self.path.clone();
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(path = %path.display(), error = %e, "Chain link connection ended with error");
            }
        });

        let (mut parts, body) = request.into_parts();
        let origin_form = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        parts.uri = Uri::try_from(origin_form).map_err(|e| UpstreamError::InvalidUri(e.to_string()))?;
        parts.version = Version::HTTP_11;
        if !parts.headers.contains_key(HOST) {
            parts.headers.insert(HOST, HeaderValue::from_static("localhost"));
        }

        let response = sender
            .send_request(Request::from_parts(parts, body))
            .await
            .map_err(UpstreamError::Link)?;

        Ok(response.map(Body::new))
    }
}
