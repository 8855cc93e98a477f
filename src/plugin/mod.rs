//! Plugin side of a chain link.
//!
//! # Data Flow
//! ```text
//! stdin ──(one JSON line)──▶ BootstrapDescriptor
//!     → configuration bytes → ForwardingHandler (+ next link if any)
//!     → bind socket_path → PluginServer::run until shutdown
//! ```
//!
//! A configuration error is fatal here: the plugin refuses to start and the
//! host sees the process exit.

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncRead, BufReader};
use tokio::sync::broadcast;

use crate::chain::{BootstrapDescriptor, BootstrapError};
use crate::config::ConfigError;
use crate::http::{ForwardingHandler, PluginServer};
use crate::net::{bind_unix, UnixProxy};

/// Error type for running a plugin.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error("invalid plugin configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("plugin socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read the bootstrap descriptor from an unbuffered reader such as stdin.
pub async fn read_bootstrap<R>(reader: R) -> Result<BootstrapDescriptor, BootstrapError>
where
    R: AsyncRead + Unpin,
{
    read_bootstrap_buffered(&mut BufReader::new(reader)).await
}

/// Read the bootstrap descriptor from a buffered reader.
pub async fn read_bootstrap_buffered<R>(reader: &mut R) -> Result<BootstrapDescriptor, BootstrapError>
where
    R: AsyncBufRead + Unpin,
{
    let descriptor = BootstrapDescriptor::read_from(reader).await?;
    tracing::debug!(
        socket = %descriptor.socket_path,
        forward = %descriptor.forward_socket_path,
        configuration_len = descriptor.configuration.len(),
        "Bootstrap descriptor received"
    );
    Ok(descriptor)
}

/// Build the forwarding handler a descriptor asks for.
pub fn build_handler(descriptor: &BootstrapDescriptor) -> Result<ForwardingHandler, ConfigError> {
    let span = tracing::info_span!("plugin", socket = %descriptor.socket_path);
    let handler = span
        .in_scope(|| ForwardingHandler::from_raw_config(&descriptor.configuration))?
        .with_span(span);

    Ok(match descriptor.forward_socket() {
        Some(next) => handler.with_next_link(UnixProxy::new(next)),
        None => handler,
    })
}

/// Serve a descriptor's handler on its socket until `shutdown` fires.
pub async fn serve(
    descriptor: BootstrapDescriptor,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), PluginError> {
    let handler = build_handler(&descriptor)?;
    let socket_path = std::path::PathBuf::from(&descriptor.socket_path);
    let listener = bind_unix(&socket_path)?;

    let result = PluginServer::new(handler).run(listener, shutdown).await;

    if let Err(e) = std::fs::remove_file(&socket_path) {
        tracing::debug!(path = %socket_path.display(), error = %e, "Socket file not removed");
    }
    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    fn descriptor(socket: &std::path::Path, forward: &str, config: &str) -> BootstrapDescriptor {
        BootstrapDescriptor {
            socket_path: socket.to_string_lossy().into_owned(),
            forward_socket_path: forward.to_string(),
            configuration: config.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_read_bootstrap_from_raw_reader() {
        let line = descriptor(std::path::Path::new("/tmp/x.sock"), "", "url: http://a")
            .to_line()
            .unwrap();
        let read = read_bootstrap(&line[..]).await.unwrap();
        assert_eq!(read.socket_path, "/tmp/x.sock");
        assert_eq!(read.configuration, b"url: http://a");
    }

    #[test]
    fn test_build_handler_links_forward_socket() {
        let d = descriptor(std::path::Path::new("/tmp/a.sock"), "/tmp/b.sock", "url: http://a");
        let handler = build_handler(&d).unwrap();
        assert_eq!(
            handler.next_link().map(|n| n.socket_path()),
            Some(std::path::Path::new("/tmp/b.sock"))
        );
    }

    #[test]
    fn test_build_handler_rejects_bad_configuration() {
        let d = descriptor(std::path::Path::new("/tmp/a.sock"), "", "&asdINVALID_YAML:^HERE");
        assert!(matches!(build_handler(&d), Err(ConfigError::Parse(_))));
    }

    #[tokio::test]
    async fn test_serve_listens_on_socket_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("plugin.sock");
        let (tx, rx) = broadcast::channel(1);

        let task = tokio::spawn(serve(
            descriptor(&socket, "", r#"{"url": "http://127.0.0.1:9"}"#),
            rx,
        ));

        let proxy = UnixProxy::new(&socket);
        let mut response = None;
        for _ in 0..100 {
            if let Ok(r) = proxy.send(Request::new(Body::empty())).await {
                response = Some(r);
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(response.unwrap().status(), StatusCode::BAD_GATEWAY);

        tx.send(()).unwrap();
        task.await.unwrap().unwrap();
        assert!(!socket.exists());
    }
}
