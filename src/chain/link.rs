//! Chain link state machine.
//!
//! ```text
//! Launching ──(socket accepts)──▶ Ready ──(exit / terminate)──▶ Terminated
//!     └──────────────(exit / terminate)──────────────────────────▲
//! ```
//!
//! `Terminated` is final.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use tokio::sync::watch;
use tokio::time::{self, Instant};

use crate::chain::supervisor::{ProcessHandle, ProcessState};
use crate::chain::LaunchError;
use crate::http::UpstreamError;
use crate::net::UnixProxy;

/// Poll period while waiting for a plugin's socket.
const READY_POLL: Duration = Duration::from_millis(20);

/// Lifecycle state of a chain link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Launching,
    Ready,
    Terminated,
}

/// One launched plugin, addressable through its socket.
#[derive(Debug)]
pub struct ChainLink {
    name: String,
    socket_path: PathBuf,
    forward_socket_path: Option<PathBuf>,
    proxy: UnixProxy,
    process: ProcessHandle,
    state: Arc<watch::Sender<LinkState>>,
}

impl ChainLink {
    /// Wrap a spawned process. A background task moves the link to
    /// `Terminated` once the process exits.
    pub(crate) fn new(
        name: String,
        socket_path: PathBuf,
        forward_socket_path: Option<PathBuf>,
        process: ProcessHandle,
    ) -> Self {
        let (state_tx, _) = watch::channel(LinkState::Launching);
        let state = Arc::new(state_tx);

        let mut exits = process.subscribe();
        let watcher = state.clone();
        let plugin = name.clone();
        tokio::spawn(async move {
            loop {
                if let ProcessState::Exited(code) = *exits.borrow_and_update() {
                    tracing::info!(plugin = %plugin, code = ?code, "Chain link terminated");
                    break;
                }
                if exits.changed().await.is_err() {
                    break;
                }
            }
            watcher.send_replace(LinkState::Terminated);
        });

        Self {
            proxy: UnixProxy::new(socket_path.clone()),
            name,
            socket_path,
            forward_socket_path,
            process,
            state,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Next link's socket; `None` for the terminal link.
    pub fn forward_socket_path(&self) -> Option<&Path> {
        self.forward_socket_path.as_deref()
    }

    /// HTTP handle bound to this link's socket.
    pub fn proxy(&self) -> &UnixProxy {
        &self.proxy
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.pid()
    }

    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    /// Send a request into this link.
    pub async fn send(&self, request: Request<Body>) -> Result<Response<Body>, UpstreamError> {
        self.proxy.send(request).await
    }

    /// Wait until the plugin accepts connections on its socket.
    pub async fn ready(&self, timeout: Duration) -> Result<(), LaunchError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.state() {
                LinkState::Ready => return Ok(()),
                LinkState::Terminated => {
                    return Err(LaunchError::Exited {
                        name: self.name.clone(),
                    })
                }
                LinkState::Launching => {}
            }

            if self.proxy.connect().await.is_ok() {
                let promoted = self.state.send_if_modified(|state| {
                    if *state == LinkState::Launching {
                        *state = LinkState::Ready;
                        true
                    } else {
                        false
                    }
                });
                if promoted {
                    tracing::info!(plugin = %self.name, socket = %self.socket_path.display(), "Chain link ready");
                }
                continue;
            }

            if Instant::now() >= deadline {
                return Err(LaunchError::NotReady {
                    name: self.name.clone(),
                    timeout,
                });
            }
            time::sleep(READY_POLL).await;
        }
    }

    /// Wait until the link is terminated.
    pub async fn wait(&self) -> LinkState {
        let mut state = self.state.subscribe();
        loop {
            if *state.borrow_and_update() == LinkState::Terminated {
                return LinkState::Terminated;
            }
            if state.changed().await.is_err() {
                return *state.borrow();
            }
        }
    }

    /// Stop the plugin process and release its socket file.
    pub fn terminate(&mut self) {
        if self.state() == LinkState::Terminated {
            return;
        }
        self.process.terminate();
        self.state.send_replace(LinkState::Terminated);
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(plugin = %self.name, error = %e, "Failed to remove socket file");
            }
        }
        tracing::info!(plugin = %self.name, "Chain link shut down");
    }
}
