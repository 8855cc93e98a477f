//! Plugin chain launcher.
//!
//! # Responsibilities
//! - Allocate a unique socket path per plugin
//! - Build and deliver the bootstrap descriptor (own socket, next link's
//!   socket, raw configuration)
//! - Launch whole chains back to front so every link knows its successor
//!
//! # Design Decisions
//! - Launching is sequential and happens once, at startup
//! - Any failure aborts the chain and stops the links started so far
//! - No partially built `ChainLink` is ever returned
//! - `launch_chain` waits for every link to accept connections unless told
//!   not to, so a returned chain is `Ready` end to end

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{Instrument, Span};

use crate::chain::bootstrap::BootstrapDescriptor;
use crate::chain::link::ChainLink;
use crate::chain::socket::{SocketAllocator, TempSocketAllocator};
use crate::chain::supervisor::{LogSink, ProcessSupervisor, TokioSupervisor};
use crate::chain::LaunchError;
use crate::observability::metrics;

/// How long `launch_chain` waits for each link's socket by default.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// One plugin to launch: executable name (or path) and its raw configuration.
#[derive(Debug, Clone)]
pub struct PluginSpec {
    pub executable: String,
    pub configuration: Vec<u8>,
}

impl PluginSpec {
    pub fn new(executable: impl Into<String>, configuration: impl Into<Vec<u8>>) -> Self {
        Self {
            executable: executable.into(),
            configuration: configuration.into(),
        }
    }
}

/// Launches plugin processes and links them into chains.
pub struct PluginChainLauncher {
    allocator: Arc<dyn SocketAllocator>,
    supervisor: Arc<dyn ProcessSupervisor>,
    sink: Arc<dyn LogSink>,
    ready_timeout: Option<Duration>,
    span: Span,
}

impl PluginChainLauncher {
    /// Launcher writing plugin output into `sink`, with sockets in the temp dir.
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            allocator: Arc::new(TempSocketAllocator::new()),
            supervisor: Arc::new(TokioSupervisor),
            sink,
            ready_timeout: Some(DEFAULT_READY_TIMEOUT),
            span: tracing::info_span!("chain"),
        }
    }

    pub fn with_allocator(mut self, allocator: Arc<dyn SocketAllocator>) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn with_supervisor(mut self, supervisor: Arc<dyn ProcessSupervisor>) -> Self {
        self.supervisor = supervisor;
        self
    }

    /// Make `launch_chain` wait up to `timeout` for each link's socket.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = Some(timeout);
        self
    }

    /// Return chains without waiting for sockets. Links stay `Launching`
    /// until the caller runs `ChainLink::ready`.
    pub fn without_ready_wait(mut self) -> Self {
        self.ready_timeout = None;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Launch one plugin, linking it to `next` (or making it terminal).
    pub async fn launch(
        &self,
        executable: &str,
        configuration: &[u8],
        next: Option<&ChainLink>,
    ) -> Result<ChainLink, LaunchError> {
        let forward = next.map(|link| link.socket_path().to_path_buf());
        let socket_path = self.allocator.allocate(executable);

        async {
            let descriptor = BootstrapDescriptor {
                socket_path: socket_path.to_string_lossy().into_owned(),
                forward_socket_path: forward
                    .as_deref()
                    .map(|p: &Path| p.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                configuration: configuration.to_vec(),
            };
            let line = descriptor.to_line()?;

            let result = self
                .supervisor
                .spawn(executable, line, self.sink.clone())
                .await;
            metrics::record_launch(executable, result.is_ok());

            let process = match result {
                Ok(process) => process,
                Err(e) => {
                    tracing::error!(plugin = %executable, error = %e, "Plugin launch failed");
                    return Err(e);
                }
            };

            tracing::info!(
                plugin = %executable,
                pid = ?process.pid(),
                socket = %socket_path.display(),
                forward = ?forward,
                "Plugin launched"
            );
            Ok::<_, LaunchError>(ChainLink::new(
                executable.to_string(),
                socket_path.clone(),
                forward.clone(),
                process,
            ))
        }
        .instrument(self.span.clone())
        .await
    }

    /// Launch `specs` as one chain; the first spec becomes the entry link.
    pub async fn launch_chain(&self, specs: &[PluginSpec]) -> Result<Chain, LaunchError> {
        let mut links: Vec<ChainLink> = Vec::with_capacity(specs.len());

        for spec in specs.iter().rev() {
            let launched = self
                .launch(&spec.executable, &spec.configuration, links.last())
                .await;

            let link = match launched {
                Ok(link) => link,
                Err(e) => {
                    stop_all(&mut links);
                    return Err(e);
                }
            };
            links.push(link);

            if let Some(timeout) = self.ready_timeout {
                let newest = links.len() - 1;
                if let Err(e) = links[newest].ready(timeout).await {
                    stop_all(&mut links);
                    return Err(e);
                }
            }
        }

        links.reverse();
        self.span.in_scope(|| tracing::info!(links = links.len(), "Plugin chain started"));
        Ok(Chain { links })
    }
}

fn stop_all(links: &mut [ChainLink]) {
    for link in links.iter_mut() {
        link.terminate();
    }
}

/// A launched chain, entry link first.
#[derive(Debug)]
pub struct Chain {
    links: Vec<ChainLink>,
}

impl Chain {
    /// The link that receives traffic from the host.
    pub fn entry(&self) -> Option<&ChainLink> {
        self.links.first()
    }

    pub fn links(&self) -> &[ChainLink] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Stop every link.
    pub fn shutdown(&mut self) {
        stop_all(&mut self.links);
    }
}

impl Drop for Chain {
    fn drop(&mut self) {
        self.shutdown();
    }
}
