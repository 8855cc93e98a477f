//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router (a single fallback route, every path and method)
//! - Wire up tower-http tracing
//! - Serve on any axum listener (Unix socket for plugins, TCP for the host)
//! - Stop on the shutdown broadcast, letting in-flight requests finish

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    serve::Listener,
    Router,
};
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::http::forward::ForwardingHandler;
use crate::http::reload::ReloadableHandler;
use crate::net::UnixProxy;

/// What the server does with each request.
#[derive(Clone)]
enum Dispatch {
    /// Rewrite and forward (a proxy plugin).
    Forward(Arc<ReloadableHandler>),
    /// Hand the request unchanged to a chain link (the chain host).
    Relay(UnixProxy),
}

/// HTTP server in front of a forwarding handler or a chain entry link.
pub struct PluginServer {
    router: Router,
    reloadable: Option<Arc<ReloadableHandler>>,
}

impl PluginServer {
    /// Serve a forwarding handler.
    pub fn new(handler: ForwardingHandler) -> Self {
        let reloadable = Arc::new(ReloadableHandler::new(handler));
        Self {
            router: Self::build_router(Dispatch::Forward(reloadable.clone())),
            reloadable: Some(reloadable),
        }
    }

    /// Relay every request to the plugin listening behind `entry`.
    pub fn relay(entry: UnixProxy) -> Self {
        Self {
            router: Self::build_router(Dispatch::Relay(entry)),
            reloadable: None,
        }
    }

    /// Reconfiguration handle, present when serving a forwarding handler.
    pub fn reloadable(&self) -> Option<Arc<ReloadableHandler>> {
        self.reloadable.clone()
    }

    /// The router without a listener, for embedding or in-process calls.
    pub fn into_router(self) -> Router {
        self.router
    }

    fn build_router(dispatch: Dispatch) -> Router {
        Router::new()
            .fallback(dispatch_handler)
            .with_state(dispatch)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` fires.
    pub async fn run<L>(
        self,
        listener: L,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error>
    where
        L: Listener,
        L::Addr: std::fmt::Debug,
    {
        tracing::info!("HTTP server starting");

        axum::serve(listener, self.into_router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn dispatch_handler(State(dispatch): State<Dispatch>, request: Request<Body>) -> Response {
    match dispatch {
        Dispatch::Forward(reloadable) => reloadable.current().serve(request).await,
        Dispatch::Relay(entry) => match entry.send(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Chain entry link unavailable");
                e.into_response()
            }
        },
    }
}
