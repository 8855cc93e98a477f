//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Request, Response};
use axum::Router;
use tokio::net::TcpListener;

use proxy_plugin::http::{ForwardingHandler, PluginServer, ReloadableHandler};
use proxy_plugin::lifecycle::Shutdown;

/// One request as seen by a backend.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    /// Path and query, exactly as received.
    pub uri: String,
    pub headers: HeaderMap,
}

#[derive(Clone)]
struct BackendState {
    name: &'static str,
    delay: Duration,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

/// A backend that records every request and answers `200 <name>`.
pub struct Backend {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl Backend {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last(&self) -> Recorded {
        self.requests().pop().expect("backend saw no request")
    }
}

/// Start a recording backend on an ephemeral loopback port.
pub async fn start_recording_backend(name: &'static str) -> Backend {
    start_backend(name, Duration::ZERO).await
}

/// Start a recording backend that waits `delay` before answering.
pub async fn start_slow_backend(name: &'static str, delay: Duration) -> Backend {
    start_backend(name, delay).await
}

async fn start_backend(name: &'static str, delay: Duration) -> Backend {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = BackendState {
        name,
        delay,
        requests: requests.clone(),
    };

    let app = Router::new().fallback(record).with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Backend { addr, requests }
}

async fn record(State(state): State<BackendState>, request: Request<Body>) -> Response<Body> {
    let uri = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_default();
    state.requests.lock().unwrap().push(Recorded {
        method: request.method().clone(),
        uri,
        headers: request.headers().clone(),
    });

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    Response::builder()
        .header("x-backend", state.name)
        .header("x-chain-internal-secret", "from-backend")
        .body(Body::from(state.name))
        .unwrap()
}

/// A plugin served over TCP so tests can reach it with `reqwest`.
pub struct RunningPlugin {
    pub addr: SocketAddr,
    pub reloadable: Arc<ReloadableHandler>,
    shutdown: Shutdown,
}

impl RunningPlugin {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn stop(&self) {
        self.shutdown.trigger();
    }
}

/// Build a plugin from a raw configuration document and serve it on loopback.
pub async fn start_plugin(raw_config: &str) -> RunningPlugin {
    let handler = ForwardingHandler::from_raw_config(raw_config.as_bytes()).unwrap();
    let server = PluginServer::new(handler);
    let reloadable = server.reloadable().unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, receiver).await;
    });

    RunningPlugin {
        addr,
        reloadable,
        shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
