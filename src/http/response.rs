//! Response handling and transformation.
//!
//! # Responsibilities
//! - Map upstream failures to gateway responses (502 / 504)
//! - Apply the configured flush policy to streamed response bodies
//!
//! # Design Decisions
//! - Bodies are never fully buffered; at most `MAX_BUFFERED` bytes are held
//! - An upstream body error ends the stream after discarding held bytes

use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::BytesMut;
use futures_util::{Stream, StreamExt};
use thiserror::Error;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::config::FlushPolicy;

/// Bytes held before a buffered body is flushed regardless of policy.
pub const MAX_BUFFERED: usize = 32 * 1024;

/// Failure talking to the target origin or the next chain link.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),

    #[error("cannot connect to chain link at {path}: {source}")]
    Socket {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("chain link protocol error: {0}")]
    Link(#[source] hyper::Error),

    #[error("invalid outbound URI: {0}")]
    InvalidUri(String),
}

impl UpstreamError {
    /// Status code presented to the caller for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            UpstreamError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for UpstreamError {
    fn into_response(self) -> Response {
        let message = match self {
            UpstreamError::Timeout(_) => "Upstream request timed out",
            _ => "Upstream request failed",
        };
        (self.status(), message).into_response()
    }
}

/// Wrap an upstream body according to `policy`.
pub fn adapt_body(body: Body, policy: FlushPolicy) -> Body {
    match policy {
        FlushPolicy::Immediate => body,
        FlushPolicy::Buffered => Body::from_stream(coalesce(body, None)),
        FlushPolicy::Periodic(every) => Body::from_stream(coalesce(body, Some(every))),
    }
}

type DataStream = Pin<Box<dyn Stream<Item = Result<Bytes, axum::Error>> + Send>>;

struct Coalesce {
    inner: DataStream,
    buf: BytesMut,
    ticker: Option<Interval>,
    done: bool,
}

enum Step {
    Data(Option<Result<Bytes, axum::Error>>),
    Tick,
}

fn coalesce(
    body: Body,
    interval: Option<Duration>,
) -> impl Stream<Item = Result<Bytes, axum::Error>> + Send {
    let ticker = interval.map(|every| {
        let mut ticker = time::interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    let state = Coalesce {
        inner: Box::pin(body.into_data_stream()),
        buf: BytesMut::new(),
        ticker,
        done: false,
    };

    futures_util::stream::unfold(state, |mut st| async move {
        loop {
            if st.done {
                if st.buf.is_empty() {
                    return None;
                }
                let chunk = st.buf.split().freeze();
                return Some((Ok(chunk), st));
            }

            let step = match st.ticker.as_mut() {
                Some(ticker) => tokio::select! {
                    item = st.inner.next() => Step::Data(item),
                    _ = ticker.tick() => Step::Tick,
                },
                None => Step::Data(st.inner.next().await),
            };

            match step {
                Step::Tick => {
                    if !st.buf.is_empty() {
                        let chunk = st.buf.split().freeze();
                        return Some((Ok(chunk), st));
                    }
                }
                Step::Data(Some(Ok(bytes))) => {
                    st.buf.extend_from_slice(&bytes);
                    if st.buf.len() >= MAX_BUFFERED {
                        let chunk = st.buf.split().freeze();
                        return Some((Ok(chunk), st));
                    }
                }
                Step::Data(Some(Err(e))) => {
                    tracing::debug!(error = %e, "Upstream body ended with error");
                    st.buf.clear();
                    st.done = true;
                    return Some((Err(e), st));
                }
                Step::Data(None) => st.done = true,
            }
        }
    })
}
