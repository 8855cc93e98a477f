//! Chains of real `proxy-plugin` processes.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use proxy_plugin::chain::{
    LaunchError, LinkState, PluginChainLauncher, PluginSpec, TempSocketAllocator, TracingLogSink,
};

mod common;

const PLUGIN: &str = env!("CARGO_BIN_EXE_proxy-plugin");

fn launcher(dir: &std::path::Path) -> PluginChainLauncher {
    PluginChainLauncher::new(Arc::new(TracingLogSink))
        .with_allocator(Arc::new(TempSocketAllocator::in_dir(dir)))
        .with_ready_timeout(Duration::from_secs(10))
}

#[tokio::test]
async fn test_unmatched_request_reaches_next_link_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let local = common::start_recording_backend("first").await;
    let downstream = common::start_recording_backend("second").await;

    let first = format!(
        "url: {}/local\nproxy_path: /first\npass_unmatched: true\n",
        local.url()
    );
    let second = format!(
        r#"{{"url": "{}", "preserve_internal_headers": true}}"#,
        downstream.url()
    );

    let mut chain = launcher(dir.path())
        .launch_chain(&[PluginSpec::new(PLUGIN, first), PluginSpec::new(PLUGIN, second)])
        .await
        .unwrap();
    assert_eq!(chain.len(), 2);
    assert!(chain.links().iter().all(|l| l.state() == LinkState::Ready));

    let entry = chain.entry().unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/other/path?x=1")
        .header("x-chain-internal-user", "alice")
        .body(Body::from("hello"))
        .unwrap();
    let response = entry.send(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"second");

    let seen = downstream.last();
    assert_eq!(seen.method, "POST");
    assert_eq!(seen.uri, "/other/path?x=1");
    assert_eq!(seen.headers["x-chain-internal-user"], "alice");
    assert!(local.requests().is_empty());

    // Matching traffic stays with the first link.
    let request = Request::builder()
        .uri("/first/mine")
        .body(Body::empty())
        .unwrap();
    let response = entry.send(request).await.unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"first");
    assert_eq!(local.last().uri, "/local/mine");

    chain.shutdown();
    assert!(chain.links().iter().all(|l| l.state() == LinkState::Terminated));
}

#[tokio::test]
async fn test_invalid_configuration_plugin_exits() {
    let dir = tempfile::tempdir().unwrap();

    let err = launcher(dir.path())
        .launch_chain(&[PluginSpec::new(PLUGIN, "url: ftp://nowhere\n")])
        .await
        .unwrap_err();
    assert!(matches!(err, LaunchError::Exited { .. }), "{err}");
}

#[tokio::test]
async fn test_missing_executable() {
    let dir = tempfile::tempdir().unwrap();

    let err = launcher(dir.path())
        .launch_chain(&[PluginSpec::new("no-such-proxy-plugin", "url: http://a\n")])
        .await
        .unwrap_err();
    assert!(matches!(err, LaunchError::NotFound(_)));
}
