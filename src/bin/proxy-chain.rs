//! `proxy-chain`: launch a chain of plugins and expose it on TCP.
//!
//! ```text
//! proxy-chain --listen 127.0.0.1:8080 \
//!     --plugin ./proxy-plugin=first.yaml \
//!     --plugin ./proxy-plugin=second.yaml
//! ```
//!
//! Requests arriving on `--listen` go unchanged to the first plugin's socket.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use proxy_plugin::chain::{PluginChainLauncher, PluginSpec, TracingLogSink};
use proxy_plugin::config::duration::parse_duration;
use proxy_plugin::http::PluginServer;
use proxy_plugin::lifecycle::Shutdown;
use proxy_plugin::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "proxy-chain")]
#[command(about = "Launch a chain of proxy plugins behind one TCP listener", long_about = None)]
struct Cli {
    /// Address the chain host listens on.
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// Plugin as `<executable>=<config-file>`; repeat in chain order.
    #[arg(short, long = "plugin", value_parser = parse_plugin_arg, required = true)]
    plugins: Vec<(String, PathBuf)>,

    /// How long each plugin gets to open its socket.
    #[arg(long, default_value = "5s", value_parser = parse_ready_timeout)]
    ready_timeout: Duration,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    metrics_address: Option<SocketAddr>,
}

fn parse_plugin_arg(raw: &str) -> Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((exe, file)) if !exe.is_empty() && !file.is_empty() => {
            Ok((exe.to_string(), PathBuf::from(file)))
        }
        _ => Err(format!("expected <executable>=<config-file>, got {raw:?}")),
    }
}

fn parse_ready_timeout(raw: &str) -> Result<Duration, String> {
    match parse_duration(raw) {
        Some(d) if !d.negative => Ok(d.magnitude),
        _ => Err(format!("invalid duration {raw:?}")),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init("proxy_plugin=info,proxy_chain=info,tower_http=info");

    if let Some(addr) = cli.metrics_address {
        metrics::init_metrics(addr)?;
    }

    let mut specs = Vec::with_capacity(cli.plugins.len());
    for (executable, file) in &cli.plugins {
        let configuration = tokio::fs::read(file).await.map_err(|e| {
            tracing::error!(file = %file.display(), error = %e, "Cannot read plugin configuration");
            e
        })?;
        specs.push(PluginSpec::new(executable.clone(), configuration));
    }

    let launcher = PluginChainLauncher::new(Arc::new(TracingLogSink))
        .with_ready_timeout(cli.ready_timeout);
    let mut chain = launcher.launch_chain(&specs).await?;

    let entry = match chain.entry() {
        Some(link) => link.proxy().clone(),
        None => return Err("no plugins given".into()),
    };

    let listener = TcpListener::bind(cli.listen).await?;
    tracing::info!(address = %listener.local_addr()?, links = chain.len(), "Listening for connections");

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    shutdown.spawn_signal_listener();

    let result = PluginServer::relay(entry).run(listener, receiver).await;

    chain.shutdown();
    tracing::info!("proxy-chain stopped");
    Ok(result?)
}
