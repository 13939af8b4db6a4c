//! websrv: HTTP + WebSocket demo server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request          ┌──────────────────────────────────────────────┐
//!     ────────────────────────┼─▶ net (TCP / TLS) ─▶ http::server dispatch   │
//!                             │                        │                     │
//!                             │        ┌───────────────┼───────────────┐     │
//!                             │        ▼               ▼               ▼     │
//!                             │   websocket       static files    webservice │
//!                             │   (negotiate,     (root_dir,      (/<name>/  │
//!                             │    session loop)   index.html)     <path>)   │
//!                             │                                              │
//!                             │   config · observability · lifecycle         │
//!                             └──────────────────────────────────────────────┘
//! ```
//!
//! Registers the `webservice` and `web` demo webservices and an echo
//! handler for every configured WebSocket protocol, then serves until
//! Ctrl+C or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use websrv::config::{load_config, ServerConfig};
use websrv::demo::{demo_webservice, DemoCounters, EchoHandler};
use websrv::http::HttpServer;
use websrv::lifecycle::trigger_on_signal;
use websrv::observability::{init_logging, metrics};

#[derive(Parser)]
#[command(name = "websrv")]
#[command(about = "HTTP and WebSocket demo server", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listening port
    #[arg(short, long)]
    port: Option<u16>,

    /// Serve static files from this directory
    #[arg(short, long)]
    root_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(port) = cli.port {
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{host}:{port}");
    }
    if cli.root_dir.is_some() {
        config.http.root_dir = cli.root_dir;
    }

    init_logging(&config.observability);
    tracing::info!("websrv v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        root_dir = ?config.http.root_dir,
        protocols = ?config.websocket.protocols,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let counters = DemoCounters::new();
    let protocols = config.websocket.protocols.clone();

    let mut server = HttpServer::new(config);
    server.add_webservice(demo_webservice("webservice", "", counters.clone()));
    server.add_webservice(demo_webservice("web", "some_", counters.clone()));

    let echo = Arc::new(EchoHandler::new(counters));
    for protocol in protocols {
        server.add_websocket(protocol, echo.clone());
    }

    trigger_on_signal(server.shutdown());
    server.serve().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
