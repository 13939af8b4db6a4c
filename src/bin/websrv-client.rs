use clap::Parser;

use websrv::client::{self, fixture_calls, ClientError, Mount, RequestOptions, WebsocketClient};
use websrv::config::schema::ObservabilityConfig;
use websrv::http::websocket::Frame;
use websrv::observability::init_logging;

#[derive(Parser)]
#[command(name = "websrv-client")]
#[command(about = "Exercise a websrv instance over HTTP and WebSocket", long_about = None)]
struct Cli {
    /// Base URL of the HTTP server
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    /// WebSocket URL
    #[arg(short, long, default_value = "ws://localhost:3000/")]
    ws_url: String,

    /// Which demo webservice to call: webservice or web
    #[arg(short, long, default_value_t = Mount::WebService)]
    mount: Mount,

    /// Offered WebSocket sub-protocols, in preference order
    #[arg(short, long = "protocol", default_values_t = ["websocket-protocol".to_string(), "proto-two".to_string()])]
    protocols: Vec<String>,

    /// Only perform the HTTP calls
    #[arg(long)]
    skip_websocket: bool,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let cli = Cli::parse();
    init_logging(&ObservabilityConfig {
        log_level: cli.log_level.clone(),
        ..ObservabilityConfig::default()
    });

    let options = RequestOptions::default();
    for call in fixture_calls(cli.mount) {
        let response = client::http::send(&call, &cli.url, &options).await?;
        tracing::info!(
            method = %call.method(),
            path = %call.path(),
            status = %response.status(),
            body = %response.text(),
            "Response"
        );
    }

    if cli.skip_websocket {
        return Ok(());
    }

    let ws = WebsocketClient::connect(&cli.ws_url, &cli.protocols).await?;
    tracing::info!(protocol = ?ws.protocol(), "WebSocket open");

    let summary = ws
        .run_session("hello from client", |frame| {
            match frame {
                Frame::Text(text) => tracing::info!(text = %text, "WebSocket message"),
                Frame::Binary(data) => tracing::info!(bytes = data.len(), "WebSocket binary message"),
            }
            true
        })
        .await?;

    tracing::info!(
        protocol = ?summary.protocol,
        frames = summary.frames_received,
        reason = ?summary.close_reason,
        "WebSocket closed"
    );
    Ok(())
}
