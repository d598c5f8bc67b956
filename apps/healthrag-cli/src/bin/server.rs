//! HTTP chat endpoint.
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use healthrag_cli::api::{router, AppState};
use healthrag_cli::{bootstrap, telemetry};

#[derive(Parser)]
#[command(name = "healthrag-server")]
#[command(about = "Serve POST /chat over HTTP")]
struct Cli {
    /// Bind address (defaults to server.host)
    #[arg(long)]
    host: Option<String>,

    /// Port (defaults to server.port)
    #[arg(short, long)]
    port: Option<u16>,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init("info");
    let cli = Cli::parse();
    let settings = bootstrap::load_settings()?;
    let pipeline = bootstrap::build_pipeline(&settings).await?;
    let app = router(Arc::new(AppState::new(pipeline)));

    let host = cli.host.unwrap_or_else(|| settings.server.host.clone());
    let port = cli.port.unwrap_or(settings.server.port);
    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}
