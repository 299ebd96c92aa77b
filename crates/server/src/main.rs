mod config;
mod http;
mod import;
mod state;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::{path::PathBuf, time::Duration};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::http::router::build_router;
use crate::state::AppState;
use storage::CommentRepo;

#[derive(Parser)]
#[command(name = "server", version, about = "Threaded comment service for the blog")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Overwrite the stored comment document with a local JSON file
    Import {
        #[arg(long, default_value = "comments.json")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let settings = Settings::new().context("Failed to load configuration")?;

    let store = adapter::open_store(settings.store.clone().into()).await?;
    let repo = CommentRepo::new(store, settings.comments.key.clone());

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(settings, repo).await,
        Command::Import { file } => {
            import::import_file(&repo, &file).await?;
            Ok(())
        }
    }
}

async fn serve(settings: Settings, repo: CommentRepo) -> anyhow::Result<()> {
    let (tx_cmd, rx_cmd) = mpsc::channel(100);
    let cancel_token = CancellationToken::new();

    let worker = {
        let repo = repo.clone();
        let cancel_token = cancel_token.clone();
        tokio::spawn(async move {
            if let Err(e) = adapter::start_with_cancel_token(repo, rx_cmd, cancel_token).await {
                tracing::error!("Comment writer crashed: {:?}", e);
            }
        })
    };

    let state = AppState {
        repo,
        sender: tx_cmd,
        submit_timeout: Duration::from_secs(settings.server.submit_timeout_secs),
    };

    let app = build_router(state, &settings.server.cors_origins);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address: {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel_token.cancel();
    let _ = worker.await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
