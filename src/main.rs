//! SQL Assistant server binary.

use anyhow::Context;
use sql_assistant::cli::Cli;
use sql_assistant::config::Config;
use sql_assistant::logging;
use sql_assistant::server::{build_router, AppState};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Could not load .env: {e}");
        }
    }

    // Precedence: CLI flags, then environment, then file, then defaults.
    let config_path = cli.config_path();
    let mut config = Config::load_from_file(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    config.apply_env();
    cli.apply_to(&mut config);

    logging::init(config.logging.file.as_deref());
    info!("Loaded config from: {}", config_path.display());

    let state = if cli.mock {
        warn!("Running with mock collaborators; no database or API calls are made");
        AppState::mock()
    } else {
        let provider = Cli::provider(&config)?;
        info!(
            "Using {} provider, database {}",
            provider,
            config.database.display_string()
        );
        AppState::from_config(&config, provider).await?
    };

    let address = config.server.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!("Listening on http://{}", address);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
