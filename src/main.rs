//! Beacon server: real-time presence and message fan-out.
//!
//! Loads configuration, initializes logging, composes the realtime engine
//! and HTTP surface, and runs until Ctrl+C or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt};

use beacon_api::{AppState, build_app};
use beacon_auth::JwtEncoder;
use beacon_core::config::AppConfig;
use beacon_core::error::{AppError, ErrorKind};
use beacon_realtime::RealtimeEngine;

/// Fatal initialization failure (configuration, topic registration).
const EXIT_INIT: i32 = 1;
/// The listen address could not be bound.
const EXIT_BIND: i32 = 2;

/// Beacon real-time presence and fan-out server
#[derive(Debug, Parser)]
#[command(name = "beacon-server", version, about, long_about = None)]
struct Cli {
    /// Configuration overlay to load from `config/{env}.toml`
    /// (defaults to `BEACON_ENV`, then `development`)
    #[arg(short, long)]
    env: Option<String>,

    /// Subcommand to execute (defaults to `serve`)
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the server
    Serve,
    /// Print an access token for local testing
    IssueToken {
        /// User id placed in the token subject
        #[arg(long)]
        user: String,
        /// Display name (defaults to the user id)
        #[arg(long)]
        username: Option<String>,
    },
}

/// Startup failure with its exit code.
#[derive(Debug)]
enum Failure {
    Init(AppError),
    Bind(AppError),
}

impl Failure {
    fn exit_code(&self) -> i32 {
        match self {
            Self::Init(_) => EXIT_INIT,
            Self::Bind(_) => EXIT_BIND,
        }
    }

    fn error(&self) -> &AppError {
        match self {
            Self::Init(e) | Self::Bind(e) => e,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let env = cli
        .env
        .or_else(|| std::env::var("BEACON_ENV").ok())
        .unwrap_or_else(|| "development".to_string());

    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(EXIT_INIT);
        }
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::IssueToken { user, username } => {
            let username = username.unwrap_or_else(|| user.clone());
            match JwtEncoder::new(&config.auth).issue_access_token(&user, &username) {
                Ok(token) => println!("{}", token.access_token),
                Err(e) => {
                    eprintln!("Failed to issue token: {e}");
                    std::process::exit(EXIT_INIT);
                }
            }
        }
        Commands::Serve => {
            init_logging(&config);
            tracing::info!(env = %env, "Starting Beacon v{}", env!("CARGO_PKG_VERSION"));

            if let Err(failure) = run(config).await {
                tracing::error!(error = %failure.error(), "Server failed");
                std::process::exit(failure.exit_code());
            }
        }
    }
}

/// Initialize tracing; `RUST_LOG` wins over the configured level.
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Composes the engine and HTTP server and serves until shutdown.
async fn run(config: AppConfig) -> Result<(), Failure> {
    let engine = RealtimeEngine::new(config.realtime.clone())
        .map_err(|e| Failure::Init(e.into()))?;
    let engine = Arc::new(engine);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        Failure::Bind(AppError::with_source(
            ErrorKind::Internal,
            format!("Failed to bind {addr}"),
            e,
        ))
    })?;

    engine.start();

    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let app = build_app(AppState::new(config, engine.clone()));

    let shutdown_engine = engine.clone();
    beacon_api::serve(listener, app, async move {
        shutdown_signal().await;
        if tokio::time::timeout(grace, shutdown_engine.shutdown())
            .await
            .is_err()
        {
            tracing::warn!(grace_seconds = grace.as_secs(), "Engine shutdown timed out");
        }
    })
    .await
    .map_err(Failure::Init)?;

    tracing::info!("Beacon server shut down gracefully");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
