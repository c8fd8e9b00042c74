//! skylance-predict - prediction writeback service
//!
//! `serve` exposes the booking and flight pipelines over HTTP; `run` scores all pending
//! rows once and exits (for cron).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use skylance_common::config::{Overrides, Settings, TomlConfig};
use skylance_common::db::connect_store;
use skylance_predict::pipeline::{bookings, flights, Pipeline, PipelineSpec};
use skylance_predict::scorer::load_artifact;
use skylance_predict::{build_router, AppState};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "skylance-predict")]
#[command(about = "Batch scoring and writeback for SkyLance bookings and flights")]
#[command(version)]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store connection string (sqlx SQLite URL)
    #[arg(long, global = true, env = "DB_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Booking model artifact
    #[arg(long, global = true, env = "SKYLANCE_BOOKING_ARTIFACT")]
    booking_artifact: Option<PathBuf>,

    /// Flight model artifact
    #[arg(long, global = true, env = "SKYLANCE_FLIGHT_ARTIFACT")]
    flight_artifact: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the prediction endpoints
    Serve {
        #[arg(long, env = "SKYLANCE_HOST")]
        host: Option<String>,

        #[arg(short, long, env = "SKYLANCE_PORT")]
        port: Option<u16>,
    },
    /// Score all pending rows once and exit
    Run {
        #[arg(long, value_enum, default_value_t = PipelineChoice::Bookings)]
        pipeline: PipelineChoice,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum PipelineChoice {
    Bookings,
    Flights,
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let toml = TomlConfig::load(cli.config.as_deref()).context("Failed to load config file")?;

    let (host, port) = match &cli.command {
        Command::Serve { host, port } => (host.clone(), *port),
        Command::Run { .. } => (None, None),
    };
    let settings = Settings::resolve(
        Overrides {
            database_url: cli.database_url,
            host,
            port,
            booking_artifact: cli.booking_artifact,
            flight_artifact: cli.flight_artifact,
        },
        &toml,
    )
    .context("Invalid configuration")?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting SkyLance predictor (skylance-predict) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let pool = connect_store(&settings.database_url)
        .await
        .context("Failed to connect to store")?;

    match cli.command {
        Command::Serve { .. } => {
            let bookings =
                prepare_pipeline(&pool, bookings::spec(), &settings.booking_artifact).await?;
            let flights =
                prepare_pipeline(&pool, flights::spec(), &settings.flight_artifact).await?;
            serve(AppState::new(pool, bookings, flights), &settings).await
        }
        Command::Run { pipeline } => {
            // Only the selected pipelines need a model and a matching table
            let mut selected = Vec::new();
            for (spec, artifact) in selected_pipelines(pipeline, &settings) {
                selected.push(prepare_pipeline(&pool, spec, artifact).await?);
            }
            run_once(&pool, &selected).await
        }
    }
}

/// Pipeline definitions and artifact paths for a run-once choice
fn selected_pipelines(choice: PipelineChoice, settings: &Settings) -> Vec<(PipelineSpec, &Path)> {
    let mut selected = Vec::new();
    if matches!(choice, PipelineChoice::Bookings | PipelineChoice::All) {
        selected.push((bookings::spec(), settings.booking_artifact.as_path()));
    }
    if matches!(choice, PipelineChoice::Flights | PipelineChoice::All) {
        selected.push((flights::spec(), settings.flight_artifact.as_path()));
    }
    selected
}

/// Load the scorer, pair it with the pipeline definition and check the target table
async fn prepare_pipeline(
    pool: &SqlitePool,
    spec: PipelineSpec,
    artifact: &Path,
) -> Result<Arc<Pipeline>> {
    let name = spec.name;
    let scorer = load_artifact(artifact)
        .with_context(|| format!("Failed to load {} scorer", name))?;
    let pipeline = Pipeline::new(spec, Arc::new(scorer))
        .with_context(|| format!("Scorer does not fit the {} pipeline", name))?;
    pipeline
        .verify_store(pool)
        .await
        .with_context(|| format!("Store is not ready for the {} pipeline", name))?;

    info!("✓ {} pipeline ready", name);
    Ok(Arc::new(pipeline))
}

async fn serve(state: AppState, settings: &Settings) -> Result<()> {
    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("skylance-predict listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn run_once(pool: &SqlitePool, pipelines: &[Arc<Pipeline>]) -> Result<()> {
    for pipeline in pipelines {
        let updated = match pipeline.run_all(pool).await {
            Ok(n) => n,
            Err(e) => {
                error!(pipeline = pipeline.name(), error = ?e, "Run failed");
                return Err(e).with_context(|| format!("{} run failed", pipeline.name()));
            }
        };

        if updated == 0 {
            println!("No new rows.");
        } else {
            println!("Updated {} rows.", updated);
        }
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
