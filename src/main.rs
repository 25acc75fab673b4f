use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cloudsave::{
    admission::BucketPruner,
    config::AppConfig,
    storage::{InMemoryProfileStore, JsonFileProfileStore, ProfileStore},
    web::{AppState, build_router},
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cloudsave")]
#[command(about = "Cloud save profile synchronization server")]
struct Cli {
    /// Bind address, overrides APP_HOST
    #[arg(long)]
    host: Option<String>,
    /// Bind port, overrides APP_PORT
    #[arg(long)]
    port: Option<u16>,
    /// Directory for the JSON profile store, overrides CLOUDSAVE_DATA_DIR
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = AppConfig::from_env().context("failed to load application configuration")?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.data_dir.is_some() {
        config.data_dir = cli.data_dir;
    }

    let store: Arc<dyn ProfileStore> = match &config.data_dir {
        Some(dir) => {
            info!(data_dir = %dir.display(), "profile store: json files");
            Arc::new(
                JsonFileProfileStore::open(dir)
                    .with_context(|| format!("failed to open data dir {}", dir.display()))?,
            )
        }
        None => {
            info!("profile store: in-memory");
            Arc::new(InMemoryProfileStore::new())
        }
    };

    let state = AppState::from_config(&config, store)?;
    let partitions = Arc::clone(state.sync.partitions());
    let pruner = BucketPruner::spawn(
        Arc::clone(&state.admission),
        Arc::clone(&state.policy),
        config.bucket_prune_interval,
    );
    let app = build_router(state);

    let addr = config.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(
        address = %addr,
        trusted_proxy_hops = config.trusted_proxy_hops,
        "cloudsave started"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    pruner.stop().await;
    partitions.shutdown().await;
    info!("partitions drained");

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cloudsave=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install Ctrl+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install SIGTERM handler");
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
}
