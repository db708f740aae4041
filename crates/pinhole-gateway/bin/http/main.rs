mod cli;

use crate::cli::{LogFormat, CLI};
use clap::Parser;
use pinhole_gateway::{App, AppState, Identity};
use pinhole_generator::{Generator, UuidGenerator};
use pinhole_shortener::{TaskPool, UrlService};
use pinhole_storage::StorageService;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CLI::try_parse()?;
    init_tracing(&config)?;

    let settings = config.storage_settings();
    let workers = config.delete_workers();
    info!(
        server_address = %config.server_address,
        storage_backend = %settings.kind(),
        delete_workers = workers,
        "starting pinhole"
    );

    let storage = StorageService::from_shared(pinhole_storage::open(&settings).await?);
    let pool = TaskPool::start(storage.clone(), workers);
    let generator: Arc<dyn Generator> = Arc::new(UuidGenerator::new());
    let service = Arc::new(UrlService::new(storage, pool, generator));

    let identity = Identity::new(&config.user_cookie_name, &config.user_cookie_secret)
        .map_err(|_| "invalid user cookie secret")?;
    let mut state = AppState::new(service.clone(), identity);
    if let Some(base_url) = &config.base_url {
        state = state.with_base_url(base_url.as_str());
    }

    let listener = tokio::net::TcpListener::bind(config.server_address).await?;
    info!(listen_addr = %listener.local_addr()?, "http server listening");

    axum::serve(listener, App::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("http server stopped");

    service.shutdown().await?;
    info!("shutdown complete");
    Ok(())
}

fn init_tracing(config: &CLI) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;
    let registry = tracing_subscriber::registry().with(env_filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true))
            .try_init()?,
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).try_init()?,
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received SIGTERM"),
    }
}
