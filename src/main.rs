use share_registration::api::{router, AppState};
use share_registration::config::Config;
use share_registration::security::AdminAuthConfig;
use share_registration::store::Store;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env file if present (before the config is read)
    let dotenv = dotenvy::dotenv();
    let config = Config::from_env()?;

    let log_dir = &config.log_dir;
    std::fs::create_dir_all(log_dir).unwrap_or_else(|e| {
        eprintln!("Warning: Could not create log directory {}: {}", log_dir.display(), e);
    });

    // Daily rotated JSON log next to the console output
    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "share-registration.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,share_registration=debug")),
        )
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_writer(non_blocking),
        )
        .init();

    debug!("Logging initialized - log directory: {}", log_dir.display());
    if let Err(e) = dotenv {
        warn!("No .env file found or error loading it: {}", e);
    }

    let socket_addr = config.socket_addr()?;

    info!("Starting SHARE registration service on {}", socket_addr);
    info!("Storage backend: {}", config.storage_backend.as_str());
    info!("DOI resolver: {}", config.doi_resolver_url);
    info!("Outbound HTTP timeout: {:?}", config.http_timeout);
    if config.admin_token.is_some() {
        info!("Admin endpoints enabled for networks: {:?}", config.allowed_admin_ips);
    } else {
        warn!("ADMIN_TOKEN not set, admin endpoints are disabled");
    }

    let store = Arc::new(Store::from_config(&config).await?);

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .user_agent(concat!("share-registration/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let state = AppState::new(&config, store, http);
    let app = router(state, AdminAuthConfig::from_config(&config));

    let listener = tokio::net::TcpListener::bind(&socket_addr).await?;
    info!("Server listening on {}", socket_addr);

    // Peer addresses feed the admin IP allow-list
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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

    info!("Received shutdown signal");
}
