//! Resident Directory API server

use resident_directory::{build_app, AppConfig, AppError, AppState, PgStore, Store};

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file (if exists)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("resident_directory=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    config.validate()?;

    if config.database.url.is_empty() {
        return Err(AppError::Config(
            "DATABASE_URL, POSTGRES_URL or DB_CONNECTION_FILE must be set".to_string(),
        )
        .into());
    }

    // Log config status (without revealing secrets)
    tracing::info!(
        app = %config.app_name,
        version = %config.app_version,
        origins = ?config.cors.allow_origins,
        uploads_configured = config.uploads.is_configured(),
        "Config loaded"
    );

    let store = PgStore::connect(&config.database).await?;
    store.migrate().await?;
    store.health_check().await?;
    tracing::info!("Database ready");

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, Arc::new(store))?;
    let app = build_app(state)?;

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
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
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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
