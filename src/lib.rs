//! Resident Directory API
//!
//! Backend for a resident directory providing:
//! - User registration and login
//! - JWT access tokens and rotating refresh tokens
//! - Argon2id password hashing
//! - Refresh token revocation on logout
//! - Admin-gated resident CRUD with search, sorting and pagination
//!
//! # Configuration
//!
//! All configuration is loaded from environment variables, see
//! [`AppConfig::from_env`]:
//! - `JWT_SECRET_KEY` - Secret key for signing JWTs (required, min 32 chars)
//! - `ACCESS_TOKEN_EXPIRES_MINUTES` - Access token lifetime (default: 30)
//! - `REFRESH_TOKEN_EXPIRES_DAYS` - Refresh token lifetime (default: 30)
//! - `JWT_ISSUER` - JWT issuer claim (default: "resident-directory")
//! - `JWT_AUDIENCE` - JWT audience claim (default: "resident-directory-frontend")
//! - `DATABASE_URL` - PostgreSQL connection string (required by the binary)
//! - `ALLOW_ORIGINS` - Comma-separated CORS origins (default: "http://localhost:3000")
//!
//! # Usage
//!
//! ```rust,ignore
//! use resident_directory::{build_app, AppConfig, AppState, PgStore};
//!
//! let config = AppConfig::from_env()?;
//! let store = PgStore::connect(&config.database).await?;
//! store.migrate().await?;
//!
//! let state = AppState::new(config, Arc::new(store))?;
//! let app = build_app(state)?;
//! ```

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod password;
pub mod residents;
pub mod service;
pub mod store;
pub mod tokens;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::AppError;
pub use extractors::AuthUser;
pub use handlers::{create_router, AppState};
pub use residents::{ResidentQuery, ResidentService};
pub use service::AuthService;
pub use store::{MemoryStore, PgStore, Store, StoreError};

use crate::config::CorsConfig;

use axum::{http::HeaderValue, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

/// CORS policy: listed origins only, credentials allowed
pub fn cors_layer(config: &CorsConfig) -> Result<CorsLayer, AppError> {
    let origins = config
        .allow_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|_| AppError::Config(format!("Invalid CORS origin: {origin}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

/// Full application: routes plus CORS and request tracing
pub fn build_app(state: AppState) -> Result<Router, AppError> {
    let cors = cors_layer(&state.config.cors)?;

    Ok(create_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    ))
}
