//! HTTP Handlers
//!
//! Route table and shared state. Handlers stay thin: extract, call a
//! service, pick a status code.

pub mod auth;
pub mod health;
pub mod residents;
pub mod uploads;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::middleware;
use crate::residents::ResidentService;
use crate::service::AuthService;
use crate::store::Store;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
    pub residents: Arc<ResidentService>,
}

impl AppState {
    /// Wire services over one store
    pub fn new(config: AppConfig, store: Arc<dyn Store>) -> Result<Self, AppError> {
        let auth = AuthService::new(
            store.clone(),
            config.jwt.clone(),
            config.password.clone(),
        )?;

        Ok(Self {
            auth: Arc::new(auth),
            residents: Arc::new(ResidentService::new(store)),
            config: Arc::new(config),
        })
    }
}

// ============================================
// Route Builder
// ============================================

/// Create the application routes
pub fn create_router(state: AppState) -> Router {
    // Public routes (no authentication required)
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/uploads/cloudinary/sign", post(uploads::sign_upload));

    // Any authenticated user
    let readers = Router::new()
        .route("/residents", get(residents::list_residents))
        .route("/residents/:id", get(residents::get_resident))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Admin only
    let admins = Router::new()
        .route("/residents", post(residents::create_resident))
        .route(
            "/residents/:id",
            put(residents::update_resident).delete(residents::delete_resident),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_admin,
        ));

    Router::new()
        .merge(public)
        .merge(readers)
        .merge(admins)
        .with_state(state)
}

/// Map an extractor rejection onto the shared error shape
pub(crate) fn invalid_input(rejection: impl std::fmt::Display) -> AppError {
    AppError::Validation(rejection.to_string())
}
