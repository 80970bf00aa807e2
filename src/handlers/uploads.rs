//! Photo Upload Handlers

use super::AppState;
use crate::error::AppError;

use axum::extract::State;

/// POST /uploads/cloudinary/sign
///
/// Reserved for signed Cloudinary uploads. Always 501.
pub async fn sign_upload(State(state): State<AppState>) -> AppError {
    tracing::info!(
        configured = state.config.uploads.is_configured(),
        "Cloudinary signing requested"
    );

    AppError::NotImplemented("Cloudinary upload integration is not implemented yet.".to_string())
}
