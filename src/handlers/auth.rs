//! Authentication Handlers

use super::{invalid_input, AppState};
use crate::error::AppError;
use crate::models::*;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload.map_err(invalid_input)?;

    let user = state.auth.register(req).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload.map_err(invalid_input)?;

    let response = state.auth.login(req).await?;

    Ok(Json(response))
}

/// POST /auth/refresh
///
/// Exchange a refresh token for a new pair; the presented token is consumed.
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload.map_err(invalid_input)?;

    let response = state.auth.refresh(&req.refresh_token).await?;

    Ok(Json(response))
}

/// POST /auth/logout
///
/// The body is optional; an empty body logs out nothing and still succeeds.
pub async fn logout(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let req = if body.iter().all(u8::is_ascii_whitespace) {
        LogoutRequest::default()
    } else {
        serde_json::from_slice::<LogoutRequest>(&body).map_err(invalid_input)?
    };

    state.auth.logout(req.refresh_token.as_deref()).await?;

    Ok(StatusCode::NO_CONTENT)
}
