//! Authentication Middleware
//!
//! Bearer token validation for protected routes. The resolved principal is
//! stored in request extensions for the `AuthUser` extractor.

use crate::error::{AppError, NOT_AUTHENTICATED};
use crate::extractors::AuthUser;
use crate::handlers::AppState;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

/// Reuse a principal resolved by an outer layer, else authenticate the header
async fn resolve_user(
    state: &AppState,
    headers: &HeaderMap,
    existing: Option<AuthUser>,
) -> Result<AuthUser, AppError> {
    if let Some(user) = existing {
        return Ok(user);
    }

    let token = bearer_token(headers).ok_or(AppError::Unauthorized(NOT_AUTHENTICATED))?;
    state.auth.authenticate(token).await
}

/// Require authenticated user
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let existing = req.extensions().get::<AuthUser>().cloned();
    let user = resolve_user(&state, req.headers(), existing).await?;
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Require admin role, checked against the stored user
pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let existing = req.extensions().get::<AuthUser>().cloned();
    let user = resolve_user(&state, req.headers(), existing).await?;

    if !user.is_admin() {
        tracing::info!(user_id = %user.id, "Admin route denied");
        return Err(AppError::Forbidden);
    }

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}
