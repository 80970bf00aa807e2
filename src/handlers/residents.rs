//! Resident Handlers

use super::{invalid_input, AppState};
use crate::error::AppError;
use crate::extractors::AuthUser;
use crate::models::{CreateResidentRequest, ResidentPatch};
use crate::residents::ResidentQuery;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

/// GET /residents - Search, sort and paginate
pub async fn list_residents(
    State(state): State<AppState>,
    query: Result<Query<ResidentQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query.map_err(invalid_input)?;

    let page = state.residents.list(query).await?;

    Ok(Json(page))
}

/// GET /residents/:id
pub async fn get_resident(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id.map_err(invalid_input)?;

    let resident = state.residents.get(id).await?;

    Ok(Json(resident))
}

/// POST /residents (admin)
pub async fn create_resident(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<CreateResidentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload.map_err(invalid_input)?;

    let resident = state.residents.create(req).await?;
    tracing::debug!(admin_id = %user.id, resident_id = %resident.id, "Create by admin");

    Ok((StatusCode::CREATED, Json(resident)))
}

/// PUT /residents/:id (admin) - Partial update
pub async fn update_resident(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ResidentPatch>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id.map_err(invalid_input)?;
    let Json(patch) = payload.map_err(invalid_input)?;

    let resident = state.residents.update(id, patch).await?;

    Ok(Json(resident))
}

/// DELETE /residents/:id (admin)
pub async fn delete_resident(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id.map_err(invalid_input)?;

    state.residents.delete(id).await?;

    Ok(StatusCode::NO_CONTENT)
}
