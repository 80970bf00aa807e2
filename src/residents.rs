//! Resident Directory Service
//!
//! CRUD over resident records plus filtered, sorted, paginated listing.
//! Role checks happen in the HTTP layer; this service trusts its caller.

use crate::error::AppError;
use crate::models::{CreateResidentRequest, Resident, ResidentPage, ResidentPatch};
use crate::store::{ResidentRepository, Store, Transaction};

use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

// ============================================
// Query Parameters
// ============================================

/// Sortable resident columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    LastName,
    FirstName,
    CreatedAt,
    UpdatedAt,
    City,
}

impl SortField {
    /// Column name used in ORDER BY
    pub fn column(&self) -> &'static str {
        match self {
            SortField::LastName => "last_name",
            SortField::FirstName => "first_name",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::City => "city",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// List parameters (`GET /residents?q&page&page_size&sort_by&sort_dir`)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResidentQuery {
    /// Free-text filter over name, address and contact fields
    #[serde(default)]
    pub q: Option<String>,

    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "page must be at least 1"))]
    pub page: i64,

    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 100, message = "page_size must be between 1 and 100"))]
    pub page_size: i64,

    #[serde(default)]
    pub sort_by: SortField,

    #[serde(default)]
    pub sort_dir: SortDirection,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

impl Default for ResidentQuery {
    fn default() -> Self {
        Self {
            q: None,
            page: default_page(),
            page_size: default_page_size(),
            sort_by: SortField::default(),
            sort_dir: SortDirection::default(),
        }
    }
}

impl ResidentQuery {
    /// Trimmed search text; blank means no filter
    pub fn search_term(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    /// Rows to skip before the requested page
    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0).saturating_mul(self.page_size)
    }
}

// ============================================
// Service
// ============================================

/// Resident directory operations
pub struct ResidentService {
    store: Arc<dyn Store>,
}

impl ResidentService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// One page of matching residents and the total match count
    pub async fn list(&self, query: ResidentQuery) -> Result<ResidentPage, AppError> {
        query.validate()?;

        let mut tx = self.store.begin().await?;
        let (items, total) = tx.search_residents(&query).await?;

        Ok(ResidentPage {
            items,
            total,
            page: query.page,
            page_size: query.page_size,
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<Resident, AppError> {
        let mut tx = self.store.begin().await?;
        tx.find_resident(id).await?.ok_or_else(not_found)
    }

    pub async fn create(&self, req: CreateResidentRequest) -> Result<Resident, AppError> {
        req.validate()?;

        let resident = Resident::from_request(req, Utc::now());

        let mut tx = self.store.begin().await?;
        tx.insert_resident(&resident).await?;
        tx.commit().await?;

        tracing::info!(resident_id = %resident.id, "Resident created");
        Ok(resident)
    }

    /// Apply the provided fields and bump `updated_at`
    pub async fn update(&self, id: Uuid, patch: ResidentPatch) -> Result<Resident, AppError> {
        patch.validate().map_err(AppError::Validation)?;

        let mut tx = self.store.begin().await?;
        let mut resident = tx.find_resident(id).await?.ok_or_else(not_found)?;

        patch.apply_to(&mut resident);
        resident.updated_at = Utc::now();

        if !tx.update_resident(&resident).await? {
            return Err(not_found());
        }
        tx.commit().await?;

        tracing::info!(resident_id = %id, "Resident updated");
        Ok(resident)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_resident(id).await? {
            return Err(not_found());
        }
        tx.commit().await?;

        tracing::info!(resident_id = %id, "Resident deleted");
        Ok(())
    }
}

fn not_found() -> AppError {
    AppError::NotFound("Resident not found".to_string())
}
