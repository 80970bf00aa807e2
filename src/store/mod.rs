//! Persistence
//!
//! Repository traits over users, refresh tokens and residents. Every call
//! goes through a [`Transaction`] handle obtained from a [`Store`]; the
//! handle is committed explicitly and rolled back when dropped.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::models::{RefreshToken, Resident, User, UserRole};
use crate::residents::ResidentQuery;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return StoreError::Conflict(db_err.message().to_string());
            }
        }
        StoreError::Database(err)
    }
}

/// New user row
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

/// User table operations
#[async_trait]
pub trait UserRepository: Send {
    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Exact, case-sensitive lookup
    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError>;

    /// Fails with `StoreError::Conflict` when the email is taken
    async fn insert_user(&mut self, user: NewUser) -> Result<User, StoreError>;
}

/// Refresh token table operations
#[async_trait]
pub trait RefreshTokenRepository: Send {
    async fn find_refresh_token(&mut self, token: &str)
        -> Result<Option<RefreshToken>, StoreError>;

    /// Fails with `StoreError::Conflict` when `(user_id, token)` exists
    async fn insert_refresh_token(&mut self, row: RefreshToken) -> Result<(), StoreError>;

    /// Returns whether a row was deleted
    async fn delete_refresh_token(&mut self, user_id: Uuid, token: &str)
        -> Result<bool, StoreError>;
}

/// Resident table operations
#[async_trait]
pub trait ResidentRepository: Send {
    /// One page of matches plus the total match count
    async fn search_residents(
        &mut self,
        query: &ResidentQuery,
    ) -> Result<(Vec<Resident>, i64), StoreError>;

    async fn find_resident(&mut self, id: Uuid) -> Result<Option<Resident>, StoreError>;

    async fn insert_resident(&mut self, resident: &Resident) -> Result<(), StoreError>;

    /// Overwrites every column; returns whether the row existed
    async fn update_resident(&mut self, resident: &Resident) -> Result<bool, StoreError>;

    /// Returns whether a row was deleted
    async fn delete_resident(&mut self, id: Uuid) -> Result<bool, StoreError>;
}

/// A unit of work over all repositories
#[async_trait]
pub trait Transaction: UserRepository + RefreshTokenRepository + ResidentRepository + Send {
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Source of transactions
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Escape LIKE wildcards so `q` matches literally
pub(crate) fn like_pattern(q: &str) -> String {
    let mut escaped = String::with_capacity(q.len() + 2);
    escaped.push('%');
    for c in q.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
