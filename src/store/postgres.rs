//! PostgreSQL store backed by an sqlx connection pool

use super::{
    like_pattern, NewUser, RefreshTokenRepository, ResidentRepository, Store, StoreError,
    Transaction, UserRepository,
};
use crate::config::DatabaseConfig;
use crate::models::{RefreshToken, Resident, User};
use crate::residents::ResidentQuery;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres};
use std::time::Duration;
use uuid::Uuid;

const RESIDENT_COLUMNS: &str = "id, first_name, last_name, address, city, state, zip, phone, \
     email, photo_url, photo_public_id, notes, created_at, updated_at";

const SEARCH_FILTER: &str = "($1::text IS NULL
       OR first_name ILIKE $1 OR last_name ILIKE $1
       OR address ILIKE $1 OR city ILIKE $1
       OR state ILIKE $1 OR zip ILIKE $1
       OR phone ILIKE $1 OR email ILIKE $1)";

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool from configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.url)
            .await?;

        Ok(Self::new(pool))
    }

    /// Get reference to the database pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create types, tables and indexes if missing
    pub async fn migrate(&self) -> Result<(), StoreError> {
        tracing::info!("Running database migrations");

        let statements = [
            r#"
            DO $$ BEGIN
                CREATE TYPE user_role AS ENUM ('admin', 'user');
            EXCEPTION
                WHEN duplicate_object THEN null;
            END $$;
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role user_role NOT NULL DEFAULT 'user',
                created_at TIMESTAMPTZ NOT NULL
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS refresh_tokens (
                user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                token TEXT NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (user_id, token)
            );
            "#,
            "CREATE INDEX IF NOT EXISTS idx_refresh_tokens_token ON refresh_tokens(token);",
            r#"
            CREATE TABLE IF NOT EXISTS residents (
                id UUID PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                address TEXT,
                city TEXT,
                state TEXT,
                zip TEXT,
                phone TEXT,
                email TEXT,
                photo_url TEXT,
                photo_public_id TEXT,
                notes TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            );
            "#,
            "CREATE INDEX IF NOT EXISTS idx_residents_last_name ON residents(last_name);",
            "CREATE INDEX IF NOT EXISTS idx_residents_first_name ON residents(first_name);",
            "CREATE INDEX IF NOT EXISTS idx_residents_city ON residents(city);",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Migration(e.to_string()))?;
        }

        tracing::info!("Database migrations completed successfully");
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Open PostgreSQL transaction; rolls back on drop unless committed
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PgTransaction {
    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(user)
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, role, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(user)
    }

    async fn insert_user(&mut self, user: NewUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, password_hash, role, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.created_at)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(user)
    }
}

#[async_trait]
impl RefreshTokenRepository for PgTransaction {
    async fn find_refresh_token(
        &mut self,
        token: &str,
    ) -> Result<Option<RefreshToken>, StoreError> {
        let row = sqlx::query_as::<_, RefreshToken>(
            "SELECT user_id, token, expires_at, created_at FROM refresh_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row)
    }

    async fn insert_refresh_token(&mut self, row: RefreshToken) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token, expires_at, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(row.user_id)
        .bind(&row.token)
        .bind(row.expires_at)
        .bind(row.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_refresh_token(
        &mut self,
        user_id: Uuid,
        token: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1 AND token = $2")
            .bind(user_id)
            .bind(token)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ResidentRepository for PgTransaction {
    async fn search_residents(
        &mut self,
        query: &ResidentQuery,
    ) -> Result<(Vec<Resident>, i64), StoreError> {
        let pattern = query.search_term().map(like_pattern);

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM residents WHERE {SEARCH_FILTER}"))
                .bind(&pattern)
                .fetch_one(&mut *self.tx)
                .await?;

        // Sort column and direction come from closed enums, never from input text
        let sql = format!(
            "SELECT {RESIDENT_COLUMNS} FROM residents WHERE {SEARCH_FILTER} \
             ORDER BY {} {}, id ASC LIMIT $2 OFFSET $3",
            query.sort_by.column(),
            query.sort_dir.sql(),
        );

        let items = sqlx::query_as::<_, Resident>(&sql)
            .bind(&pattern)
            .bind(query.page_size)
            .bind(query.offset())
            .fetch_all(&mut *self.tx)
            .await?;

        Ok((items, total))
    }

    async fn find_resident(&mut self, id: Uuid) -> Result<Option<Resident>, StoreError> {
        let resident = sqlx::query_as::<_, Resident>(&format!(
            "SELECT {RESIDENT_COLUMNS} FROM residents WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(resident)
    }

    async fn insert_resident(&mut self, r: &Resident) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO residents ({RESIDENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(r.id)
        .bind(&r.first_name)
        .bind(&r.last_name)
        .bind(&r.address)
        .bind(&r.city)
        .bind(&r.state)
        .bind(&r.zip)
        .bind(&r.phone)
        .bind(&r.email)
        .bind(&r.photo_url)
        .bind(&r.photo_public_id)
        .bind(&r.notes)
        .bind(r.created_at)
        .bind(r.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_resident(&mut self, r: &Resident) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE residents SET
                first_name = $2, last_name = $3, address = $4, city = $5,
                state = $6, zip = $7, phone = $8, email = $9,
                photo_url = $10, photo_public_id = $11, notes = $12,
                updated_at = $13
            WHERE id = $1
            "#,
        )
        .bind(r.id)
        .bind(&r.first_name)
        .bind(&r.last_name)
        .bind(&r.address)
        .bind(&r.city)
        .bind(&r.state)
        .bind(&r.zip)
        .bind(&r.phone)
        .bind(&r.email)
        .bind(&r.photo_url)
        .bind(&r.photo_public_id)
        .bind(&r.notes)
        .bind(r.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_resident(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM residents WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database_config() -> Option<DatabaseConfig> {
        std::env::var("DATABASE_URL").ok().map(|url| DatabaseConfig {
            url,
            max_connections: 2,
        })
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_migrate_is_idempotent() {
        let config = database_config().expect("DATABASE_URL must be set");
        let store = PgStore::connect(&config).await.unwrap();

        store.migrate().await.unwrap();
        store.migrate().await.unwrap();
        store.health_check().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running PostgreSQL database"]
    async fn test_uncommitted_transaction_rolls_back() {
        let config = database_config().expect("DATABASE_URL must be set");
        let store = PgStore::connect(&config).await.unwrap();
        store.migrate().await.unwrap();

        let email = format!("{}@rollback.test", Uuid::new_v4());
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_user(NewUser {
                email: email.clone(),
                password_hash: "hash".into(),
                role: crate::models::UserRole::User,
                created_at: chrono::Utc::now(),
            })
            .await
            .unwrap();
        }

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_user_by_email(&email).await.unwrap().is_none());
    }
}
