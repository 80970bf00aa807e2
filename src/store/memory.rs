//! In-process store.
//!
//! Transactions are serialized: `begin` takes an exclusive lock, works on a
//! copy of the tables and publishes the copy on `commit`. Dropping an
//! uncommitted transaction discards its changes.

use super::{
    NewUser, RefreshTokenRepository, ResidentRepository, Store, StoreError, Transaction,
    UserRepository,
};
use crate::models::{RefreshToken, Resident, User};
use crate::residents::{ResidentQuery, SortDirection, SortField};

use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct Tables {
    users: Vec<User>,
    refresh_tokens: Vec<RefreshToken>,
    residents: Vec<Resident>,
}

/// Store holding every table in memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, working }))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Exclusive transaction over the in-memory tables
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryTransaction {
    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.working.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.working.users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&mut self, user: NewUser) -> Result<User, StoreError> {
        if self.working.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!(
                "users.email {} already exists",
                user.email
            )));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: user.created_at,
        };
        self.working.users.push(user.clone());
        Ok(user)
    }
}

#[async_trait]
impl RefreshTokenRepository for MemoryTransaction {
    async fn find_refresh_token(
        &mut self,
        token: &str,
    ) -> Result<Option<RefreshToken>, StoreError> {
        Ok(self
            .working
            .refresh_tokens
            .iter()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn insert_refresh_token(&mut self, row: RefreshToken) -> Result<(), StoreError> {
        if !self.working.users.iter().any(|u| u.id == row.user_id) {
            return Err(StoreError::Conflict(format!(
                "refresh_tokens.user_id {} references no user",
                row.user_id
            )));
        }
        if self
            .working
            .refresh_tokens
            .iter()
            .any(|t| t.user_id == row.user_id && t.token == row.token)
        {
            return Err(StoreError::Conflict(
                "refresh_tokens (user_id, token) already exists".to_string(),
            ));
        }

        self.working.refresh_tokens.push(row);
        Ok(())
    }

    async fn delete_refresh_token(
        &mut self,
        user_id: Uuid,
        token: &str,
    ) -> Result<bool, StoreError> {
        let before = self.working.refresh_tokens.len();
        self.working
            .refresh_tokens
            .retain(|t| !(t.user_id == user_id && t.token == token));
        Ok(self.working.refresh_tokens.len() < before)
    }
}

#[async_trait]
impl ResidentRepository for MemoryTransaction {
    async fn search_residents(
        &mut self,
        query: &ResidentQuery,
    ) -> Result<(Vec<Resident>, i64), StoreError> {
        let needle = query.search_term().map(str::to_lowercase);

        let mut matches: Vec<&Resident> = self
            .working
            .residents
            .iter()
            .filter(|r| match &needle {
                Some(needle) => r
                    .searchable_fields()
                    .iter()
                    .flatten()
                    .any(|field| field.to_lowercase().contains(needle.as_str())),
                None => true,
            })
            .collect();

        matches.sort_by(|a, b| {
            let ordering = compare_ascending(a, b, query.sort_by);
            let ordering = match query.sort_dir {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            ordering.then_with(|| a.id.cmp(&b.id))
        });

        let total = matches.len() as i64;
        let items = matches
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.page_size as usize)
            .cloned()
            .collect();

        Ok((items, total))
    }

    async fn find_resident(&mut self, id: Uuid) -> Result<Option<Resident>, StoreError> {
        Ok(self.working.residents.iter().find(|r| r.id == id).cloned())
    }

    async fn insert_resident(&mut self, resident: &Resident) -> Result<(), StoreError> {
        if self.working.residents.iter().any(|r| r.id == resident.id) {
            return Err(StoreError::Conflict(format!(
                "residents.id {} already exists",
                resident.id
            )));
        }
        self.working.residents.push(resident.clone());
        Ok(())
    }

    async fn update_resident(&mut self, resident: &Resident) -> Result<bool, StoreError> {
        match self.working.residents.iter_mut().find(|r| r.id == resident.id) {
            Some(existing) => {
                let created_at = existing.created_at;
                *existing = resident.clone();
                existing.created_at = created_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_resident(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let before = self.working.residents.len();
        self.working.residents.retain(|r| r.id != id);
        Ok(self.working.residents.len() < before)
    }
}

/// Ascending order with NULLs last. Text compares case-insensitively first,
/// close to a PostgreSQL locale collation; byte order only breaks ties.
fn compare_ascending(a: &Resident, b: &Resident, field: SortField) -> Ordering {
    match field {
        SortField::LastName => collate(&a.last_name, &b.last_name),
        SortField::FirstName => collate(&a.first_name, &b.first_name),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortField::City => match (&a.city, &b.city) {
            (Some(x), Some(y)) => collate(x, y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    }
}

fn collate(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use chrono::Utc;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: UserRole::User,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_user(new_user("a@x.com")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_user_by_email("a@x.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_drop_discards_changes() {
        let store = MemoryStore::new();

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_user(new_user("a@x.com")).await.unwrap();
        }

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_user_by_email("a@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_email() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        tx.insert_user(new_user("a@x.com")).await.unwrap();
        let err = tx.insert_user(new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // Lookups are case-sensitive
        tx.insert_user(new_user("A@x.com")).await.unwrap();
    }

    #[tokio::test]
    async fn test_refresh_token_key_is_unique() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let user = tx.insert_user(new_user("a@x.com")).await.unwrap();

        let row = RefreshToken {
            user_id: user.id,
            token: "tok".into(),
            expires_at: Utc::now(),
            created_at: Utc::now(),
        };
        tx.insert_refresh_token(row.clone()).await.unwrap();
        assert!(matches!(
            tx.insert_refresh_token(row).await.unwrap_err(),
            StoreError::Conflict(_)
        ));

        assert!(tx.delete_refresh_token(user.id, "tok").await.unwrap());
        assert!(!tx.delete_refresh_token(user.id, "tok").await.unwrap());
    }
}
