//! Authentication Service
//!
//! Registration, login, refresh token rotation and logout. Every operation
//! runs inside one store transaction; failures roll back by dropping it.

use crate::config::{JwtConfig, PasswordConfig};
use crate::error::{AppError, INVALID_CREDENTIALS, INVALID_TOKEN};
use crate::extractors::AuthUser;
use crate::models::*;
use crate::password::PasswordHasher;
use crate::store::{
    NewUser, RefreshTokenRepository, Store, StoreError, Transaction, UserRepository,
};
use crate::tokens::{TokenIssuer, TokenType};

use chrono::Utc;
use std::sync::Arc;
use validator::Validate;

/// Authentication service
pub struct AuthService {
    store: Arc<dyn Store>,
    hasher: PasswordHasher,
    tokens: TokenIssuer,
    password: PasswordConfig,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(
        store: Arc<dyn Store>,
        jwt: JwtConfig,
        password: PasswordConfig,
    ) -> Result<Self, AppError> {
        Ok(Self {
            store,
            hasher: PasswordHasher::new(&password)?,
            tokens: TokenIssuer::new(jwt),
            password,
        })
    }

    /// Get reference to the token issuer
    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Check password length against the configured bounds
    pub fn validate_password(&self, password: &str) -> Result<(), AppError> {
        let len = password.chars().count();
        if len < self.password.min_length {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters",
                self.password.min_length
            )));
        }
        if len > self.password.max_length {
            return Err(AppError::Validation(format!(
                "Password must be at most {} characters",
                self.password.max_length
            )));
        }
        Ok(())
    }

    // ============================================
    // User Registration
    // ============================================

    /// Register a new user with the `user` role
    pub async fn register(&self, req: RegisterRequest) -> Result<UserResponse, AppError> {
        self.validate_password(&req.password)?;
        req.validate()?;

        let mut tx = self.store.begin().await?;

        if tx.find_user_by_email(&req.email).await?.is_some() {
            return Err(email_taken());
        }

        let password_hash = self.hasher.hash(&req.password)?;

        let user = tx
            .insert_user(NewUser {
                email: req.email,
                password_hash,
                role: UserRole::User,
                created_at: Utc::now(),
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => email_taken(),
                other => other.into(),
            })?;

        tx.commit().await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user.into())
    }

    // ============================================
    // Login / Logout
    // ============================================

    /// Exchange credentials for a token pair
    pub async fn login(&self, req: LoginRequest) -> Result<TokenResponse, AppError> {
        let mut tx = self.store.begin().await?;

        // Unknown emails still pay for one Argon2 verification
        let user = match tx.find_user_by_email(&req.email).await? {
            Some(user) if self.hasher.verify(&req.password, &user.password_hash) => Some(user),
            Some(_) => None,
            None => {
                self.hasher.verify_absent(&req.password);
                None
            }
        };
        let Some(user) = user else {
            tracing::info!("Login rejected");
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS));
        };

        let response = self.issue_token_pair(&mut *tx, &user).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(response)
    }

    /// Revoke a refresh token. Unknown or missing tokens are not an error.
    pub async fn logout(&self, refresh_token: Option<&str>) -> Result<(), AppError> {
        let Some(token) = refresh_token.filter(|t| !t.is_empty()) else {
            return Ok(());
        };

        let mut tx = self.store.begin().await?;
        if let Some(row) = tx.find_refresh_token(token).await? {
            tx.delete_refresh_token(row.user_id, &row.token).await?;
            tx.commit().await?;
            tracing::info!(user_id = %row.user_id, "Refresh token revoked");
        }

        Ok(())
    }

    // ============================================
    // Token Refresh
    // ============================================

    /// Rotate a refresh token: the presented one is consumed and a new pair
    /// is issued in the same transaction.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        let mut tx = self.store.begin().await?;

        let stored = tx
            .find_refresh_token(refresh_token)
            .await?
            .ok_or(AppError::Unauthorized(INVALID_TOKEN))?;

        if stored.is_expired_at(Utc::now()) {
            tx.delete_refresh_token(stored.user_id, &stored.token).await?;
            tx.commit().await?;
            tracing::info!(user_id = %stored.user_id, "Expired refresh token reaped");
            return Err(AppError::Unauthorized(INVALID_TOKEN));
        }

        let claims = self.tokens.verify(refresh_token)?;
        if claims.token_type != TokenType::Refresh {
            tracing::debug!("Refresh rejected: wrong token type");
            return Err(AppError::Unauthorized(INVALID_TOKEN));
        }

        let user_id = claims
            .user_id()
            .filter(|id| *id == stored.user_id)
            .ok_or(AppError::Unauthorized(INVALID_TOKEN))?;

        let user = tx
            .find_user(user_id)
            .await?
            .ok_or(AppError::Unauthorized(INVALID_TOKEN))?;

        // Zero rows means a concurrent refresh consumed the token first
        if !tx.delete_refresh_token(user.id, refresh_token).await? {
            tracing::warn!(user_id = %user.id, "Refresh token already rotated");
            return Err(AppError::Unauthorized(INVALID_TOKEN));
        }

        let response = self.issue_token_pair(&mut *tx, &user).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, "Refresh token rotated");
        Ok(response)
    }

    // ============================================
    // Access Token Authentication
    // ============================================

    /// Resolve a bearer access token to the stored user it names
    pub async fn authenticate(&self, access_token: &str) -> Result<AuthUser, AppError> {
        let claims = self.tokens.verify(access_token)?;
        if claims.token_type != TokenType::Access {
            tracing::debug!("Authentication rejected: wrong token type");
            return Err(AppError::Unauthorized(INVALID_TOKEN));
        }

        let user_id = claims
            .user_id()
            .ok_or(AppError::Unauthorized(INVALID_TOKEN))?;

        let mut tx = self.store.begin().await?;
        let user = tx
            .find_user(user_id)
            .await?
            .ok_or(AppError::Unauthorized(INVALID_TOKEN))?;

        Ok(AuthUser::from(user))
    }

    /// Mint an access/refresh pair and persist the refresh token row
    async fn issue_token_pair(
        &self,
        tx: &mut dyn Transaction,
        user: &User,
    ) -> Result<TokenResponse, AppError> {
        let now = Utc::now();
        let (access_token, expires_in) = self.tokens.issue_access_at(user.id, user.role, now)?;
        let (refresh_token, expires_at) = self.tokens.issue_refresh_at(user.id, now)?;

        tx.insert_refresh_token(RefreshToken {
            user_id: user.id,
            token: refresh_token.clone(),
            expires_at,
            created_at: now,
        })
        .await?;

        Ok(TokenResponse {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
            expires_in,
            user: user.into(),
        })
    }
}

fn email_taken() -> AppError {
    AppError::Conflict("Email already registered".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Duration;

    fn service_with_store() -> (AuthService, MemoryStore) {
        let store = MemoryStore::new();
        let password = PasswordConfig {
            memory_cost: 8,
            time_cost: 1,
            parallelism: 1,
            ..PasswordConfig::default()
        };
        let service = AuthService::new(
            Arc::new(store.clone()),
            JwtConfig::new("k".repeat(32)),
            password,
        )
        .unwrap();
        (service, store)
    }

    fn service() -> AuthService {
        service_with_store().0
    }

    fn register_request(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let auth = service();

        let user = auth
            .register(register_request("a@x.com", "longpass1"))
            .await
            .unwrap();
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.role, UserRole::User);

        let tokens = auth.login(login_request("a@x.com", "longpass1")).await.unwrap();
        assert_eq!(tokens.token_type, "bearer");
        assert_eq!(tokens.expires_in, 1800);
        assert_eq!(tokens.user, user);
        assert_ne!(tokens.access_token, tokens.refresh_token);
    }

    #[tokio::test]
    async fn test_register_rejects_short_password() {
        let auth = service();
        let result = auth.register(register_request("a@x.com", "short")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_email() {
        let auth = service();
        auth.register(register_request("a@x.com", "longpass1"))
            .await
            .unwrap();

        let result = auth.register(register_request("a@x.com", "otherpass1")).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let auth = service();
        auth.register(register_request("a@x.com", "longpass1"))
            .await
            .unwrap();

        let wrong_password = auth
            .login(login_request("a@x.com", "wrongpass1"))
            .await
            .unwrap_err();
        let unknown_email = auth
            .login(login_request("b@x.com", "longpass1"))
            .await
            .unwrap_err();

        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert!(matches!(
            wrong_password,
            AppError::Unauthorized(INVALID_CREDENTIALS)
        ));
    }

    #[tokio::test]
    async fn test_refresh_rotates_token() {
        let auth = service();
        auth.register(register_request("a@x.com", "longpass1"))
            .await
            .unwrap();
        let first = auth.login(login_request("a@x.com", "longpass1")).await.unwrap();

        let second = auth.refresh(&first.refresh_token).await.unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);

        // The consumed token is gone
        assert!(matches!(
            auth.refresh(&first.refresh_token).await,
            Err(AppError::Unauthorized(_))
        ));

        // The new one works exactly once
        auth.refresh(&second.refresh_token).await.unwrap();
        assert!(auth.refresh(&second.refresh_token).await.is_err());
    }

    async fn store_refresh_row(
        store: &MemoryStore,
        user_id: uuid::Uuid,
        token: &str,
        expires_at: chrono::DateTime<Utc>,
    ) {
        let mut tx = store.begin().await.unwrap();
        tx.insert_refresh_token(RefreshToken {
            user_id,
            token: token.to_string(),
            expires_at,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();
    }

    async fn row_exists(store: &MemoryStore, token: &str) -> bool {
        let mut tx = store.begin().await.unwrap();
        tx.find_refresh_token(token).await.unwrap().is_some()
    }

    #[tokio::test]
    async fn test_refresh_rejects_unknown_token() {
        let auth = service();
        auth.register(register_request("a@x.com", "longpass1"))
            .await
            .unwrap();
        let tokens = auth.login(login_request("a@x.com", "longpass1")).await.unwrap();

        assert!(matches!(
            auth.refresh(&tokens.access_token).await,
            Err(AppError::Unauthorized(INVALID_TOKEN))
        ));
    }

    #[tokio::test]
    async fn test_refresh_rejects_stored_access_token() {
        let (auth, store) = service_with_store();
        let user = auth
            .register(register_request("a@x.com", "longpass1"))
            .await
            .unwrap();
        let (access, _) = auth.tokens().issue_access(user.id, UserRole::User).unwrap();
        store_refresh_row(&store, user.id, &access, Utc::now() + Duration::days(1)).await;

        // Signature and subject are valid, only the type claim is wrong
        assert!(matches!(
            auth.refresh(&access).await,
            Err(AppError::Unauthorized(INVALID_TOKEN))
        ));
        assert!(row_exists(&store, &access).await);
    }

    #[tokio::test]
    async fn test_refresh_rejects_foreign_signature() {
        let (auth, store) = service_with_store();
        let user = auth
            .register(register_request("a@x.com", "longpass1"))
            .await
            .unwrap();
        let foreign = TokenIssuer::new(JwtConfig::new("z".repeat(32)));
        let (token, expires_at) = foreign.issue_refresh(user.id).unwrap();
        store_refresh_row(&store, user.id, &token, expires_at).await;

        assert!(matches!(
            auth.refresh(&token).await,
            Err(AppError::Unauthorized(INVALID_TOKEN))
        ));
        assert!(row_exists(&store, &token).await);
    }

    #[tokio::test]
    async fn test_concurrent_refresh_has_one_winner() {
        let auth = service();
        auth.register(register_request("a@x.com", "longpass1"))
            .await
            .unwrap();
        let tokens = auth.login(login_request("a@x.com", "longpass1")).await.unwrap();

        let (first, second) = tokio::join!(
            auth.refresh(&tokens.refresh_token),
            auth.refresh(&tokens.refresh_token)
        );

        assert!(first.is_ok() ^ second.is_ok());
        let loser = if first.is_ok() { second } else { first };
        assert!(matches!(loser, Err(AppError::Unauthorized(INVALID_TOKEN))));
    }

    #[tokio::test]
    async fn test_refresh_reaps_expired_row() {
        let (auth, store) = service_with_store();
        let user = auth
            .register(register_request("a@x.com", "longpass1"))
            .await
            .unwrap();

        let issued = Utc::now() - Duration::days(31);
        let (token, expires_at) = auth.tokens().issue_refresh_at(user.id, issued).unwrap();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_refresh_token(RefreshToken {
                user_id: user.id,
                token: token.clone(),
                expires_at,
                created_at: issued,
            })
            .await
            .unwrap();
            tx.commit().await.unwrap();
        }

        assert!(auth.refresh(&token).await.is_err());

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_refresh_token(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let auth = service();
        auth.register(register_request("a@x.com", "longpass1"))
            .await
            .unwrap();
        let tokens = auth.login(login_request("a@x.com", "longpass1")).await.unwrap();

        auth.logout(None).await.unwrap();
        auth.logout(Some("unknown")).await.unwrap();
        auth.logout(Some(&tokens.refresh_token)).await.unwrap();
        auth.logout(Some(&tokens.refresh_token)).await.unwrap();

        assert!(auth.refresh(&tokens.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn test_authenticate_requires_access_token() {
        let auth = service();
        let user = auth
            .register(register_request("a@x.com", "longpass1"))
            .await
            .unwrap();
        let tokens = auth.login(login_request("a@x.com", "longpass1")).await.unwrap();

        let principal = auth.authenticate(&tokens.access_token).await.unwrap();
        assert_eq!(principal.id, user.id);
        assert!(!principal.is_admin());

        assert!(auth.authenticate(&tokens.refresh_token).await.is_err());
        assert!(auth.authenticate("garbage").await.is_err());
    }

    #[tokio::test]
    async fn test_authenticate_rejects_unknown_subject() {
        let auth = service();
        let (token, _) = auth
            .tokens()
            .issue_access(uuid::Uuid::new_v4(), UserRole::Admin)
            .unwrap();

        assert!(matches!(
            auth.authenticate(&token).await,
            Err(AppError::Unauthorized(INVALID_TOKEN))
        ));
    }
}
