//! Data Models
//!
//! Database entities, request/response DTOs, and the partial-update types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

// ============================================
// Database Entities
// ============================================

/// User role enum matching database type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
}

impl UserRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::User => "user",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User entity from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

/// Refresh token row. Keyed by `(user_id, token)`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct RefreshToken {
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Expired once `expires_at` is reached
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Resident directory entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Resident {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    pub photo_public_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resident {
    /// Build a fresh record from a create request
    pub fn from_request(req: CreateResidentRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            first_name: req.first_name,
            last_name: req.last_name,
            address: req.address,
            city: req.city,
            state: req.state,
            zip: req.zip,
            phone: req.phone,
            email: req.email,
            photo_url: req.photo_url,
            photo_public_id: req.photo_public_id,
            notes: req.notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fields covered by free-text search
    pub fn searchable_fields(&self) -> [Option<&str>; 8] {
        [
            Some(self.first_name.as_str()),
            Some(self.last_name.as_str()),
            self.address.as_deref(),
            self.city.as_deref(),
            self.state.as_deref(),
            self.zip.as_deref(),
            self.phone.as_deref(),
            self.email.as_deref(),
        ]
    }
}

// ============================================
// Request DTOs
// ============================================

/// Registration request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
}

/// Login request. Not validated: malformed input fails like bad credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Refresh token request
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Logout request; the token is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Resident creation request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateResidentRequest {
    #[validate(length(min = 1, max = 200, message = "first_name must be 1-200 characters"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 200, message = "last_name must be 1-200 characters"))]
    pub last_name: String,

    #[validate(length(max = 500))]
    pub address: Option<String>,

    #[validate(length(max = 200))]
    pub city: Option<String>,

    #[validate(length(max = 50))]
    pub state: Option<String>,

    #[validate(length(max = 20))]
    pub zip: Option<String>,

    #[validate(length(max = 50))]
    pub phone: Option<String>,

    #[validate(length(max = 320))]
    pub email: Option<String>,

    #[validate(length(max = 2000))]
    pub photo_url: Option<String>,

    #[validate(length(max = 500))]
    pub photo_public_id: Option<String>,

    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

// ============================================
// Partial Updates
// ============================================

/// One field of a partial update.
///
/// A field missing from the JSON body stays `Unchanged`; a present field,
/// including an explicit `null` for optional columns, becomes `Set`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    Unchanged,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Unchanged
    }
}

impl<T> Patch<T> {
    /// Whether the field was provided
    pub fn is_set(&self) -> bool {
        matches!(self, Patch::Set(_))
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Patch::Set(value) => Some(value),
            Patch::Unchanged => None,
        }
    }

    /// Overwrite `target` when the field was provided
    pub fn apply(self, target: &mut T) {
        if let Patch::Set(value) = self {
            *target = value;
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Patch::Set)
    }
}

/// Resident update request: one `Patch` per updatable column
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResidentPatch {
    pub first_name: Patch<String>,
    pub last_name: Patch<String>,
    pub address: Patch<Option<String>>,
    pub city: Patch<Option<String>>,
    pub state: Patch<Option<String>>,
    pub zip: Patch<Option<String>>,
    pub phone: Patch<Option<String>>,
    pub email: Patch<Option<String>>,
    pub photo_url: Patch<Option<String>>,
    pub photo_public_id: Patch<Option<String>>,
    pub notes: Patch<Option<String>>,
}

impl ResidentPatch {
    /// Check the length limits of every provided field
    pub fn validate(&self) -> Result<(), String> {
        check_required("first_name", &self.first_name, 200)?;
        check_required("last_name", &self.last_name, 200)?;
        check_optional("address", &self.address, 500)?;
        check_optional("city", &self.city, 200)?;
        check_optional("state", &self.state, 50)?;
        check_optional("zip", &self.zip, 20)?;
        check_optional("phone", &self.phone, 50)?;
        check_optional("email", &self.email, 320)?;
        check_optional("photo_url", &self.photo_url, 2000)?;
        check_optional("photo_public_id", &self.photo_public_id, 500)?;
        check_optional("notes", &self.notes, 5000)?;
        Ok(())
    }

    /// Apply provided fields to `resident`, leaving the rest untouched
    pub fn apply_to(self, resident: &mut Resident) {
        self.first_name.apply(&mut resident.first_name);
        self.last_name.apply(&mut resident.last_name);
        self.address.apply(&mut resident.address);
        self.city.apply(&mut resident.city);
        self.state.apply(&mut resident.state);
        self.zip.apply(&mut resident.zip);
        self.phone.apply(&mut resident.phone);
        self.email.apply(&mut resident.email);
        self.photo_url.apply(&mut resident.photo_url);
        self.photo_public_id.apply(&mut resident.photo_public_id);
        self.notes.apply(&mut resident.notes);
    }
}

fn check_required(field: &str, patch: &Patch<String>, max: usize) -> Result<(), String> {
    match patch.as_set() {
        Some(value) if value.is_empty() || value.chars().count() > max => {
            Err(format!("{field} must be 1-{max} characters"))
        }
        _ => Ok(()),
    }
}

fn check_optional(field: &str, patch: &Patch<Option<String>>, max: usize) -> Result<(), String> {
    match patch.as_set() {
        Some(Some(value)) if value.chars().count() > max => {
            Err(format!("{field} must be at most {max} characters"))
        }
        _ => Ok(()),
    }
}

// ============================================
// Response DTOs
// ============================================

/// Public user view (no credentials)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Token pair returned by login and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

/// One page of residents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResidentPage {
    pub items: Vec<Resident>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resident() -> Resident {
        Resident::from_request(
            CreateResidentRequest {
                first_name: "Jane".into(),
                last_name: "Smith".into(),
                address: Some("1 Main St".into()),
                city: Some("Springfield".into()),
                state: None,
                zip: None,
                phone: Some("555-0100".into()),
                email: None,
                photo_url: None,
                photo_public_id: None,
                notes: Some("front desk".into()),
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_patch_distinguishes_absent_from_null() {
        let patch: ResidentPatch =
            serde_json::from_str(r#"{"city": null, "phone": "555-0199"}"#).unwrap();

        assert_eq!(patch.first_name, Patch::Unchanged);
        assert_eq!(patch.city, Patch::Set(None));
        assert_eq!(patch.phone, Patch::Set(Some("555-0199".to_string())));
        assert!(!patch.notes.is_set());
    }

    #[test]
    fn test_patch_rejects_null_required_field() {
        let result = serde_json::from_str::<ResidentPatch>(r#"{"first_name": null}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_patch_apply_to() {
        let mut target = resident();
        let patch: ResidentPatch =
            serde_json::from_str(r#"{"last_name": "Smythe", "city": null}"#).unwrap();

        patch.apply_to(&mut target);

        assert_eq!(target.first_name, "Jane");
        assert_eq!(target.last_name, "Smythe");
        assert_eq!(target.city, None);
        assert_eq!(target.address.as_deref(), Some("1 Main St"));
        assert_eq!(target.notes.as_deref(), Some("front desk"));
    }

    #[test]
    fn test_patch_validation() {
        let ok: ResidentPatch = serde_json::from_str(r#"{"zip": "12345"}"#).unwrap();
        assert!(ok.validate().is_ok());

        let empty_name: ResidentPatch = serde_json::from_str(r#"{"first_name": ""}"#).unwrap();
        assert!(empty_name.validate().is_err());

        let long_zip = format!(r#"{{"zip": "{}"}}"#, "9".repeat(21));
        let long_zip: ResidentPatch = serde_json::from_str(&long_zip).unwrap();
        assert!(long_zip.validate().is_err());
    }

    #[test]
    fn test_user_response_hides_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            password_hash: "secret-hash".into(),
            role: UserRole::User,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(UserResponse::from(&user)).unwrap();
        assert_eq!(json["role"], "user");
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn test_refresh_token_expiry() {
        let now = Utc::now();
        let row = RefreshToken {
            user_id: Uuid::new_v4(),
            token: "t".into(),
            expires_at: now,
            created_at: now,
        };
        assert!(row.is_expired_at(now));
        assert!(!row.is_expired_at(now - chrono::Duration::seconds(1)));
    }
}
