//! Application Configuration
//!
//! All configuration values are loaded from environment variables once at
//! startup and handed to every component as an immutable `Arc<AppConfig>`.
//! No hardcoded secrets.

use crate::error::AppError;

use jsonwebtoken::Algorithm;
use std::env;
use std::str::FromStr;

const DEFAULT_ORIGIN: &str = "http://localhost:3000";

/// Upper bound for either token lifetime (ten years)
pub const MAX_TOKEN_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Top-level application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Service name (from APP_NAME env var)
    pub app_name: String,

    /// Service version (from APP_VERSION env var)
    pub app_version: String,

    /// Listen address (from BIND_ADDR env var)
    pub bind_addr: String,

    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub cors: CorsConfig,
    pub uploads: UploadConfig,
}

/// Database connection settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Connection string (DATABASE_URL, POSTGRES_URL or DB_CONNECTION_FILE)
    pub url: String,

    /// Maximum pool size (from DATABASE_MAX_CONNECTIONS env var)
    pub max_connections: u32,
}

/// Token signing and lifetime settings
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared HMAC secret (from JWT_SECRET_KEY env var)
    pub secret: String,

    /// Issuer claim (from JWT_ISSUER env var)
    pub issuer: String,

    /// Audience claim (from JWT_AUDIENCE env var)
    pub audience: String,

    /// Signing algorithm (from JWT_ALGORITHM env var)
    pub algorithm: Algorithm,

    /// Access token lifetime in seconds (from ACCESS_TOKEN_EXPIRES_MINUTES env var)
    pub access_token_ttl_secs: i64,

    /// Refresh token lifetime in seconds (from REFRESH_TOKEN_EXPIRES_DAYS env var)
    pub refresh_token_ttl_secs: i64,
}

/// Argon2id cost factors
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    /// Memory cost in KiB (from ARGON2_MEMORY_COST env var)
    pub memory_cost: u32,

    /// Iterations (from ARGON2_TIME_COST env var)
    pub time_cost: u32,

    /// Lanes (from ARGON2_PARALLELISM env var)
    pub parallelism: u32,

    /// Minimum accepted password length in characters
    pub min_length: usize,

    /// Maximum accepted password length in characters
    pub max_length: usize,
}

/// Cross-origin settings
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Allowed origins (from comma-separated ALLOW_ORIGINS env var)
    pub allow_origins: Vec<String>,
}

/// Reserved settings for the photo upload integration
#[derive(Debug, Clone, Default)]
pub struct UploadConfig {
    pub cloudinary_cloud_name: String,
    pub cloudinary_api_key: String,
    pub cloudinary_api_secret: String,
}

impl UploadConfig {
    /// Whether every Cloudinary credential is present
    pub fn is_configured(&self) -> bool {
        !self.cloudinary_cloud_name.is_empty()
            && !self.cloudinary_api_key.is_empty()
            && !self.cloudinary_api_secret.is_empty()
    }
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 65536, // 64 MiB
            time_cost: 3,
            parallelism: 4,
            min_length: 8,
            max_length: 128,
        }
    }
}

impl JwtConfig {
    /// Config with default claims and lifetimes around the given secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: "resident-directory".to_string(),
            audience: "resident-directory-frontend".to_string(),
            algorithm: Algorithm::HS256,
            access_token_ttl_secs: 30 * 60,
            refresh_token_ttl_secs: 30 * 24 * 60 * 60,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        let database_url = match non_blank_var("DATABASE_URL")
            .or_else(|| non_blank_var("POSTGRES_URL"))
        {
            Some(url) => url,
            None => match env::var("DB_CONNECTION_FILE") {
                Ok(path) => read_connection_file(&path)?,
                Err(_) => String::new(),
            },
        };

        let secret = non_blank_var("JWT_SECRET_KEY")
            .or_else(|| non_blank_var("JWT_SECRET"))
            .ok_or_else(|| AppError::Config("JWT_SECRET_KEY must be set".to_string()))?;

        let algorithm = parse_algorithm(
            &env::var("JWT_ALGORITHM").unwrap_or_else(|_| "HS256".to_string()),
        )?;

        let access_token_ttl_secs = ttl_secs(
            "ACCESS_TOKEN_EXPIRES_MINUTES",
            parse_var("ACCESS_TOKEN_EXPIRES_MINUTES", 30)?,
            60,
        )?;
        let refresh_token_ttl_secs = ttl_secs(
            "REFRESH_TOKEN_EXPIRES_DAYS",
            parse_var("REFRESH_TOKEN_EXPIRES_DAYS", 30)?,
            24 * 60 * 60,
        )?;

        let defaults = PasswordConfig::default();

        Ok(Self {
            app_name: env::var("APP_NAME").unwrap_or_else(|_| "Resident Directory API".to_string()),
            app_version: env::var("APP_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".to_string()),
            database: DatabaseConfig {
                url: database_url.trim().to_string(),
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10)?,
            },
            jwt: JwtConfig {
                secret,
                issuer: env::var("JWT_ISSUER")
                    .unwrap_or_else(|_| "resident-directory".to_string()),
                audience: env::var("JWT_AUDIENCE")
                    .unwrap_or_else(|_| "resident-directory-frontend".to_string()),
                algorithm,
                access_token_ttl_secs,
                refresh_token_ttl_secs,
            },
            password: PasswordConfig {
                memory_cost: parse_var("ARGON2_MEMORY_COST", defaults.memory_cost)?,
                time_cost: parse_var("ARGON2_TIME_COST", defaults.time_cost)?,
                parallelism: parse_var("ARGON2_PARALLELISM", defaults.parallelism)?,
                ..defaults
            },
            cors: CorsConfig {
                allow_origins: parse_origins(&env::var("ALLOW_ORIGINS").unwrap_or_default()),
            },
            uploads: UploadConfig {
                cloudinary_cloud_name: env::var("CLOUDINARY_CLOUD_NAME").unwrap_or_default(),
                cloudinary_api_key: env::var("CLOUDINARY_API_KEY").unwrap_or_default(),
                cloudinary_api_secret: env::var("CLOUDINARY_API_SECRET").unwrap_or_default(),
            },
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AppError> {
        if self.jwt.secret.len() < 32 {
            return Err(AppError::Config(
                "JWT_SECRET_KEY must be at least 32 characters".to_string(),
            ));
        }

        if !matches!(
            self.jwt.algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(AppError::Config(
                "JWT_ALGORITHM must be one of HS256, HS384, HS512".to_string(),
            ));
        }

        if self.jwt.access_token_ttl_secs <= 0 {
            return Err(AppError::Config(
                "ACCESS_TOKEN_EXPIRES_MINUTES must be positive".to_string(),
            ));
        }

        if self.jwt.refresh_token_ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(AppError::Config(
                "REFRESH_TOKEN_EXPIRES_DAYS must not exceed 3650".to_string(),
            ));
        }

        if self.jwt.refresh_token_ttl_secs <= self.jwt.access_token_ttl_secs {
            return Err(AppError::Config(
                "Refresh token lifetime must exceed access token lifetime".to_string(),
            ));
        }

        if self.password.min_length < 8 {
            return Err(AppError::Config(
                "Minimum password length must be at least 8".to_string(),
            ));
        }

        if self.cors.allow_origins.is_empty() {
            return Err(AppError::Config("ALLOW_ORIGINS must not be empty".to_string()));
        }

        if self.database.max_connections == 0 {
            return Err(AppError::Config(
                "DATABASE_MAX_CONNECTIONS must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Read a variable, treating an empty or blank value as unset
fn non_blank_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn ttl_secs(name: &str, value: i64, unit_secs: i64) -> Result<i64, AppError> {
    value
        .checked_mul(unit_secs)
        .ok_or_else(|| AppError::Config(format!("{name} is out of range: {value}")))
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{name} has an invalid value: {raw}"))),
        _ => Ok(default),
    }
}

fn parse_algorithm(raw: &str) -> Result<Algorithm, AppError> {
    Algorithm::from_str(raw.trim())
        .map_err(|_| AppError::Config(format!("Unsupported JWT_ALGORITHM: {raw}")))
}

/// Split a comma-separated origin list, falling back to the local frontend
pub fn parse_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect();

    if origins.is_empty() {
        vec![DEFAULT_ORIGIN.to_string()]
    } else {
        origins
    }
}

/// Extract a connection URL from a `psql <url>` line or a bare URL
pub fn parse_connection_line(raw: &str) -> Option<String> {
    let line = raw.trim();
    let url = line.strip_prefix("psql ").unwrap_or(line).trim();
    if url.is_empty() {
        None
    } else {
        Some(url.to_string())
    }
}

fn read_connection_file(path: &str) -> Result<String, AppError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(parse_connection_line(&contents).unwrap_or_default()),
        Err(err) => {
            tracing::warn!(path = %path, "Could not read DB_CONNECTION_FILE: {}", err);
            Ok(String::new())
        }
    }
}
