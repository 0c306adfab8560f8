//! Domain service for accounts and authentication.
//!
//! Handles registration, credential checks, token issuance and API key
//! management.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::User;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email and wrong password both surface this variant so a
    /// caller cannot probe which addresses have accounts.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is deactivated")]
    Inactive,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    /// Optional personal Gemini key; stored encrypted, never returned.
    pub gemini_api_key: Option<String>,
}

/// Public view of an account, safe to serialize into responses.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: i32,
    pub email: String,
    pub full_name: Option<String>,
    pub role: String,
    pub has_own_api_key: bool,
}

/// Login result containing the bearer token and the account summary.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub access_token: String,
    pub token_type: String,
    pub user: UserSummary,
}

/// Domain service trait for accounts and authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Creates an account.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] for a malformed email or a password
    /// that fails policy (with the specific reason), and
    /// [`AuthError::EmailTaken`] for a duplicate address.
    async fn register(&self, request: RegisterRequest) -> Result<UserSummary, AuthError>;

    /// Verifies credentials and returns the account.
    ///
    /// Checks run in a fixed order: lookup, then password, then active flag.
    /// Only a correct password ever reveals that an account is deactivated.
    async fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthError>;

    /// Authenticates and issues an access token.
    async fn login(&self, email: &str, password: &str) -> Result<LoginResult, AuthError>;

    /// Resolves a bearer token to its account.
    ///
    /// `None` for a missing, expired or forged token, or when the account no
    /// longer exists. Anonymous is a valid outcome, not an error.
    async fn decode_and_load_user(&self, token: &str) -> Result<Option<User>, AuthError>;

    /// Stores a new personal Gemini key (encrypted) or clears it with `None`.
    async fn update_gemini_key(
        &self,
        user_id: i32,
        plaintext_key: Option<&str>,
    ) -> Result<(), AuthError>;

    /// Public summary for an account, with the role resolved by name.
    async fn summarize(&self, user: &User) -> Result<UserSummary, AuthError>;
}
