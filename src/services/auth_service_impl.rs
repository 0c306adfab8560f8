//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::task;

use crate::auth::password;
use crate::auth::token::TokenService;
use crate::config::SecurityConfig;
use crate::crypto::SecretCipher;
use crate::db::repositories::role::{BYO_KEY_ROLE, DEFAULT_ROLE};
use crate::db::{NewUser, Store, User};
use crate::services::auth_service::{
    AuthError, AuthService, LoginResult, RegisterRequest, UserSummary,
};

pub struct SeaOrmAuthService {
    store: Store,
    tokens: Arc<TokenService>,
    cipher: Arc<SecretCipher>,
    security: SecurityConfig,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(
        store: Store,
        tokens: Arc<TokenService>,
        cipher: Arc<SecretCipher>,
        security: SecurityConfig,
    ) -> Self {
        Self {
            store,
            tokens,
            cipher,
            security,
        }
    }

    async fn role_name_for(&self, user: &User) -> Result<String, AuthError> {
        let role = match user.role_id {
            Some(id) => self.store.get_role_by_id(id).await?,
            None => None,
        };

        Ok(role.map_or_else(|| DEFAULT_ROLE.to_string(), |r| r.name))
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn register(&self, request: RegisterRequest) -> Result<UserSummary, AuthError> {
        let email = request.email.trim().to_lowercase();

        if !password::validate_email(&email) {
            return Err(AuthError::Validation("Invalid email address".to_string()));
        }
        password::validate_password(&request.password)
            .map_err(|e| AuthError::Validation(e.to_string()))?;

        if self.store.get_user_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        // Hashing is CPU-bound; keep it off the async workers.
        let plain = request.password;
        let security = self.security.clone();
        let password_hash = task::spawn_blocking(move || password::hash_password(&plain, &security))
            .await
            .map_err(|e| AuthError::Internal(format!("Hashing task panicked: {e}")))??;

        let personal_key = request
            .gemini_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty());

        let gemini_api_key_encrypted = match personal_key {
            Some(key) => Some(
                self.cipher
                    .encrypt(key)
                    .map_err(|e| AuthError::Internal(e.to_string()))?,
            ),
            None => None,
        };

        // Accounts with their own key skip the shared daily allowance.
        let role_name = if personal_key.is_some() {
            BYO_KEY_ROLE
        } else {
            DEFAULT_ROLE
        };
        let role = self
            .store
            .get_role_by_name(role_name)
            .await?
            .ok_or_else(|| AuthError::Internal(format!("Role '{role_name}' is not seeded")))?;

        let user = self
            .store
            .create_user(NewUser {
                email,
                password_hash,
                full_name: request.full_name,
                gemini_api_key_encrypted,
                role_id: Some(role.id),
            })
            .await?;

        tracing::info!(user_id = user.id, role = %role.name, "Account registered");

        Ok(UserSummary {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role: role.name,
            has_own_api_key: user.has_gemini_api_key,
        })
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = email.trim().to_lowercase();

        let Some(user) = self.store.get_user_by_email(&email).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        let is_valid = self.store.verify_user_password(&email, password).await?;
        if !is_valid {
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AuthError::Inactive);
        }

        Ok(user)
    }

    async fn login(&self, email: &str, password: &str) -> Result<LoginResult, AuthError> {
        let user = self.authenticate(email, password).await?;

        let access_token = self
            .tokens
            .issue(user.id, &user.email)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let summary = self.summarize(&user).await?;

        Ok(LoginResult {
            access_token,
            token_type: "bearer".to_string(),
            user: summary,
        })
    }

    async fn decode_and_load_user(&self, token: &str) -> Result<Option<User>, AuthError> {
        let Some(claims) = self.tokens.verify(token) else {
            return Ok(None);
        };

        let Ok(user_id) = claims.sub.parse::<i32>() else {
            return Ok(None);
        };

        // Tokens cannot be revoked, so deactivation is enforced here: a
        // deactivated account's token stops resolving to a user.
        Ok(self
            .store
            .get_user_by_id(user_id)
            .await?
            .filter(|user| user.is_active))
    }

    async fn update_gemini_key(
        &self,
        user_id: i32,
        plaintext_key: Option<&str>,
    ) -> Result<(), AuthError> {
        let encrypted = match plaintext_key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => Some(
                self.cipher
                    .encrypt(key)
                    .map_err(|e| AuthError::Internal(e.to_string()))?,
            ),
            None => None,
        };

        self.store.update_user_gemini_key(user_id, encrypted).await?;
        tracing::info!(user_id, "Gemini API key updated");

        Ok(())
    }

    async fn summarize(&self, user: &User) -> Result<UserSummary, AuthError> {
        Ok(UserSummary {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: self.role_name_for(user).await?,
            has_own_api_key: user.has_gemini_api_key,
        })
    }
}
