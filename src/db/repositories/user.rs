use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, Statement,
};
use tokio::task;

use crate::auth::password;
use crate::entities::users;

/// Transient SQLite write contention gets a bounded retry.
const USAGE_UPDATE_ATTEMPTS: u32 = 3;

/// User data returned from the repository (without the password hash or the
/// encrypted API key material).
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub full_name: Option<String>,
    pub role_id: Option<i32>,
    pub is_active: bool,
    pub is_verified: bool,
    pub has_gemini_api_key: bool,
    pub analyses_today: i32,
    pub total_analyses: i32,
    pub last_analysis_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            full_name: model.full_name,
            role_id: model.role_id,
            is_active: model.is_active,
            is_verified: model.is_verified,
            has_gemini_api_key: model
                .gemini_api_key_encrypted
                .as_deref()
                .is_some_and(|k| !k.is_empty()),
            analyses_today: model.analyses_today,
            total_analyses: model.total_analyses,
            last_analysis_date: model.last_analysis_date,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Insert payload for a new account. The password is already hashed and the
/// API key already encrypted by the caller.
#[derive(Debug)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub gemini_api_key_encrypted: Option<String>,
    pub role_id: Option<i32>,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, new_user: NewUser) -> Result<User> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = users::ActiveModel {
            email: Set(new_user.email),
            password_hash: Set(new_user.password_hash),
            full_name: Set(new_user.full_name),
            gemini_api_key_encrypted: Set(new_user.gemini_api_key_encrypted),
            role_id: Set(new_user.role_id),
            is_active: Set(true),
            is_verified: Set(false),
            analyses_today: Set(0),
            total_analyses: Set(0),
            last_analysis_date: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert user")?;

        Ok(User::from(model))
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    /// Verify a password for the account with this email.
    /// Note: This uses `spawn_blocking` because Argon2 verification is
    /// CPU-intensive and would block the async runtime if run directly.
    /// Unknown emails verify as `false`.
    pub async fn verify_password(&self, email: &str, password: &str) -> Result<bool> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?;

        let Some(user) = user else {
            return Ok(false);
        };

        let password_hash = user.password_hash;
        let password = password.to_string();

        let is_valid =
            task::spawn_blocking(move || password::verify_password(&password, &password_hash))
                .await
                .context("Password verification task panicked")?;

        Ok(is_valid)
    }

    /// Fetch the stored ciphertext token for a user's own API key.
    pub async fn get_gemini_key_encrypted(&self, id: i32) -> Result<Option<String>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for API key")?;

        Ok(user.and_then(|u| u.gemini_api_key_encrypted))
    }

    /// Replace or clear the stored ciphertext token.
    pub async fn update_gemini_key(&self, id: i32, encrypted: Option<String>) -> Result<()> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for API key update")?
            .ok_or_else(|| anyhow::anyhow!("User not found: {id}"))?;

        let mut active: users::ActiveModel = user.into();
        active.gemini_api_key_encrypted = Set(encrypted);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(&self.conn).await?;

        Ok(())
    }

    pub async fn set_active(&self, id: i32, is_active: bool) -> Result<()> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for activation update")?
            .ok_or_else(|| anyhow::anyhow!("User not found: {id}"))?;

        let mut active: users::ActiveModel = user.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(&self.conn).await?;

        Ok(())
    }

    /// Record one completed analysis for a user.
    ///
    /// The day rollover and both increments happen inside a single UPDATE so
    /// concurrent calls serialize on the database writer and none are lost.
    /// RFC3339 UTC strings compare lexicographically, which is what makes the
    /// `>= midnight` comparison in SQL correct.
    pub async fn record_usage(&self, id: i32) -> Result<()> {
        let now = chrono::Utc::now();
        let midnight = format!("{}T00:00:00+00:00", now.date_naive());
        let now = now.to_rfc3339();

        let backend = self.conn.get_database_backend();
        let stmt = Statement::from_sql_and_values(
            backend,
            r"UPDATE users SET
                analyses_today = CASE
                    WHEN last_analysis_date IS NOT NULL AND last_analysis_date >= ?
                    THEN analyses_today + 1
                    ELSE 1
                END,
                total_analyses = total_analyses + 1,
                last_analysis_date = ?,
                updated_at = ?
              WHERE id = ?",
            [midnight.into(), now.clone().into(), now.into(), id.into()],
        );

        let mut last_err = None;
        for attempt in 1..=USAGE_UPDATE_ATTEMPTS {
            match self.conn.execute(stmt.clone()).await {
                Ok(result) => {
                    if result.rows_affected() == 0 {
                        anyhow::bail!("User not found: {id}");
                    }
                    return Ok(());
                }
                Err(e) if is_transient(&e) && attempt < USAGE_UPDATE_ATTEMPTS => {
                    tracing::warn!("Usage update contended (attempt {attempt}): {e}");
                    tokio::time::sleep(std::time::Duration::from_millis(20 * u64::from(attempt)))
                        .await;
                    last_err = Some(e);
                }
                Err(e) => return Err(e).context("Failed to record usage"),
            }
        }

        Err(anyhow::anyhow!(
            "Failed to record usage after {USAGE_UPDATE_ATTEMPTS} attempts: {last_err:?}"
        ))
    }
}

fn is_transient(err: &sea_orm::DbErr) -> bool {
    let msg = err.to_string();
    msg.contains("database is locked") || msg.contains("database table is locked")
}
