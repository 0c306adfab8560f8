use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::analysis::NewAnalysis;
pub use repositories::role::Role;
pub use repositories::user::{NewUser, User};

use crate::entities::analyses;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.starts_with(":memory:") && !db_url.contains("memory") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn role_repo(&self) -> repositories::role::RoleRepository {
        repositories::role::RoleRepository::new(self.conn.clone())
    }

    #[must_use]
    pub fn analysis_repo(&self) -> repositories::analysis::AnalysisRepository {
        repositories::analysis::AnalysisRepository::new(self.conn.clone())
    }

    // ========== User Repository Methods ==========

    pub async fn create_user(&self, new_user: NewUser) -> Result<User> {
        self.user_repo().create(new_user).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn get_user_by_id(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn verify_user_password(&self, email: &str, password: &str) -> Result<bool> {
        self.user_repo().verify_password(email, password).await
    }

    pub async fn get_user_gemini_key_encrypted(&self, id: i32) -> Result<Option<String>> {
        self.user_repo().get_gemini_key_encrypted(id).await
    }

    pub async fn update_user_gemini_key(&self, id: i32, encrypted: Option<String>) -> Result<()> {
        self.user_repo().update_gemini_key(id, encrypted).await
    }

    pub async fn set_user_active(&self, id: i32, is_active: bool) -> Result<()> {
        self.user_repo().set_active(id, is_active).await
    }

    pub async fn record_user_usage(&self, id: i32) -> Result<()> {
        self.user_repo().record_usage(id).await
    }

    // ========== Role Repository Methods ==========

    pub async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        self.role_repo().get_by_name(name).await
    }

    pub async fn get_role_by_id(&self, id: i32) -> Result<Option<Role>> {
        self.role_repo().get_by_id(id).await
    }

    // ========== Analysis Repository Methods ==========

    pub async fn insert_analysis(&self, analysis: NewAnalysis) -> Result<analyses::Model> {
        self.analysis_repo().insert(analysis).await
    }

    pub async fn count_analyses_for_user(&self, user_id: i32) -> Result<u64> {
        self.analysis_repo().count_for_user(user_id).await
    }

    pub async fn average_score_for_user(&self, user_id: i32) -> Result<Option<f64>> {
        self.analysis_repo().average_score_for_user(user_id).await
    }
}
