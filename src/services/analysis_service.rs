//! Domain service for code analysis requests.

use serde::Serialize;
use thiserror::Error;

use crate::db::User;
use crate::services::quota::QuotaStatus;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Code must not be empty")]
    EmptyCode,

    #[error("Code exceeds the maximum length of {0} characters")]
    CodeTooLong(usize),

    #[error("Daily analysis quota exhausted")]
    QuotaExceeded,

    #[error("Analysis provider error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AnalysisError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AnalysisError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A completed analysis, ready for the response layer.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub id: i32,
    pub analysis: String,
    /// Best-effort extractions; absent when the model ignored the format.
    pub quality_score: Option<i32>,
    pub improved_code: Option<String>,
    pub model_used: String,
    /// Standing after this analysis was recorded. Absent for anonymous calls.
    pub quota: Option<QuotaStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageStats {
    pub total_analyses: u64,
    pub used_today: u32,
    pub average_quality_score: Option<f64>,
}

/// Domain service trait for running and accounting analyses.
#[async_trait::async_trait]
pub trait AnalysisService: Send + Sync {
    /// Runs an analysis.
    ///
    /// Authenticated users are quota-checked before the provider call and
    /// accounted after the result is persisted. Anonymous requests use the
    /// shared provider key and are never accounted.
    async fn analyze(
        &self,
        user: Option<&User>,
        code: &str,
    ) -> Result<AnalysisOutcome, AnalysisError>;

    /// Current quota standing for a user.
    async fn quota_status(&self, user: &User) -> Result<QuotaStatus, AnalysisError>;

    /// Lifetime statistics for a user.
    async fn usage_stats(&self, user: &User) -> Result<UsageStats, AnalysisError>;
}
