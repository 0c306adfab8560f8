//! `SeaORM` implementation of the `AnalysisService` trait.

use async_trait::async_trait;
use std::sync::Arc;

use crate::clients::gemini::GeminiClient;
use crate::config::GeminiConfig;
use crate::crypto::{CipherError, SecretCipher};
use crate::db::repositories::role::DEFAULT_ROLE;
use crate::db::{NewAnalysis, Store, User};
use crate::parser;
use crate::services::analysis_service::{
    AnalysisError, AnalysisOutcome, AnalysisService, UsageStats,
};
use crate::services::quota::{QuotaLedger, QuotaStatus};

pub struct SeaOrmAnalysisService {
    store: Store,
    gemini: Arc<GeminiClient>,
    cipher: Arc<SecretCipher>,
    ledger: QuotaLedger,
    default_api_key: Option<String>,
    max_code_length: usize,
}

impl SeaOrmAnalysisService {
    #[must_use]
    pub fn new(
        store: Store,
        gemini: Arc<GeminiClient>,
        cipher: Arc<SecretCipher>,
        config: &GeminiConfig,
    ) -> Self {
        let ledger = QuotaLedger::new(store.clone());
        Self {
            store,
            gemini,
            cipher,
            ledger,
            default_api_key: config.api_key.clone(),
            max_code_length: config.max_code_length,
        }
    }

    fn validate_code(&self, code: &str) -> Result<(), AnalysisError> {
        if code.trim().is_empty() {
            return Err(AnalysisError::EmptyCode);
        }
        if code.chars().count() > self.max_code_length {
            return Err(AnalysisError::CodeTooLong(self.max_code_length));
        }
        Ok(())
    }

    async fn daily_limit_for(&self, user: &User) -> Result<i32, AnalysisError> {
        let role = match user.role_id {
            Some(id) => self.store.get_role_by_id(id).await?,
            None => None,
        };

        match role {
            Some(role) => Ok(role.max_analyses_per_day),
            None => {
                let fallback = self
                    .store
                    .get_role_by_name(DEFAULT_ROLE)
                    .await?
                    .ok_or_else(|| {
                        AnalysisError::Internal(format!("Role '{DEFAULT_ROLE}' is not seeded"))
                    })?;
                Ok(fallback.max_analyses_per_day)
            }
        }
    }

    /// Pick the provider key: the user's own when present and decryptable,
    /// otherwise the shared one. A token that no longer authenticates (for
    /// example after a master key rotation) falls back instead of failing
    /// the request.
    async fn resolve_api_key(&self, user: Option<&User>) -> Result<String, AnalysisError> {
        if let Some(user) = user
            && let Some(encrypted) = self.store.get_user_gemini_key_encrypted(user.id).await?
            && !encrypted.is_empty()
        {
            match self.cipher.decrypt(&encrypted) {
                Ok(key) if !key.is_empty() => return Ok(key),
                Ok(_) => {}
                Err(CipherError::InvalidToken) => {
                    tracing::warn!(
                        user_id = user.id,
                        "Stored API key failed to decrypt, using shared key"
                    );
                }
                Err(e) => return Err(AnalysisError::Internal(e.to_string())),
            }
        }

        self.default_api_key.clone().ok_or_else(|| {
            AnalysisError::Upstream("No Gemini API key configured".to_string())
        })
    }
}

#[async_trait]
impl AnalysisService for SeaOrmAnalysisService {
    async fn analyze(
        &self,
        user: Option<&User>,
        code: &str,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        self.validate_code(code)?;

        if let Some(user) = user {
            let limit = self.daily_limit_for(user).await?;
            let standing = self.ledger.status_for(user, limit);
            if !standing.unlimited && standing.remaining == 0 {
                return Err(AnalysisError::QuotaExceeded);
            }
        }

        let api_key = self.resolve_api_key(user).await?;

        let analysis = self
            .gemini
            .analyze_code(code, &api_key)
            .await
            .map_err(|e| AnalysisError::Upstream(e.to_string()))?;

        let quality_score = parser::extract_quality_score(&analysis);
        let improved_code = parser::extract_improved_code(&analysis);

        let row = self
            .store
            .insert_analysis(NewAnalysis {
                user_id: user.map(|u| u.id),
                code_original: code.to_string(),
                code_improved: improved_code.clone(),
                analysis_result: analysis.clone(),
                quality_score,
                model_used: self.gemini.model().to_string(),
            })
            .await?;

        // Accounting happens only after the analysis is persisted; a failed
        // request never burns quota.
        let quota = match user {
            Some(user) => {
                self.ledger.record_usage(user.id).await?;
                let refreshed = self
                    .store
                    .get_user_by_id(user.id)
                    .await?
                    .unwrap_or_else(|| user.clone());
                let limit = self.daily_limit_for(&refreshed).await?;
                Some(self.ledger.status_for(&refreshed, limit))
            }
            None => None,
        };

        Ok(AnalysisOutcome {
            id: row.id,
            analysis,
            quality_score,
            improved_code,
            model_used: row.model_used,
            quota,
        })
    }

    async fn quota_status(&self, user: &User) -> Result<QuotaStatus, AnalysisError> {
        let limit = self.daily_limit_for(user).await?;
        Ok(self.ledger.status_for(user, limit))
    }

    async fn usage_stats(&self, user: &User) -> Result<UsageStats, AnalysisError> {
        let total_analyses = self.store.count_analyses_for_user(user.id).await?;
        let average_quality_score = self.store.average_score_for_user(user.id).await?;
        let quota = self.quota_status(user).await?;

        Ok(UsageStats {
            total_analyses,
            used_today: quota.used_today,
            average_quality_score,
        })
    }
}
