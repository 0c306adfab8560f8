use axum::{Extension, Json, extract::State};
use std::sync::Arc;

use super::auth::{CurrentUser, require_user};
use super::types::{AnalysisDto, AnalyzeRequest};
use super::{ApiError, ApiResponse, AppState};
use crate::services::{UsageStats, quota::QuotaStatus};

/// POST /analyze
///
/// Works with or without an account. Authenticated requests are quota
/// checked and recorded; anonymous ones run on the shared provider key.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    user: Option<Extension<CurrentUser>>,
    Json(payload): Json<AnalyzeRequest>,
) -> Result<Json<ApiResponse<AnalysisDto>>, ApiError> {
    let user = user.map(|Extension(CurrentUser(user))| user);

    let outcome = state
        .shared()
        .analysis_service
        .analyze(user.as_ref(), &payload.code)
        .await?;

    Ok(Json(ApiResponse::success(AnalysisDto {
        id: outcome.id,
        analysis: outcome.analysis,
        quality_score: outcome.quality_score,
        improved_code: outcome.improved_code,
        model_used: outcome.model_used,
        quota: outcome.quota,
    })))
}

/// GET /usage
/// Current quota standing for the authenticated account.
pub async fn get_usage(
    State(state): State<Arc<AppState>>,
    user: Option<Extension<CurrentUser>>,
) -> Result<Json<ApiResponse<QuotaStatus>>, ApiError> {
    let user = require_user(user)?;

    let status = state.shared().analysis_service.quota_status(&user).await?;

    Ok(Json(ApiResponse::success(status)))
}

/// GET /stats
/// Lifetime analysis statistics for the authenticated account.
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    user: Option<Extension<CurrentUser>>,
) -> Result<Json<ApiResponse<UsageStats>>, ApiError> {
    let user = require_user(user)?;

    let stats = state.shared().analysis_service.usage_stats(&user).await?;

    Ok(Json(ApiResponse::success(stats)))
}
