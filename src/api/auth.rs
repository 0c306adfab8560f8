use axum::{
    Extension, Json,
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::types::{LoginRequest, MessageResponse, UpdateApiKeyRequest};
use super::{ApiError, ApiResponse, AppState};
use crate::db::User;
use crate::services::{LoginResult, RegisterRequest, UserSummary};

/// The authenticated account for the current request, inserted by
/// [`auth_middleware`] when a valid bearer token is present.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

// ============================================================================
// Middleware
// ============================================================================

/// Best-effort bearer authentication.
///
/// A valid token attaches [`CurrentUser`] to the request; anything else
/// (missing header, expired or forged token, deleted account) lets the
/// request through anonymously. Handlers that require an account check for
/// the extension themselves.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(token) = extract_bearer_token(&headers) {
        let user = state
            .shared()
            .auth_service
            .decode_and_load_user(&token)
            .await?;

        if let Some(user) = user {
            tracing::Span::current().record("user_id", user.id);
            request.extensions_mut().insert(CurrentUser(user));
        }
    }

    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers.get("Authorization")?;
    let auth_str = auth_header.to_str().ok()?;
    let token = auth_str.strip_prefix("Bearer ")?;
    Some(token.trim().to_string())
}

/// Unwraps the request's account or rejects with 401.
pub fn require_user(user: Option<Extension<CurrentUser>>) -> Result<User, ApiError> {
    user.map(|Extension(CurrentUser(user))| user)
        .ok_or_else(ApiError::unauthorized)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/register
/// Create an account, optionally with a personal Gemini API key.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state.shared().auth_service.register(payload).await?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(ApiResponse::success(summary)),
    ))
}

/// POST /auth/login
/// Exchange credentials for a bearer token.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResult>>, ApiError> {
    if payload.email.is_empty() {
        return Err(ApiError::validation("Email is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let result = state
        .shared()
        .auth_service
        .login(&payload.email, &payload.password)
        .await?;

    Ok(Json(ApiResponse::success(result)))
}

/// POST /auth/logout
///
/// Tokens are not revocable; the client discards its copy. The endpoint
/// exists so clients have a uniform logout call.
pub async fn logout() -> Json<ApiResponse<MessageResponse>> {
    Json(ApiResponse::success(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

/// GET /auth/me
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    user: Option<Extension<CurrentUser>>,
) -> Result<Json<ApiResponse<UserSummary>>, ApiError> {
    let user = require_user(user)?;
    let summary = state.shared().auth_service.summarize(&user).await?;

    Ok(Json(ApiResponse::success(summary)))
}

/// PUT /auth/api-key
/// Store a new personal Gemini key, or clear it with a null/empty value.
pub async fn update_api_key(
    State(state): State<Arc<AppState>>,
    user: Option<Extension<CurrentUser>>,
    Json(payload): Json<UpdateApiKeyRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let user = require_user(user)?;

    state
        .shared()
        .auth_service
        .update_gemini_key(user.id, payload.gemini_api_key.as_deref())
        .await?;

    let message = if payload
        .gemini_api_key
        .as_deref()
        .is_some_and(|k| !k.trim().is_empty())
    {
        "API key updated"
    } else {
        "API key removed"
    };

    Ok(Json(ApiResponse::success(MessageResponse {
        message: message.to_string(),
    })))
}
