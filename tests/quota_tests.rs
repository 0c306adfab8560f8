//! Tests for daily usage accounting and quota enforcement.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use revu::config::Config;
use revu::db::{NewUser, Store};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};
use std::sync::Arc;
use tower::ServiceExt;

fn temp_db_url(prefix: &str) -> String {
    let path = std::env::temp_dir().join(format!("{prefix}-{}.db", uuid::Uuid::new_v4()));
    format!("sqlite:{}", path.display())
}

async fn spawn_store() -> Store {
    Store::new(&temp_db_url("revu-quota-store"))
        .await
        .expect("failed to open store")
}

async fn seed_user(store: &Store, email: &str) -> i32 {
    let role = store
        .get_role_by_name("free")
        .await
        .unwrap()
        .expect("free role should be seeded");

    let user = store
        .create_user(NewUser {
            email: email.to_string(),
            password_hash: "unused-hash".to_string(),
            full_name: None,
            gemini_api_key_encrypted: None,
            role_id: Some(role.id),
        })
        .await
        .unwrap();

    user.id
}

#[tokio::test]
async fn record_usage_increments_both_counters() {
    let store = spawn_store().await;
    let user_id = seed_user(&store, "counter@example.com").await;

    store.record_user_usage(user_id).await.unwrap();
    store.record_user_usage(user_id).await.unwrap();
    store.record_user_usage(user_id).await.unwrap();

    let user = store.get_user_by_id(user_id).await.unwrap().unwrap();
    assert_eq!(user.analyses_today, 3);
    assert_eq!(user.total_analyses, 3);
    assert!(user.last_analysis_date.is_some());
}

#[tokio::test]
async fn daily_counter_resets_across_utc_midnight() {
    let store = spawn_store().await;
    let user_id = seed_user(&store, "rollover@example.com").await;

    store.record_user_usage(user_id).await.unwrap();
    store.record_user_usage(user_id).await.unwrap();

    // Backdate the last analysis to yesterday.
    let yesterday = (Utc::now() - Duration::days(1)).to_rfc3339();
    let model = revu::entities::users::Entity::find_by_id(user_id)
        .one(&store.conn)
        .await
        .unwrap()
        .unwrap();
    let mut active: revu::entities::users::ActiveModel = model.into();
    active.last_analysis_date = Set(Some(yesterday));
    active.update(&store.conn).await.unwrap();

    // A stale counter reads as zero before the next recorded analysis.
    let user = store.get_user_by_id(user_id).await.unwrap().unwrap();
    let status = revu::services::quota::status(
        user.analyses_today,
        user.last_analysis_date.as_deref(),
        5,
    );
    assert_eq!(status.used_today, 0);
    assert_eq!(status.remaining, 5);

    // The next analysis starts a fresh day at 1, not 3.
    store.record_user_usage(user_id).await.unwrap();
    let user = store.get_user_by_id(user_id).await.unwrap().unwrap();
    assert_eq!(user.analyses_today, 1);
    assert_eq!(user.total_analyses, 3);
}

#[tokio::test]
async fn concurrent_usage_recording_loses_no_updates() {
    let store = spawn_store().await;
    let user_id = seed_user(&store, "concurrent@example.com").await;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.record_user_usage(user_id).await })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let user = store.get_user_by_id(user_id).await.unwrap().unwrap();
    assert_eq!(user.analyses_today, 8);
    assert_eq!(user.total_analyses, 8);
}

async fn spawn_app() -> (Arc<revu::api::AppState>, Router) {
    let mut config = Config::default();
    config.general.database_path = temp_db_url("revu-quota-app");
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config.auth.jwt_secret = Some("test-jwt-secret".to_string());
    config.encryption.key = Some("test-master-key".to_string());
    config.encryption.salt = Some("test-salt".to_string());
    // Shared provider key so quota, not key resolution, decides the outcome.
    config.gemini.api_key = Some("shared-test-key".to_string());
    config.gemini.max_code_length = 200;

    let state = revu::api::create_app_state_from_config(config, None)
        .await
        .expect("failed to create app state");

    let router = revu::api::router(state.clone()).await;
    (state, router)
}

async fn register_and_login(app: &Router, email: &str) -> String {
    let register = Request::builder()
        .method("POST")
        .uri("/api/auth/register")
        .header("Content-Type", "application/json")
        .body(Body::from(
            serde_json::json!({ "email": email, "password": "Passw0rd" }).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(register).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let login = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header("Content-Type", "application/json")
        .body(Body::from(
            serde_json::json!({ "email": email, "password": "Passw0rd" }).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(login).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    json["data"]["access_token"].as_str().unwrap().to_string()
}

async fn post_analyze(app: &Router, token: Option<&str>, code: &str) -> StatusCode {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/analyze")
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }

    let request = builder
        .body(Body::from(serde_json::json!({ "code": code }).to_string()))
        .unwrap();

    app.clone().oneshot(request).await.unwrap().status()
}

#[tokio::test]
async fn analyze_rejects_empty_and_oversized_code() {
    let (_, app) = spawn_app().await;

    // Validation runs before quota checks and before any provider call.
    let status = post_analyze(&app, None, "   ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let oversized = "x".repeat(201);
    let status = post_analyze(&app, None, &oversized).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn exhausted_quota_returns_429_before_provider_call() {
    let (state, app) = spawn_app().await;

    let token = register_and_login(&app, "quota@example.com").await;

    let user = state
        .store()
        .get_user_by_email("quota@example.com")
        .await
        .unwrap()
        .unwrap();

    // The free role allows 5 analyses per day. Burn them directly.
    for _ in 0..5 {
        state.store().record_user_usage(user.id).await.unwrap();
    }

    // Quota is checked before the provider is contacted, so this fails fast
    // with 429 even though no provider is reachable in tests.
    let status = post_analyze(&app, Some(&token), "fn main() {}").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn usage_endpoint_reports_standing() {
    let (state, app) = spawn_app().await;

    let token = register_and_login(&app, "standing@example.com").await;

    let user = state
        .store()
        .get_user_by_email("standing@example.com")
        .await
        .unwrap()
        .unwrap();
    state.store().record_user_usage(user.id).await.unwrap();
    state.store().record_user_usage(user.id).await.unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/usage")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["data"]["used_today"], serde_json::json!(2));
    assert_eq!(json["data"]["limit"], serde_json::json!(5));
    assert_eq!(json["data"]["remaining"], serde_json::json!(3));
    assert_eq!(json["data"]["unlimited"], serde_json::json!(false));
}

#[tokio::test]
async fn usage_endpoint_requires_authentication() {
    let (_, app) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/usage").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
