//! End-to-end tests for registration, login and bearer authentication.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use revu::config::Config;
use std::sync::Arc;
use tower::ServiceExt;

async fn spawn_app() -> (Arc<revu::api::AppState>, Router) {
    let db_path = std::env::temp_dir().join(format!("revu-auth-test-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    // Keep password hashing fast in tests.
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config.auth.jwt_secret = Some("test-jwt-secret".to_string());
    config.encryption.key = Some("test-master-key".to_string());
    config.encryption.salt = Some("test-salt".to_string());

    let state = revu::api::create_app_state_from_config(config, None)
        .await
        .expect("failed to create app state");

    let router = revu::api::router(state.clone()).await;
    (state, router)
}

async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn get_with_token(app: &Router, uri: &str, token: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn register_login_and_me_flow() {
    let (_, app) = spawn_app().await;

    let (status, body) = post_json(
        &app,
        "/api/auth/register",
        serde_json::json!({
            "email": "Alice@Example.COM",
            "password": "Passw0rd",
            "full_name": "Alice"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], serde_json::json!(true));
    // Email is normalized on registration.
    assert_eq!(body["data"]["email"], serde_json::json!("alice@example.com"));
    assert_eq!(body["data"]["role"], serde_json::json!("free"));
    assert_eq!(body["data"]["has_own_api_key"], serde_json::json!(false));

    let (status, body) = post_json(
        &app,
        "/api/auth/login",
        serde_json::json!({
            "email": "alice@example.com",
            "password": "Passw0rd"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["token_type"], serde_json::json!("bearer"));

    let token = body["data"]["access_token"].as_str().unwrap().to_string();

    let (status, body) = get_with_token(&app, "/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], serde_json::json!("alice@example.com"));
    assert_eq!(body["data"]["full_name"], serde_json::json!("Alice"));
}

#[tokio::test]
async fn registration_with_own_key_gets_custom_role() {
    let (_, app) = spawn_app().await;

    let (status, body) = post_json(
        &app,
        "/api/auth/register",
        serde_json::json!({
            "email": "byok@example.com",
            "password": "Passw0rd",
            "gemini_api_key": "personal-provider-key"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["role"], serde_json::json!("custom"));
    assert_eq!(body["data"]["has_own_api_key"], serde_json::json!(true));
}

#[tokio::test]
async fn weak_passwords_are_rejected_with_specific_reasons() {
    let (_, app) = spawn_app().await;

    let cases = [
        ("Ab1", "at least 8"),
        ("lowercase1", "uppercase"),
        ("UPPERCASE1", "lowercase"),
        ("NoDigitsHere", "digit"),
    ];

    for (password, expected_fragment) in cases {
        let (status, body) = post_json(
            &app,
            "/api/auth/register",
            serde_json::json!({
                "email": "weak@example.com",
                "password": password
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "password: {password}");

        let error = body["error"].as_str().unwrap();
        assert!(
            error.contains(expected_fragment),
            "expected '{expected_fragment}' in '{error}' for password '{password}'"
        );
    }
}

#[tokio::test]
async fn invalid_email_is_rejected() {
    let (_, app) = spawn_app().await;

    let (status, _) = post_json(
        &app,
        "/api/auth/register",
        serde_json::json!({
            "email": "not-an-email",
            "password": "Passw0rd"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let (_, app) = spawn_app().await;

    let payload = serde_json::json!({
        "email": "dup@example.com",
        "password": "Passw0rd"
    });

    let (status, _) = post_json(&app, "/api/auth/register", payload.clone()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = post_json(&app, "/api/auth/register", payload).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_email_and_wrong_password_are_indistinguishable() {
    let (_, app) = spawn_app().await;

    let (status, _) = post_json(
        &app,
        "/api/auth/register",
        serde_json::json!({
            "email": "bob@example.com",
            "password": "Passw0rd"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (unknown_status, unknown_body) = post_json(
        &app,
        "/api/auth/login",
        serde_json::json!({
            "email": "nobody@example.com",
            "password": "Passw0rd"
        }),
    )
    .await;

    let (wrong_status, wrong_body) = post_json(
        &app,
        "/api/auth/login",
        serde_json::json!({
            "email": "bob@example.com",
            "password": "WrongPass1"
        }),
    )
    .await;

    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_body["error"], wrong_body["error"]);
}

#[tokio::test]
async fn deactivated_account_is_forbidden_after_correct_password() {
    let (state, app) = spawn_app().await;

    let (status, _) = post_json(
        &app,
        "/api/auth/register",
        serde_json::json!({
            "email": "inactive@example.com",
            "password": "Passw0rd"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let user = state
        .store()
        .get_user_by_email("inactive@example.com")
        .await
        .unwrap()
        .unwrap();
    state.store().set_user_active(user.id, false).await.unwrap();

    // Correct password reveals the deactivated state.
    let (status, _) = post_json(
        &app,
        "/api/auth/login",
        serde_json::json!({
            "email": "inactive@example.com",
            "password": "Passw0rd"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Wrong password does not.
    let (status, _) = post_json(
        &app,
        "/api/auth/login",
        serde_json::json!({
            "email": "inactive@example.com",
            "password": "WrongPass1"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deactivation_invalidates_outstanding_tokens() {
    let (state, app) = spawn_app().await;

    let (status, _) = post_json(
        &app,
        "/api/auth/register",
        serde_json::json!({
            "email": "revoked@example.com",
            "password": "Passw0rd"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = post_json(
        &app,
        "/api/auth/login",
        serde_json::json!({
            "email": "revoked@example.com",
            "password": "Passw0rd"
        }),
    )
    .await;
    let token = body["data"]["access_token"].as_str().unwrap().to_string();

    let (status, _) = get_with_token(&app, "/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::OK);

    let user = state
        .store()
        .get_user_by_email("revoked@example.com")
        .await
        .unwrap()
        .unwrap();
    state.store().set_user_active(user.id, false).await.unwrap();

    // A token issued before deactivation stops working everywhere.
    let (status, _) = get_with_token(&app, "/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get_with_token(&app, "/api/usage", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_endpoints_reject_missing_and_forged_tokens() {
    let (_, app) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/auth/me").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (status, _) = get_with_token(&app, "/api/auth/me", "not.a.token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A token signed with a different secret is rejected.
    let forged = revu::auth::token::TokenService::new("other-secret", 60)
        .issue(1, "alice@example.com")
        .unwrap();
    let (status, _) = get_with_token(&app, "/api/auth/me", &forged).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn api_key_update_and_removal() {
    let (state, app) = spawn_app().await;

    let (status, _) = post_json(
        &app,
        "/api/auth/register",
        serde_json::json!({
            "email": "keys@example.com",
            "password": "Passw0rd"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = post_json(
        &app,
        "/api/auth/login",
        serde_json::json!({
            "email": "keys@example.com",
            "password": "Passw0rd"
        }),
    )
    .await;
    let token = body["data"]["access_token"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/auth/api-key")
                .header("Authorization", format!("Bearer {token}"))
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "gemini_api_key": "my-new-key" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Stored value is encrypted, never the plaintext.
    let user = state
        .store()
        .get_user_by_email("keys@example.com")
        .await
        .unwrap()
        .unwrap();
    let stored = state
        .store()
        .get_user_gemini_key_encrypted(user.id)
        .await
        .unwrap()
        .unwrap();
    assert_ne!(stored, "my-new-key");
    assert!(revu::crypto::is_probably_encrypted(&stored));

    let (status, body) = get_with_token(&app, "/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["has_own_api_key"], serde_json::json!(true));

    // Clearing the key.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/auth/api-key")
                .header("Authorization", format!("Bearer {token}"))
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "gemini_api_key": null }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (_, body) = get_with_token(&app, "/api/auth/me", &token).await;
    assert_eq!(body["data"]["has_own_api_key"], serde_json::json!(false));
}

#[tokio::test]
async fn health_endpoint_is_public() {
    let (_, app) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["data"]["status"], serde_json::json!("ok"));
    assert_eq!(json["data"]["database"], serde_json::json!("ok"));
}
