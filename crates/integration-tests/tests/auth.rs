//! Integration tests for accounts and sessions.
//!
//! Requires a migrated database and the API server running
//! (cargo run -p kirana-api).

#![allow(clippy::unwrap_used)]

use kirana_integration_tests::{TEST_PASSWORD, client, registered_client, unique_email, url};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_health_endpoints() {
    let client = client();

    let resp = client.get(url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");

    let resp = client.get(url("/health/ready")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_register_session_and_logout() {
    let (client, email) = registered_client().await;

    let me: Value = client
        .get(url("/api/auth/me"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["email"], email.as_str());
    assert_eq!(me["role"], "customer");
    assert!(me.get("password_hash").is_none());

    let resp = client.post(url("/api/auth/logout")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = client.get(url("/api/auth/me")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_duplicate_registration_conflicts() {
    let (_client, email) = registered_client().await;

    let resp = client()
        .post(url("/api/auth/register"))
        .json(&json!({"email": email.to_uppercase(), "name": "Again", "password": TEST_PASSWORD}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_short_password_rejected() {
    let resp = client()
        .post(url("/api/auth/register"))
        .json(&json!({"email": unique_email(), "name": "Shopper", "password": "short"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_login_wrong_password() {
    let (_client, email) = registered_client().await;

    let resp = client()
        .post(url("/api/auth/login"))
        .json(&json!({"email": email, "password": "not-the-password"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client()
        .post(url("/api/auth/login"))
        .json(&json!({"email": email, "password": TEST_PASSWORD}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_customer_cannot_reach_admin_routes() {
    let resp = client()
        .get(url("/api/admin/analytics/summary"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let (client, _) = registered_client().await;
    let resp = client
        .get(url("/api/admin/analytics/summary"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}
