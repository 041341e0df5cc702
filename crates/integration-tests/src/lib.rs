//! Integration tests for the Kirana API.
//!
//! The tests talk HTTP to a running server and are ignored by default.
//!
//! # Running Tests
//!
//! ```bash
//! cargo run -p kirana-cli -- migrate
//! cargo run -p kirana-cli -- seed catalog crates/cli/seed/catalog.yaml
//! cargo run -p kirana-api &
//! cargo test -p kirana-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `KIRANA_API_URL` - Server base URL (default `http://localhost:5000`)
//! - `RAZORPAY_WEBHOOK_SECRET` - Must match the server's, for webhook tests

#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use sha2::Sha256;
use uuid::Uuid;

/// Password used for every test account.
pub const TEST_PASSWORD: &str = "kirana-test-pass-42";

/// Base URL for the API (configurable via environment).
#[must_use]
pub fn base_url() -> String {
    std::env::var("KIRANA_API_URL").unwrap_or_else(|_| "http://localhost:5000".to_string())
}

/// Absolute URL for an API path.
#[must_use]
pub fn url(path: &str) -> String {
    format!("{}{path}", base_url())
}

/// A client that keeps the session cookie between requests.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// A unique address on a reserved test domain.
#[must_use]
pub fn unique_email() -> String {
    format!("test-{}@example.com", Uuid::new_v4().simple())
}

/// Register a fresh account and return its logged-in client and email.
pub async fn registered_client() -> (Client, String) {
    let client = client();
    let email = unique_email();
    let resp = client
        .post(url("/api/auth/register"))
        .json(&json!({
            "email": email,
            "name": "Test Shopper",
            "password": TEST_PASSWORD,
        }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), StatusCode::CREATED);
    (client, email)
}

/// Save a delivery address for the logged-in client and return its id.
pub async fn create_address(client: &Client) -> i64 {
    let resp = client
        .post(url("/api/addresses"))
        .json(&json!({
            "full_name": "Test Shopper",
            "phone": "9876543210",
            "line1": "12 MG Road",
            "city": "Bengaluru",
            "state": "Karnataka",
            "postal_code": "560001",
            "is_default": true,
        }))
        .send()
        .await
        .expect("Failed to create address");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.expect("Invalid address JSON");
    body["id"].as_i64().expect("Address id missing")
}

/// In-stock products from the first catalog page.
pub async fn in_stock_products(client: &Client) -> Vec<Value> {
    let body: Value = client
        .get(url("/api/products?per_page=50"))
        .send()
        .await
        .expect("Failed to list products")
        .json()
        .await
        .expect("Invalid product list JSON");
    body["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter(|p| p["in_stock"].as_bool() == Some(true))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// The first in-stock product in the catalog, if any.
pub async fn first_in_stock_product(client: &Client) -> Option<Value> {
    in_stock_products(client).await.into_iter().next()
}

/// Hex HMAC-SHA256 of `body` with the webhook secret.
#[must_use]
pub fn webhook_signature(secret: &str, body: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_signature_is_hex_sha256() {
        let sig = webhook_signature("secret", b"{}");
        assert_eq!(sig.len(), 64);
        assert!(sig.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_eq!(sig, webhook_signature("secret", b"{}"));
        assert_ne!(sig, webhook_signature("other", b"{}"));
    }
}
