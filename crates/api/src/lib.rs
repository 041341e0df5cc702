//! Kirana API library.
//!
//! The storefront and admin REST API as a library, so the router can be
//! assembled by the binary and exercised in tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::request_id::REQUEST_ID_HEADER;
use crate::state::AppState;

/// CORS for the storefront origin. Credentials are allowed so the session
/// cookie travels with cross-origin requests.
///
/// # Errors
///
/// Returns an error if the configured origin is not a valid header value.
pub fn cors_layer(state: &AppState) -> Result<CorsLayer, header::InvalidHeaderValue> {
    let origin = HeaderValue::from_str(&state.config().frontend_origin())?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)]))
}

/// Build the application router with its middleware stack.
///
/// Sentry layers are added by the binary, outside this stack.
///
/// # Errors
///
/// Returns an error if the CORS origin cannot be built.
pub fn app(state: AppState) -> Result<Router, header::InvalidHeaderValue> {
    let session_layer = middleware::create_session_layer(state.pool(), state.config());
    let cors = cors_layer(&state)?;

    Ok(routes::routes()
        .layer(session_layer)
        .layer(cors)
        .layer(axum::middleware::from_fn(middleware::security_headers_middleware))
        .layer(middleware::no_store_layer())
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<axum::body::Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            },
        ))
        .with_state(state))
}
