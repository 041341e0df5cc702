//! HTTP middleware stack for the API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (new hub per request, HTTP transaction)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers and `Cache-Control: no-store`
//! 5. CORS for the storefront origin, with credentials
//! 6. Session layer (tower-sessions with `PostgreSQL` store)
//! 7. Rate limiting (governor), per route group

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    RequireAdmin, RequireUser, clear_current_user, is_active_admin, set_current_user,
};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter, payment_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::{no_store_layer, security_headers_middleware};
pub use session::create_session_layer;
