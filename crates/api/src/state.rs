//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::services::{CatalogCache, CloudinaryClient, EmailService, GoogleClient, RazorpayClient};

/// Timeout for calls to Razorpay, Resend, Cloudinary and Google.
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    cache: CatalogCache,
    razorpay: RazorpayClient,
    email: EmailService,
    cloudinary: CloudinaryClient,
    google: GoogleClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - API configuration
    /// * `pool` - `PostgreSQL` connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if the shared HTTP client cannot be built.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, StateError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("kirana-api/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let razorpay = RazorpayClient::new(http.clone(), &config.razorpay);
        let email = EmailService::new(http.clone(), config.email.as_ref(), config.frontend_url.clone());
        let cloudinary = CloudinaryClient::new(http.clone(), config.cloudinary.as_ref());
        let google = GoogleClient::new(http, config.google_client_id.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                cache: CatalogCache::new(),
                razorpay,
                email,
                cloudinary,
                google,
            }),
        })
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn cache(&self) -> &CatalogCache {
        &self.inner.cache
    }

    #[must_use]
    pub fn razorpay(&self) -> &RazorpayClient {
        &self.inner.razorpay
    }

    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }

    #[must_use]
    pub fn cloudinary(&self) -> &CloudinaryClient {
        &self.inner.cloudinary
    }

    #[must_use]
    pub fn google(&self) -> &GoogleClient {
        &self.inner.google
    }
}
