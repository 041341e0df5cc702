//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::google::GoogleError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] kirana_core::EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Name or phone failed validation.
    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    /// The account has been blocked by an admin.
    #[error("account is blocked")]
    Blocked,

    /// Google sign-in failed or is not configured.
    #[error("google sign-in error: {0}")]
    Google(#[from] GoogleError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
