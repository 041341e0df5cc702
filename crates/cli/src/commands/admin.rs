//! Admin account commands.
//!
//! # Usage
//!
//! ```bash
//! # Promote an account that signed up through the storefront
//! kirana admin promote -e owner@example.com
//!
//! # Create an admin account directly
//! kirana admin create -e owner@example.com -n "Store Owner" -p '...'
//! ```

use kirana_api::db::{RepositoryError, UserRepository};
use kirana_api::services::{AuthError, AuthService};
use kirana_core::{Email, UserRole};
use thiserror::Error;

use crate::{CliError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] CliError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// No account has this email.
    #[error("No account with email: {0}")]
    UserNotFound(String),

    /// Account creation failed.
    #[error("Could not create account: {0}")]
    Auth(#[from] AuthError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Give an existing account the admin role.
///
/// # Errors
///
/// Returns `AdminError::UserNotFound` if nobody registered with `email`.
pub async fn promote(email: &str) -> Result<(), AdminError> {
    let parsed = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;
    let pool = connect().await?;

    let user = UserRepository::new(&pool)
        .set_role(&parsed, UserRole::Admin)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AdminError::UserNotFound(email.to_owned()),
            other => AdminError::Repository(other),
        })?;

    tracing::info!(user_id = %user.id, email = %user.email, "Account promoted to admin");
    Ok(())
}

/// Create a new admin account with a password.
///
/// # Returns
///
/// The id of the created account.
///
/// # Errors
///
/// Returns an error if the email is taken or the password is too weak.
pub async fn create_user(email: &str, name: &str, password: &str) -> Result<i32, AdminError> {
    let parsed = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;
    let pool = connect().await?;

    tracing::info!("Creating admin account: {}", parsed);
    let user = AuthService::new(&pool)
        .register(parsed.as_str(), name, password)
        .await?;
    let user = UserRepository::new(&pool)
        .set_role(&user.email, UserRole::Admin)
        .await?;

    tracing::info!(
        "Admin account created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );
    Ok(user.id.as_i32())
}
