//! Authentication service.
//!
//! Provides email/password accounts and Google sign-in. Sessions are handled
//! by the caller; this service only decides who the user is.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;

use kirana_core::{Email, UserId, UserRole};

use crate::db::RepositoryError;
use crate::db::users::{NewUser, UserRepository};
use crate::models::User;
use crate::services::google::GoogleIdentity;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length, bounding Argon2 work per request.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum display name length.
const MAX_NAME_LENGTH: usize = 100;

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new customer with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(&self, email: &str, name: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        let name = validate_name(name)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        self.users
            .create(&NewUser {
                email: &email,
                name,
                password_hash: Some(&password_hash),
                google_id: None,
                role: UserRole::Customer,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong,
    /// `AuthError::Blocked` if the account is blocked.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let creds = self
            .users
            .get_credentials(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        // Google-only accounts have no password to check against.
        let hash = creds.password_hash.ok_or(AuthError::InvalidCredentials)?;
        verify_password(password, &hash)?;

        if creds.is_blocked {
            return Err(AuthError::Blocked);
        }

        self.get_user(creds.id).await
    }

    // =========================================================================
    // Google Sign-In
    // =========================================================================

    /// Sign in with a verified Google identity.
    ///
    /// An existing account with the same email is linked to the Google
    /// subject; otherwise a new customer account is created.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Blocked` if the account is blocked.
    pub async fn login_with_google(&self, identity: &GoogleIdentity) -> Result<User, AuthError> {
        let email = Email::parse(&identity.email)?;

        if let Some(creds) = self.users.get_credentials(&email).await? {
            if creds.is_blocked {
                return Err(AuthError::Blocked);
            }
            if creds.google_id.is_none() {
                self.users.link_google(creds.id, &identity.subject).await?;
            }
            return self.get_user(creds.id).await;
        }

        let fallback_name = email.local_part().to_owned();
        let name = identity
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&fallback_name);

        let user = self
            .users
            .create(&NewUser {
                email: &email,
                name,
                password_hash: None,
                google_id: Some(&identity.subject),
                role: UserRole::Customer,
            })
            .await?;
        Ok(user)
    }

    // =========================================================================
    // Account Management
    // =========================================================================

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Update name and phone.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidProfile` if either field is invalid.
    pub async fn update_profile(
        &self,
        user_id: UserId,
        name: &str,
        phone: Option<&str>,
    ) -> Result<User, AuthError> {
        let name = validate_name(name)?;
        let phone = phone.map(str::trim).filter(|p| !p.is_empty());
        if let Some(phone) = phone {
            validate_phone(phone)?;
        }
        let user = self.users.update_profile(user_id, name, phone).await?;
        Ok(user)
    }

    /// Change the password after checking the current one.
    ///
    /// Accounts created through Google have no password yet and may set one
    /// without supplying `current`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if `current` is wrong.
    pub async fn change_password(
        &self,
        user_id: UserId,
        current: Option<&str>,
        new: &str,
    ) -> Result<(), AuthError> {
        if let Some(hash) = self.users.get_password_hash(user_id).await? {
            let current = current.ok_or(AuthError::InvalidCredentials)?;
            verify_password(current, &hash)?;
        }
        validate_password(new)?;
        let hash = hash_password(new)?;
        self.users.set_password_hash(user_id, &hash).await?;
        Ok(())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Validate password requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<&str, AuthError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::InvalidProfile("name is required".to_owned()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AuthError::InvalidProfile(format!(
            "name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(name)
}

fn validate_phone(phone: &str) -> Result<(), AuthError> {
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-'));
    if !allowed || !(10..=13).contains(&digits) {
        return Err(AuthError::InvalidProfile(
            "phone must have 10 to 13 digits".to_owned(),
        ));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_length_bounds() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("exactly8").is_ok());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse battery", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong password", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_against_garbage_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_validate_name_and_phone() {
        assert_eq!(validate_name("  Ravi  ").unwrap(), "Ravi");
        assert!(validate_name("   ").is_err());
        assert!(validate_phone("+91 98765-43210").is_ok());
        assert!(validate_phone("98765").is_err());
        assert!(validate_phone("98765abc43").is_err());
    }
}
