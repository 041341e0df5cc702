//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use kirana_core::{Email, UserId, UserRole};

use super::CurrentUser;

/// A customer or admin account.
///
/// The password hash and Google subject are never loaded into this type;
/// see [`crate::db::users::UserRepository::get_credentials`].
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// The identity stored in the session after login.
    #[must_use]
    pub fn to_current(&self) -> CurrentUser {
        CurrentUser {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Login-relevant columns of a user.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserCredentials {
    pub id: UserId,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub is_blocked: bool,
}
