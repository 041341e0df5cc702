//! Authentication extractors.
//!
//! The session holds a [`CurrentUser`] after login. Customer routes take
//! [`RequireUser`]; admin routes take [`RequireAdmin`], which reloads the
//! account so a demotion or block applies at once.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use kirana_core::UserId;

use crate::db::UserRepository;
use crate::error::AppError;
use crate::models::{CurrentUser, User, session_keys};
use crate::state::AppState;

/// Extractor that requires a logged-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn my_orders(RequireUser(user): RequireUser) -> impl IntoResponse {
///     format!("Orders for {}", user.email)
/// }
/// ```
pub struct RequireUser(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_user(parts)
            .await
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("Please log in".to_string()))
    }
}

/// Extractor that requires an active admin account.
///
/// Returns 401 without a session and 403 for customers or blocked admins.
pub struct RequireAdmin(pub User);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let current = current_user(parts)
            .await
            .ok_or_else(|| AppError::Unauthorized("Please log in".to_string()))?;

        let user = UserRepository::new(state.pool())
            .get_by_id(current.id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Please log in".to_string()))?;

        if !user.is_admin() || user.is_blocked {
            tracing::warn!(user_id = %user.id, "Non-admin denied admin route");
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }

        Ok(Self(user))
    }
}

/// Whether `user_id` is currently an unblocked admin.
///
/// For routes open to owners that admins may also reach.
///
/// # Errors
///
/// Returns `AppError::Database` if the lookup fails.
pub async fn is_active_admin(state: &AppState, user_id: UserId) -> Result<bool, AppError> {
    Ok(UserRepository::new(state.pool())
        .get_by_id(user_id)
        .await?
        .is_some_and(|u| u.is_admin() && !u.is_blocked))
}

async fn current_user(parts: &Parts) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

/// Helper to set the current user in the session.
///
/// The session id is cycled first so a pre-login id cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Helper to end the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be deleted.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
