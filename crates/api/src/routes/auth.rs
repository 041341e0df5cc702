//! Authentication route handlers.
//!
//! Email/password and Google sign-in. A successful login stores a
//! [`CurrentUser`](crate::models::CurrentUser) in the session; the browser
//! only ever sees the session cookie.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument};

use crate::error::{AppError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireUser, clear_current_user, set_current_user};
use crate::models::User;
use crate::services::AuthService;
use crate::state::AppState;

// =============================================================================
// Request Types
// =============================================================================

/// Registration body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

/// Login body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Google sign-in body.
#[derive(Debug, Deserialize)]
pub struct GoogleLoginRequest {
    /// ID token from Google Identity Services.
    pub credential: String,
}

/// Profile update body.
#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Password change body.
#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    /// Required unless the account has no password yet.
    #[serde(default)]
    pub current_password: Option<String>,
    pub new_password: String,
}

// =============================================================================
// Handlers
// =============================================================================

async fn start_session(session: &Session, user: &User) -> Result<()> {
    set_current_user(session, &user.to_current())
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}

/// Create an account and log in.
///
/// POST /api/auth/register
#[instrument(skip(state, session, body))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let user = AuthService::new(state.pool())
        .register(&body.email, &body.name, &body.password)
        .await?;
    start_session(&session, &user).await?;

    info!(user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Log in with email and password.
///
/// POST /api/auth/login
#[instrument(skip(state, session, body))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool())
        .login(&body.email, &body.password)
        .await?;
    start_session(&session, &user).await?;

    add_breadcrumb("auth", "Logged in", None);
    Ok(Json(user))
}

/// Log in with a Google ID token, creating the account on first use.
///
/// POST /api/auth/google
#[instrument(skip(state, session, body))]
pub async fn google(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<GoogleLoginRequest>,
) -> Result<Json<User>> {
    let identity = state
        .google()
        .verify_id_token(&body.credential)
        .await
        .map_err(crate::services::AuthError::from)?;
    let user = AuthService::new(state.pool())
        .login_with_google(&identity)
        .await?;
    start_session(&session, &user).await?;

    add_breadcrumb("auth", "Logged in with Google", None);
    Ok(Json(user))
}

/// End the session.
///
/// POST /api/auth/logout
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// The logged-in account.
///
/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool()).get_user(current.id).await?;
    Ok(Json(user))
}

/// Update name and phone.
///
/// PUT /api/auth/profile
#[instrument(skip(state, body), fields(user_id = %current.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Json(body): Json<ProfileRequest>,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool())
        .update_profile(current.id, &body.name, body.phone.as_deref())
        .await?;
    Ok(Json(user))
}

/// Change or set the password.
///
/// PUT /api/auth/password
#[instrument(skip(state, body), fields(user_id = %current.id))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
    Json(body): Json<PasswordRequest>,
) -> Result<StatusCode> {
    AuthService::new(state.pool())
        .change_password(current.id, body.current_password.as_deref(), &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
