//! Customer administration.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::{info, instrument};

use kirana_core::UserId;

use crate::db::{Page, Pagination, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::User;
use crate::state::AppState;

const PER_PAGE: i64 = 20;

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    /// Matches email or name.
    pub q: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct BlockRequest {
    pub blocked: bool,
}

/// Accounts, newest first.
///
/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Page<User>>> {
    let pagination = Pagination::new(query.page, query.per_page, PER_PAGE);
    let search = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let users = UserRepository::new(state.pool())
        .list(search, pagination)
        .await?;
    Ok(Json(users))
}

/// Block or unblock an account. Blocked accounts cannot log in or order.
///
/// PUT /api/admin/users/{id}/block
#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn set_blocked(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
    Json(body): Json<BlockRequest>,
) -> Result<Json<User>> {
    if id == admin.id && body.blocked {
        return Err(AppError::BadRequest(
            "You cannot block your own account".to_string(),
        ));
    }
    let user = UserRepository::new(state.pool())
        .set_blocked(id, body.blocked)
        .await?;
    info!(user_id = %user.id, blocked = user.is_blocked, "User block status changed");
    Ok(Json(user))
}
