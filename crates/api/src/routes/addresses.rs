//! Saved address route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use kirana_core::AddressId;

use crate::db::AddressRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::models::{Address, AddressInput};
use crate::state::AppState;

/// The caller's addresses, default first.
///
/// GET /api/addresses
pub async fn list_addresses(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<Address>>> {
    let addresses = AddressRepository::new(state.pool()).list(user.id).await?;
    Ok(Json(addresses))
}

/// Save a new address.
///
/// POST /api/addresses
#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn create_address(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<AddressInput>,
) -> Result<(StatusCode, Json<Address>)> {
    body.validate().map_err(AppError::BadRequest)?;
    let address = AddressRepository::new(state.pool())
        .create(user.id, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// Replace an address.
///
/// PUT /api/addresses/{id}
#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn update_address(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<AddressId>,
    Json(body): Json<AddressInput>,
) -> Result<Json<Address>> {
    body.validate().map_err(AppError::BadRequest)?;
    let address = AddressRepository::new(state.pool())
        .update(user.id, id, &body)
        .await?;
    Ok(Json(address))
}

/// Delete an address. Past orders keep their snapshot.
///
/// DELETE /api/addresses/{id}
pub async fn delete_address(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<AddressId>,
) -> Result<StatusCode> {
    AddressRepository::new(state.pool())
        .delete(user.id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Make an address the default.
///
/// POST /api/addresses/{id}/default
pub async fn set_default_address(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<AddressId>,
) -> Result<Json<Address>> {
    let address = AddressRepository::new(state.pool())
        .set_default(user.id, id)
        .await?;
    Ok(Json(address))
}
