use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
};

use crate::auth::RequireAdmin;
use crate::server::AppState;
use crate::server::response::{ApiError, StoreResultExt};

pub async fn delete_token(
    admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if id == admin.0.id {
        return Err(ApiError::bad_request("Cannot delete current token"));
    }

    let deleted = state
        .store
        .delete_token(&id)
        .api_err("Failed to delete token")?;
    if !deleted {
        return Err(ApiError::not_found("Token not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
