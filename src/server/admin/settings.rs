use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};

use crate::auth::RequireAdmin;
use crate::billing::NO_BILLING;
use crate::server::AppState;
use crate::server::dto::UpdateSettingRequest;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::types::{BILLING_TYPE_SETTING, SystemSetting};

pub async fn list_settings(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> Result<ApiResponse<Vec<SystemSetting>>, ApiError> {
    let settings = state
        .store
        .list_settings()
        .api_err("Failed to list settings")?;
    Ok(ApiResponse::success(settings))
}

pub async fn get_setting(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<ApiResponse<SystemSetting>, ApiError> {
    let setting = state
        .store
        .get_setting_row(&name)
        .api_err("Failed to get setting")?
        .or_not_found("Setting not found")?;
    Ok(ApiResponse::success(setting))
}

pub async fn update_setting(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<UpdateSettingRequest>,
) -> Result<ApiResponse<SystemSetting>, ApiError> {
    if name == BILLING_TYPE_SETTING && req.value != NO_BILLING {
        let known = state.billing.names();
        if !known.iter().any(|n| *n == req.value) {
            return Err(ApiError::bad_request(format!(
                "Unknown billing type '{}'",
                req.value
            )));
        }
    }

    state
        .store
        .set_setting(&name, &req.value)
        .api_err("Failed to update setting")?;

    tracing::info!("Setting '{name}' changed to '{}'", req.value);

    let setting = state
        .store
        .get_setting_row(&name)
        .api_err("Failed to get setting")?
        .or_not_found("Setting not found")?;
    Ok(ApiResponse::success(setting))
}
