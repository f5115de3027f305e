use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};

use super::AppState;
use super::response::{ApiError, StoreResultExt};
use crate::auth::{Caller, RequireAuth};
use crate::types::MAINTENANCE_SETTING;

/// Extractor for routes that are closed to users while the panel is in
/// maintenance mode. Authenticates first; admins always pass.
pub struct MaintenanceProtected(pub Caller);

impl FromRequestParts<Arc<AppState>> for MaintenanceProtected {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(caller) = RequireAuth::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        if !caller.is_admin() && in_maintenance(state).map_err(IntoResponse::into_response)? {
            return Err(
                ApiError::unavailable("Service is in maintenance mode, try again later")
                    .into_response(),
            );
        }

        Ok(MaintenanceProtected(caller))
    }
}

pub fn in_maintenance(state: &AppState) -> Result<bool, ApiError> {
    let value = state
        .store
        .get_setting(MAINTENANCE_SETTING)
        .api_err("Failed to read maintenance setting")?;

    Ok(value.is_some_and(|v| is_enabled(&v)))
}

fn is_enabled(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
