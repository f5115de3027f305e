//! Admin-side writes to the package/kube catalog.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::auth::RequireAdmin;
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::PackageKubeRequest;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::{
    validate_catalog_name, validate_currency_affix, validate_non_negative,
};
use crate::types::{Kube, NewKube, NewPackage, Package, PackageKube};

pub async fn create_package(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewPackage>,
) -> Result<(StatusCode, ApiResponse<Package>), ApiError> {
    validate_catalog_name(&req.name, "Package")?;
    validate_currency_affix(&req.prefix, "prefix")?;
    validate_currency_affix(&req.suffix, "suffix")?;
    validate_non_negative(req.first_deposit, "first_deposit")?;
    validate_non_negative(req.price_ip, "price_ip")?;
    validate_non_negative(req.price_pstorage, "price_pstorage")?;
    validate_non_negative(req.price_over_traffic, "price_over_traffic")?;

    let package = match state.store.create_package(&req) {
        Ok(package) => package,
        Err(Error::AlreadyExists) => return Err(ApiError::conflict("Package already exists")),
        Err(e) => {
            tracing::error!("Failed to create package: {e}");
            return Err(ApiError::internal("Failed to create package"));
        }
    };

    tracing::info!("Created package {} ({})", package.name, package.id);
    Ok((StatusCode::CREATED, ApiResponse::success(package)))
}

pub async fn create_kube(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewKube>,
) -> Result<(StatusCode, ApiResponse<Kube>), ApiError> {
    validate_catalog_name(&req.name, "Kube")?;
    validate_non_negative(req.cpu, "cpu")?;
    if req.memory < 0 || req.disk_space < 0 || req.included_traffic < 0 {
        return Err(ApiError::bad_request(
            "Kube resources must be non-negative",
        ));
    }

    let kube = match state.store.create_kube(&req) {
        Ok(kube) => kube,
        Err(Error::AlreadyExists) => return Err(ApiError::conflict("Kube already exists")),
        Err(e) => {
            tracing::error!("Failed to create kube: {e}");
            return Err(ApiError::internal("Failed to create kube"));
        }
    };

    tracing::info!("Created kube {} ({})", kube.name, kube.id);
    Ok((StatusCode::CREATED, ApiResponse::success(kube)))
}

pub async fn set_default_kube(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<ApiResponse<Kube>, ApiError> {
    match state.store.set_default_kube(id) {
        Ok(()) => {}
        Err(Error::NotFound) => return Err(ApiError::not_found("Kube not found")),
        Err(e) => {
            tracing::error!("Failed to set default kube: {e}");
            return Err(ApiError::internal("Failed to set default kube"));
        }
    }

    let kube = state
        .store
        .get_kube(id)
        .api_err("Failed to get kube")?
        .or_not_found("Kube not found")?;
    Ok(ApiResponse::success(kube))
}

pub async fn upsert_package_kube(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path((package_id, kube_id)): Path<(i64, i64)>,
    Json(req): Json<PackageKubeRequest>,
) -> Result<ApiResponse<PackageKube>, ApiError> {
    validate_non_negative(req.kube_price, "kube_price")?;

    match state
        .store
        .upsert_package_kube(package_id, kube_id, req.kube_price)
    {
        Ok(link) => Ok(ApiResponse::success(link)),
        Err(Error::NotFound) => Err(ApiError::not_found("Package or kube not found")),
        Err(e) => {
            tracing::error!("Failed to link kube to package: {e}");
            Err(ApiError::internal("Failed to link kube to package"))
        }
    }
}

pub async fn delete_package_kube(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path((package_id, kube_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    let deleted = state
        .store
        .delete_package_kube(package_id, kube_id)
        .api_err("Failed to unlink kube")?;
    if !deleted {
        return Err(ApiError::not_found("Kube is not part of this package"));
    }
    Ok(StatusCode::NO_CONTENT)
}
