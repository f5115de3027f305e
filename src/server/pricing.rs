//! Read-only view of the package/kube catalog for any authenticated caller.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    routing::get,
};

use super::AppState;
use super::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::auth::RequireAuth;
use crate::types::{Kube, PackageWithKubes};

pub fn pricing_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/packages", get(list_packages))
        .route("/packages/{id}", get(get_package))
        .route("/kubes", get(list_kubes))
}

pub async fn list_packages(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> Result<ApiResponse<Vec<PackageWithKubes>>, ApiError> {
    let packages = state
        .store
        .list_packages_with_kubes()
        .api_err("Failed to list packages")?;
    Ok(ApiResponse::success(packages))
}

pub async fn get_package(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<ApiResponse<PackageWithKubes>, ApiError> {
    let package = state
        .store
        .get_package(id)
        .api_err("Failed to get package")?
        .or_not_found("Package not found")?;
    let kubes = state
        .store
        .list_package_kubes(package.id)
        .api_err("Failed to list package kubes")?;
    Ok(ApiResponse::success(PackageWithKubes { package, kubes }))
}

pub async fn list_kubes(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> Result<ApiResponse<Vec<Kube>>, ApiError> {
    let kubes = state.store.list_kubes().api_err("Failed to list kubes")?;
    Ok(ApiResponse::success(kubes))
}
