//! `/billing` routes: thin dispatch onto the active billing provider.

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use serde_json::{Value, json};

use super::AppState;
use super::maintenance::MaintenanceProtected;
use super::params::{RequestParams, is_truthy};
use super::response::{ApiError, ApiResponse, StoreResultExt};
use crate::auth::Caller;
use crate::billing::{BillingContext, BillingProvider, NO_BILLING};
use crate::types::BILLING_TYPE_SETTING;

pub fn billing_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/info", get(get_billing_info))
        .route("/info/", get(get_billing_info))
        .route("/paymentmethods", get(payment_methods))
        .route("/paymentmethods/", get(payment_methods))
        .route("/order", post(order_product))
        .route("/order/", post(order_product))
        .route("/orderKubes", post(order_kubes))
        .route("/orderKubes/", post(order_kubes))
}

/// Name of the active provider, or `None` when billing is off.
/// A missing settings row counts as off.
fn current_billing(state: &AppState) -> Result<Option<String>, ApiError> {
    let current = state
        .store
        .get_setting(BILLING_TYPE_SETTING)
        .api_err("Failed to read billing settings")?;

    Ok(current.filter(|name| !name.is_empty() && name != NO_BILLING))
}

fn require_billing(state: &AppState) -> Result<Arc<dyn BillingProvider>, ApiError> {
    let name = current_billing(state)?.ok_or_else(ApiError::without_billing)?;
    Ok(state.billing.get_billing(&name)?)
}

fn context(caller: &Caller) -> BillingContext {
    BillingContext {
        user: caller.user.clone(),
    }
}

/// Package and kube defaults shown when no billing system is configured.
fn no_billing_data(state: &AppState) -> Result<Value, ApiError> {
    let packages = state
        .store
        .list_packages_with_kubes()
        .api_err("Failed to list packages")?;
    let default_kube = state
        .store
        .get_default_kube()
        .api_err("Failed to get default kube")?;
    let default_package = state
        .store
        .get_default_package()
        .api_err("Failed to get default package")?;

    Ok(json!({
        "billing": NO_BILLING,
        "packages": packages,
        "default": {
            "kubeType": default_kube,
            "packageId": default_package,
        },
    }))
}

pub async fn get_billing_info(
    MaintenanceProtected(caller): MaintenanceProtected,
    State(state): State<Arc<AppState>>,
    params: RequestParams,
) -> Result<ApiResponse<Value>, ApiError> {
    let Some(name) = current_billing(&state)? else {
        return Ok(ApiResponse::success(no_billing_data(&state)?));
    };

    let billing = state.billing.get_billing(&name)?;
    let info = billing
        .get_kuberdock_info(&context(&caller), params.into_inner())
        .await?;
    Ok(ApiResponse::success(info))
}

pub async fn payment_methods(
    MaintenanceProtected(caller): MaintenanceProtected,
    State(state): State<Arc<AppState>>,
) -> Result<ApiResponse<Value>, ApiError> {
    let billing = require_billing(&state)?;
    let methods = billing.get_payment_methods(&context(&caller)).await?;
    Ok(ApiResponse::success(methods))
}

pub async fn order_product(
    MaintenanceProtected(caller): MaintenanceProtected,
    State(state): State<Arc<AppState>>,
    params: RequestParams,
) -> Result<ApiResponse<Value>, ApiError> {
    let billing = require_billing(&state)?;
    let ctx = context(&caller);

    let result = if is_truthy(params.get("pod")) {
        tracing::debug!("Ordering pod through {}", billing.name());
        billing.order_pod(&ctx, params.into_inner()).await?
    } else {
        tracing::debug!("Ordering product through {}", billing.name());
        billing.order_product(&ctx, params.into_inner()).await?
    };
    Ok(ApiResponse::success(result))
}

pub async fn order_kubes(
    MaintenanceProtected(caller): MaintenanceProtected,
    State(state): State<Arc<AppState>>,
    params: RequestParams,
) -> Result<ApiResponse<Value>, ApiError> {
    let billing = require_billing(&state)?;
    let result = billing
        .order_kubes(&context(&caller), params.into_inner())
        .await?;
    Ok(ApiResponse::success(result))
}
