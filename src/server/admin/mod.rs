mod catalog;
mod settings;
mod tokens;
mod users;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::server::AppState;

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        // System settings
        .route("/settings", get(settings::list_settings))
        .route("/settings/{name}", get(settings::get_setting))
        .route("/settings/{name}", put(settings::update_setting))
        // Users
        .route("/users", post(users::create_user))
        .route("/users", get(users::list_users))
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}", delete(users::delete_user))
        .route("/users/{id}/tokens", get(users::list_user_tokens))
        .route("/users/{id}/tokens", post(users::create_user_token))
        // Tokens
        .route("/tokens/{id}", delete(tokens::delete_token))
        // Catalog
        .route("/packages", post(catalog::create_package))
        .route("/kubes", post(catalog::create_kube))
        .route("/kubes/{id}/default", put(catalog::set_default_kube))
        .route(
            "/packages/{id}/kubes/{kube_id}",
            put(catalog::upsert_package_kube),
        )
        .route(
            "/packages/{id}/kubes/{kube_id}",
            delete(catalog::delete_package_kube),
        )
}
