use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::auth::{RequireAdmin, TokenGenerator};
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{CreateTokenResponse, CreateUserRequest, CreateUserTokenRequest};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::validate_username;
use crate::types::{Token, User};

const MAX_TOKEN_RETRIES: u32 = 3;

pub async fn create_user(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, ApiResponse<User>), ApiError> {
    validate_username(&req.username)?;

    let taken = state
        .store
        .get_user_by_username(&req.username)
        .api_err("Failed to check existing user")?;
    if taken.is_some() {
        return Err(ApiError::conflict("Username is already taken"));
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        username: req.username,
        created_at: now,
        updated_at: now,
    };

    match state.store.create_user(&user) {
        Ok(()) => {}
        Err(Error::AlreadyExists) => return Err(ApiError::conflict("Username is already taken")),
        Err(e) => {
            tracing::error!("Failed to create user: {e}");
            return Err(ApiError::internal("Failed to create user"));
        }
    }

    tracing::info!("Created user {}", user.username);
    Ok((StatusCode::CREATED, ApiResponse::success(user)))
}

pub async fn list_users(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
) -> Result<ApiResponse<Vec<User>>, ApiError> {
    let users = state.store.list_users().api_err("Failed to list users")?;
    Ok(ApiResponse::success(users))
}

pub async fn get_user(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<User>, ApiError> {
    let user = state
        .store
        .get_user(&id)
        .api_err("Failed to get user")?
        .or_not_found("User not found")?;
    Ok(ApiResponse::success(user))
}

pub async fn delete_user(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = state
        .store
        .delete_user(&id)
        .api_err("Failed to delete user")?;
    if !deleted {
        return Err(ApiError::not_found("User not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_user_tokens(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Vec<Token>>, ApiError> {
    let user = state
        .store
        .get_user(&id)
        .api_err("Failed to get user")?
        .or_not_found("User not found")?;

    let tokens = state
        .store
        .list_user_tokens(&user.id)
        .api_err("Failed to list user tokens")?;
    Ok(ApiResponse::success(tokens))
}

pub async fn create_user_token(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreateUserTokenRequest>,
) -> Result<(StatusCode, ApiResponse<CreateTokenResponse>), ApiError> {
    let user = state
        .store
        .get_user(&id)
        .api_err("Failed to get user")?
        .or_not_found("User not found")?;

    if req.expires_in_seconds.is_some_and(|s| s < 0) {
        return Err(ApiError::bad_request(
            "expires_in_seconds cannot be negative",
        ));
    }
    let expires_at = req
        .expires_in_seconds
        .map(|s| Utc::now() + Duration::seconds(s));

    let generator = TokenGenerator::new();

    for _ in 0..MAX_TOKEN_RETRIES {
        let (token, raw_token) = generator
            .issue_for_user(&user, expires_at)
            .api_err("Failed to generate token")?;

        match state.store.create_token(&token) {
            Ok(()) => {
                return Ok((
                    StatusCode::CREATED,
                    ApiResponse::success(CreateTokenResponse {
                        token: raw_token,
                        metadata: token,
                    }),
                ));
            }
            Err(Error::TokenLookupCollision) => continue,
            Err(e) => {
                tracing::error!("Failed to create token: {e}");
                return Err(ApiError::internal("Failed to create token"));
            }
        }
    }

    Err(ApiError::internal("Failed to create token after retries"))
}
