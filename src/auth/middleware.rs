use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, StatusCode, header::AUTHORIZATION, header::WWW_AUTHENTICATE, request::Parts},
    response::{IntoResponse, Response},
};

use super::helpers::{TokenValidationError, extract_token_from_header, validate_token};
use crate::server::AppState;
use crate::server::response::ApiError;
use crate::types::{Token, User};

/// Whoever made the request: the token used and, for user tokens, its owner.
#[derive(Debug, Clone)]
pub struct Caller {
    pub token: Token,
    pub user: Option<User>,
}

impl Caller {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.token.is_admin
    }
}

/// Extractor that requires any valid authentication (Bearer or Basic x-token)
pub struct RequireAuth(pub Caller);

/// Extractor that requires admin authentication
pub struct RequireAdmin(pub Token);

#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    MissingAuth,
    InvalidScheme,
    InvalidToken,
    TokenExpired,
    NotAdmin,
    InternalError,
}

impl From<TokenValidationError> for AuthError {
    fn from(e: TokenValidationError) -> Self {
        match e {
            TokenValidationError::InvalidScheme => AuthError::InvalidScheme,
            TokenValidationError::InvalidToken => AuthError::InvalidToken,
            TokenValidationError::TokenExpired => AuthError::TokenExpired,
            TokenValidationError::InternalError => AuthError::InternalError,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        let (status, kind, message) = match e {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "NotAuthorized", "Authentication required"),
            AuthError::InvalidScheme => (
                StatusCode::UNAUTHORIZED,
                "NotAuthorized",
                "Invalid authorization scheme",
            ),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "NotAuthorized", "Invalid token"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "NotAuthorized", "Token expired"),
            AuthError::NotAdmin => (StatusCode::FORBIDDEN, "PermissionDenied", "Admin access required"),
            AuthError::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "APIError",
                "Internal server error",
            ),
        };
        ApiError::new(status, kind, message)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let mut response = ApiError::from(self).into_response();

        if response.status() == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer realm=\"kubebill\""),
            );
        }

        response
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let caller = authenticate(parts, state)?;
        Ok(RequireAuth(caller))
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let caller = authenticate(parts, state)?;

        if !caller.is_admin() {
            return Err(AuthError::NotAdmin);
        }

        Ok(RequireAdmin(caller.token))
    }
}

fn authenticate(parts: &Parts, state: &Arc<AppState>) -> Result<Caller, AuthError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let raw_token = extract_token_from_header(auth_header)?.ok_or(AuthError::MissingAuth)?;
    let validated = validate_token(state, &raw_token)?;

    Ok(Caller {
        token: validated.token,
        user: validated.user,
    })
}
