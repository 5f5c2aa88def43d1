//! Principal extraction from the access token cookie or bearer header

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::CookieJar;

use crate::AppState;
use crate::constants::ACCESS_TOKEN_COOKIE;
use crate::domain::Principal;
use crate::services::error::ApiError;
use crate::services::session;

/// Cookie first, then `Authorization: Bearer`
fn access_token(parts: &Parts) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get(ACCESS_TOKEN_COOKIE) {
        return Some(cookie.value().to_string());
    }
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
}

fn principal(parts: &Parts, state: &AppState) -> Result<Principal, ApiError> {
    let token = access_token(parts).ok_or(ApiError::Unauthorized)?;
    let user_id = session::validate_access_token(&token, &state.jwt_secret).map_err(|e| {
        tracing::debug!(error = %e, "access token rejected");
        ApiError::Unauthorized
    })?;
    Ok(Principal::new(user_id))
}

/// Extractor for routes that require a signed-in caller
pub struct AuthUser(pub Principal);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        principal(parts, state).map(AuthUser)
    }
}

/// Extractor for routes open to anonymous callers. A bad token reads as anonymous.
pub struct MaybeUser(pub Option<Principal>);

impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(principal(parts, state).ok()))
    }
}
