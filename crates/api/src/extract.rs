//! Bearer-token and admin-token extractors bound to route scope, per
//! spec.md §4.H ("token scopes are bound to routes").

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use sessiond_core::token::Scope;
use sessiond_core::{user, CoreError};

use crate::error::ApiError;
use crate::state::AppState;

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Verify the bearer token carries `scope`, then re-check the user is still
/// active — mirrors `original_source/app/api/deps.py`'s `get_current_user`/
/// `get_current_proofed_user`, which re-fetch the row on every request
/// rather than trusting a token minted before the account was disabled.
async fn verify_scope(parts: &Parts, state: &AppState, scope: Scope) -> Result<i64, ApiError> {
    let token = bearer_token(parts).ok_or(ApiError(CoreError::Unauthenticated))?;
    let claims = state.jwt.verify(token, scope)?;
    let user_id = claims
        .sub
        .parse::<i64>()
        .map_err(|_| ApiError(CoreError::Unauthenticated))?;

    match user::find_by_id(&state.pool, user_id).await? {
        Some(u) if u.is_active => Ok(user_id),
        _ => Err(ApiError(CoreError::Forbidden("user not allowed".into()))),
    }
}

/// Bearer token with `scope = access`: gates status/revoke/step-up-start.
pub struct AccessUser(pub i64);

impl FromRequestParts<AppState> for AccessUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(AccessUser(verify_scope(parts, state, Scope::Access).await?))
    }
}

/// Bearer token with `scope = proof`: gates create/renew/config.
pub struct ProofUser(pub i64);

impl FromRequestParts<AppState> for ProofUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(ProofUser(verify_scope(parts, state, Scope::Proof).await?))
    }
}

/// `X-Admin-Token` header, compared against the configured admin token.
pub struct AdminGuard;

impl FromRequestParts<AppState> for AdminGuard {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get("X-Admin-Token")
            .and_then(|v| v.to_str().ok());

        match provided {
            Some(token) if token == state.config.admin_token => Ok(AdminGuard),
            _ => Err(ApiError(CoreError::Forbidden("admin check".into()))),
        }
    }
}
