//! `/v1/sessions*`, per spec.md §4.I and §6.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use sessiond_core::session::{Session, SessionConfig, SessionService, SessionStatus};
use sessiond_core::CoreError;

use crate::error::ApiResult;
use crate::extract::{AccessUser, ProofUser};
use crate::state::AppState;

const MIN_PUBKEY_LEN: usize = 16;

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    client_pubkey: String,
    ttl_step_seconds: Option<i64>,
}

#[derive(Serialize)]
pub struct SessionCreatedResponse {
    session_id: String,
    #[serde(with = "time::serde::rfc3339")]
    started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    max_expires_at: OffsetDateTime,
    status: SessionStatus,
}

impl From<Session> for SessionCreatedResponse {
    fn from(s: Session) -> Self {
        Self {
            session_id: s.id,
            started_at: s.started_at,
            expires_at: s.expires_at,
            max_expires_at: s.max_expires_at,
            status: s.status,
        }
    }
}

pub async fn create(
    State(state): State<AppState>,
    ProofUser(user_id): ProofUser,
    Json(body): Json<CreateSessionRequest>,
) -> ApiResult<Json<SessionCreatedResponse>> {
    if body.client_pubkey.len() < MIN_PUBKEY_LEN {
        return Err(CoreError::BadRequest("client_pubkey too short".into()).into());
    }

    let session = state
        .sessions
        .create(user_id, &body.client_pubkey, body.ttl_step_seconds)
        .await?;
    Ok(Json(session.into()))
}

#[derive(Serialize)]
pub struct SessionStatusResponse {
    session_id: String,
    status: SessionStatus,
    #[serde(with = "time::serde::rfc3339")]
    started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    max_expires_at: OffsetDateTime,
    remaining_seconds: i64,
}

impl From<Session> for SessionStatusResponse {
    fn from(s: Session) -> Self {
        let remaining_seconds = SessionService::remaining_seconds(&s);
        Self {
            session_id: s.id,
            status: s.status,
            started_at: s.started_at,
            expires_at: s.expires_at,
            max_expires_at: s.max_expires_at,
            remaining_seconds,
        }
    }
}

pub async fn status(
    State(state): State<AppState>,
    AccessUser(user_id): AccessUser,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionStatusResponse>> {
    let session = state.sessions.status(&session_id, user_id).await?;
    Ok(Json(session.into()))
}

#[derive(Serialize)]
pub struct RevokeResponse {
    status: SessionStatus,
    #[serde(with = "time::serde::rfc3339")]
    revoked_at: OffsetDateTime,
}

pub async fn revoke(
    State(state): State<AppState>,
    AccessUser(user_id): AccessUser,
    Path(session_id): Path<String>,
) -> ApiResult<Json<RevokeResponse>> {
    let session = state.sessions.revoke(&session_id, user_id).await?;
    Ok(Json(RevokeResponse {
        status: session.status,
        revoked_at: session.updated_at,
    }))
}

#[derive(Serialize)]
pub struct RenewResponse {
    status: SessionStatus,
    #[serde(with = "time::serde::rfc3339")]
    expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    max_expires_at: OffsetDateTime,
}

pub async fn renew(
    State(state): State<AppState>,
    ProofUser(user_id): ProofUser,
    Path(session_id): Path<String>,
) -> ApiResult<Json<RenewResponse>> {
    let session = state.sessions.renew(&session_id, user_id).await?;
    Ok(Json(RenewResponse {
        status: session.status,
        expires_at: session.expires_at,
        max_expires_at: session.max_expires_at,
    }))
}

#[derive(Serialize)]
pub struct InterfaceView {
    address: String,
    dns: Vec<String>,
}

#[derive(Serialize)]
pub struct PeerView {
    public_key: String,
    endpoint: String,
    allowed_ips: Vec<String>,
    persistent_keepalive: i32,
}

#[derive(Serialize)]
pub struct ConfigResponse {
    interface: InterfaceView,
    peer: PeerView,
}

impl From<SessionConfig> for ConfigResponse {
    fn from(c: SessionConfig) -> Self {
        Self {
            interface: InterfaceView {
                address: c.interface.address,
                dns: c.interface.dns,
            },
            peer: PeerView {
                public_key: c.peer.public_key,
                endpoint: c.peer.endpoint,
                allowed_ips: c.peer.allowed_ips,
                persistent_keepalive: c.peer.persistent_keepalive,
            },
        }
    }
}

pub async fn config(
    State(state): State<AppState>,
    ProofUser(user_id): ProofUser,
    Path(session_id): Path<String>,
) -> ApiResult<Json<ConfigResponse>> {
    let config = state.sessions.config(&session_id, user_id).await?;
    Ok(Json(config.into()))
}
