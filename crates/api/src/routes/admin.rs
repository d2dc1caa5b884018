//! `/v1/admin/*`, per spec.md §6. Gated by `AdminGuard`, not a bearer token.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use sessiond_core::audit;
use sessiond_core::session::{Session, SessionStatus};

use crate::error::ApiResult;
use crate::extract::AdminGuard;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListSessionsQuery {
    status: Option<SessionStatus>,
}

#[derive(Serialize)]
pub struct SessionView {
    session_id: String,
    user_id: i64,
    status: SessionStatus,
    #[serde(with = "time::serde::rfc3339")]
    started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    max_expires_at: OffsetDateTime,
    client_pubkey: String,
}

impl From<Session> for SessionView {
    fn from(s: Session) -> Self {
        Self {
            session_id: s.id,
            user_id: s.user_id,
            status: s.status,
            started_at: s.started_at,
            expires_at: s.expires_at,
            max_expires_at: s.max_expires_at,
            client_pubkey: s.client_pubkey,
        }
    }
}

pub async fn list_sessions(
    State(state): State<AppState>,
    _admin: AdminGuard,
    Query(query): Query<ListSessionsQuery>,
) -> ApiResult<Json<Vec<SessionView>>> {
    let sessions = state.sessions.admin_list(query.status).await?;
    Ok(Json(sessions.into_iter().map(SessionView::from).collect()))
}

#[derive(Serialize)]
pub struct AdminRevokeResponse {
    status: SessionStatus,
}

pub async fn revoke_session(
    State(state): State<AppState>,
    _admin: AdminGuard,
    Path(session_id): Path<String>,
) -> ApiResult<Json<AdminRevokeResponse>> {
    let session = state.sessions.admin_revoke(&session_id).await?;
    Ok(Json(AdminRevokeResponse { status: session.status }))
}

#[derive(Deserialize)]
pub struct AuditQuery {
    session_id: Option<String>,
}

pub async fn list_audit(
    State(state): State<AppState>,
    _admin: AdminGuard,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Vec<audit::AuditEntry>>> {
    let entries = audit::list(&state.pool, query.session_id.as_deref()).await?;
    Ok(Json(entries))
}
