//! Route wiring for the eleven endpoints of spec.md §6, plus an ambient
//! `/healthz` liveness probe.

pub mod admin;
pub mod auth;
pub mod sessions;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/auth/start", post(auth::start))
        .route("/v1/auth/verify-mfa", post(auth::verify_mfa))
        .route("/v1/auth/step-up/start", post(auth::step_up_start))
        .route("/v1/auth/step-up/verify", post(auth::step_up_verify))
        .route("/v1/sessions", post(sessions::create))
        .route(
            "/v1/sessions/:id",
            get(sessions::status),
        )
        .route("/v1/sessions/:id/revoke", post(sessions::revoke))
        .route("/v1/sessions/:id/renew", post(sessions::renew))
        .route("/v1/sessions/:id/config", post(sessions::config))
        .route("/v1/admin/sessions", get(admin::list_sessions))
        .route(
            "/v1/admin/sessions/:id/revoke",
            post(admin::revoke_session),
        )
        .route("/v1/admin/audit", get(admin::list_audit))
        .with_state(state)
}
