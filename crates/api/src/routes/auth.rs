//! `/v1/auth/*` and `/v1/auth/step-up/*`, per spec.md §6.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::extract::AccessUser;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AuthStartRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
pub struct ChallengeResponse {
    challenge_id: String,
    mfa_required: bool,
    challenge_expires_in: i64,
}

pub async fn start(
    State(state): State<AppState>,
    Json(body): Json<AuthStartRequest>,
) -> ApiResult<Json<ChallengeResponse>> {
    let started = state.auth.auth_start(&body.username, &body.password).await?;
    Ok(Json(ChallengeResponse {
        challenge_id: started.challenge_id,
        mfa_required: started.mfa_required,
        challenge_expires_in: started.challenge_expires_in,
    }))
}

#[derive(Deserialize)]
pub struct VerifyMfaRequest {
    challenge_id: String,
    totp_code: String,
}

#[derive(Serialize)]
pub struct LoginTokensResponse {
    access_token: String,
    access_expires_in: i64,
    proof_token: String,
    proof_expires_in: i64,
}

pub async fn verify_mfa(
    State(state): State<AppState>,
    Json(body): Json<VerifyMfaRequest>,
) -> ApiResult<Json<LoginTokensResponse>> {
    let tokens = state.auth.verify_mfa(&body.challenge_id, &body.totp_code).await?;
    Ok(Json(LoginTokensResponse {
        access_token: tokens.access_token,
        access_expires_in: tokens.access_expires_in,
        proof_token: tokens.proof_token,
        proof_expires_in: tokens.proof_expires_in,
    }))
}

pub async fn step_up_start(
    State(state): State<AppState>,
    AccessUser(user_id): AccessUser,
) -> ApiResult<Json<ChallengeResponse>> {
    let started = state.auth.step_up_start(user_id).await?;
    Ok(Json(ChallengeResponse {
        challenge_id: started.challenge_id,
        mfa_required: started.mfa_required,
        challenge_expires_in: started.challenge_expires_in,
    }))
}

#[derive(Deserialize)]
pub struct StepUpVerifyRequest {
    challenge_id: String,
    totp_code: String,
}

#[derive(Serialize)]
pub struct ProofTokenResponse {
    proof_token: String,
    proof_expires_in: i64,
}

pub async fn step_up_verify(
    State(state): State<AppState>,
    AccessUser(user_id): AccessUser,
    Json(body): Json<StepUpVerifyRequest>,
) -> ApiResult<Json<ProofTokenResponse>> {
    let proof = state
        .auth
        .step_up_verify(&body.challenge_id, &body.totp_code, user_id)
        .await?;
    Ok(Json(ProofTokenResponse {
        proof_token: proof.proof_token,
        proof_expires_in: proof.proof_expires_in,
    }))
}
