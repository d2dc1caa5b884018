//! Application state.

use sqlx::PgPool;

use sessiond_core::{AuthService, JwtManager, PeerClient, SessionService};
use sessiond_shared::Config;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub jwt: JwtManager,
    pub auth: AuthService,
    pub sessions: SessionService,
}

impl AppState {
    /// `peer` is constructed once by the caller and shared with the
    /// in-process reconcilers, matching spec.md §5's "single long-lived
    /// HTTP client to the peer daemon (safe for concurrent use)".
    pub fn new(pool: PgPool, config: Config, peer: PeerClient) -> Self {
        let jwt = JwtManager::new(
            &config.jwt_secret_key,
            config.access_token_expires_seconds,
            config.proof_token_expires_seconds,
        );
        let auth = AuthService::new(pool.clone(), jwt.clone());
        let sessions = SessionService::new(
            pool.clone(),
            peer,
            config.ttl_max_seconds,
            config.ttl_step_default_seconds,
            config.allow_multiple_active_sessions,
            config.ip_quarantine_duration_seconds,
            config.dns.clone(),
            config.endpoint.clone(),
            config.gateway_pubkey.clone(),
            config.allowed_ips.clone(),
        );

        Self {
            pool,
            config,
            jwt,
            auth,
            sessions,
        }
    }
}
