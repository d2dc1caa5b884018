//! Expiry revoker, per spec.md §4.J. Cooperative background sweep, default
//! period 30s — the scheduling loop lives in `sessiond-api`/`sessiond-worker`,
//! this module only owns `tick_once`.

use sqlx::PgPool;

use crate::ip_pool;
use crate::peer_client::PeerClient;
use crate::{audit, session::Session};

pub const DEFAULT_PERIOD_SECONDS: u64 = 30;

/// Sweep ACTIVE sessions past `expires_at`. Peer removal happens before the
/// DB flip to EXPIRED: if the process dies mid-sweep, a session is never
/// reported EXPIRED while the data plane still routes it.
///
/// Returns the number of sessions successfully expired this tick.
pub async fn tick_once(pool: &PgPool, peer: &PeerClient, quarantine_duration_seconds: i64) -> anyhow::Result<usize> {
    let now = sessiond_shared::now_utc();
    let due: Vec<Session> = sqlx::query_as::<_, Session>(
        r#"
        SELECT id, user_id, status, started_at, expires_at, max_expires_at,
               ttl_max_seconds, ttl_step_seconds, client_pubkey, created_at, updated_at
        FROM sessions
        WHERE status = 'ACTIVE' AND expires_at <= $1
        "#,
    )
    .bind(now)
    .fetch_all(pool)
    .await?;

    let mut expired_count = 0;
    for session in &due {
        if let Err(e) = peer.remove_peer(&session.client_pubkey).await {
            tracing::warn!(session_id = %session.id, error = %e, "revoker: peer removal failed, skipping this round");
            continue;
        }

        let result = sqlx::query(
            "UPDATE sessions SET status = 'EXPIRED', updated_at = $1 WHERE id = $2 AND status = 'ACTIVE'",
        )
        .bind(sessiond_shared::now_utc())
        .bind(&session.id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            // Raced with an on-access expiry or a manual revoke between the
            // select and this update; nothing left for this tick to do.
            continue;
        }

        ip_pool::quarantine_session(pool, &session.id, quarantine_duration_seconds).await?;
        audit::record(pool, "session_expired", Some(session.user_id), Some(&session.id), Some("Auto-expire"))
            .await?;
        expired_count += 1;
    }

    if expired_count > 0 {
        tracing::info!(count = expired_count, "revoker: expired sessions");
    } else {
        tracing::debug!("revoker: nothing due");
    }

    Ok(expired_count)
}
