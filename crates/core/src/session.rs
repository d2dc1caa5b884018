//! Session state machine and protocol, per spec.md §3 and §4.I. This is
//! the core of the system: every mutation here composes the IP pool
//! allocator and the peer daemon client under the ordering guarantees
//! spec.md §5 demands.

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::audit;
use crate::error::{CoreError, CoreResult};
use crate::ip_pool;
use crate::peer_client::PeerClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "session_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    Active,
    Expired,
    Revoked,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    pub status: SessionStatus,
    pub started_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub max_expires_at: OffsetDateTime,
    pub ttl_max_seconds: i64,
    pub ttl_step_seconds: i64,
    pub client_pubkey: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

pub struct WgInterface {
    pub address: String,
    pub dns: Vec<String>,
}

pub struct WgPeer {
    pub public_key: String,
    pub endpoint: String,
    pub allowed_ips: Vec<String>,
    pub persistent_keepalive: i32,
}

pub struct SessionConfig {
    pub interface: WgInterface,
    pub peer: WgPeer,
}

const CONFIG_PERSISTENT_KEEPALIVE: i32 = 25;

#[derive(Clone)]
pub struct SessionService {
    pool: PgPool,
    peer: PeerClient,
    ttl_max_seconds: i64,
    ttl_step_default_seconds: i64,
    allow_multiple_active_sessions: bool,
    ip_quarantine_duration_seconds: i64,
    dns: String,
    endpoint: String,
    gateway_pubkey: String,
    allowed_ips: Vec<String>,
}

impl SessionService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        peer: PeerClient,
        ttl_max_seconds: i64,
        ttl_step_default_seconds: i64,
        allow_multiple_active_sessions: bool,
        ip_quarantine_duration_seconds: i64,
        dns: String,
        endpoint: String,
        gateway_pubkey: String,
        allowed_ips: Vec<String>,
    ) -> Self {
        Self {
            pool,
            peer,
            ttl_max_seconds,
            ttl_step_default_seconds,
            allow_multiple_active_sessions,
            ip_quarantine_duration_seconds,
            dns,
            endpoint,
            gateway_pubkey,
            allowed_ips,
        }
    }

    async fn find_active_for_user(&self, user_id: i64) -> CoreResult<Option<Session>> {
        let sess = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, status, started_at, expires_at, max_expires_at,
                   ttl_max_seconds, ttl_step_seconds, client_pubkey, created_at, updated_at
            FROM sessions
            WHERE user_id = $1 AND status = 'ACTIVE'
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(sess)
    }

    async fn find_by_id(&self, session_id: &str) -> CoreResult<Session> {
        sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, status, started_at, expires_at, max_expires_at,
                   ttl_max_seconds, ttl_step_seconds, client_pubkey, created_at, updated_at
            FROM sessions WHERE id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CoreError::NotFound("session not found".into()))
    }

    fn check_owner(session: &Session, user_id: i64) -> CoreResult<()> {
        if session.user_id != user_id {
            return Err(CoreError::Forbidden("not owner".into()));
        }
        Ok(())
    }

    /// On-access expiry: flip ACTIVE sessions past `expires_at` to EXPIRED,
    /// remove the peer (best-effort), and audit. This is the synchronous
    /// complement to the background expiry revoker (component J).
    async fn expire_if_needed(&self, mut session: Session) -> CoreResult<Session> {
        let now = sessiond_shared::now_utc();
        if session.status != SessionStatus::Active || session.expires_at > now {
            return Ok(session);
        }

        sqlx::query("UPDATE sessions SET status = 'EXPIRED', updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(&session.id)
            .execute(&self.pool)
            .await?;

        if let Err(e) = self.peer.remove_peer(&session.client_pubkey).await {
            tracing::warn!(session_id = %session.id, error = %e, "best-effort peer removal failed during on-access expiry");
        }

        audit::record(
            &self.pool,
            "session_expired",
            Some(session.user_id),
            Some(&session.id),
            Some("On-access check"),
        )
        .await?;

        session.status = SessionStatus::Expired;
        session.updated_at = now;
        Ok(session)
    }

    /// `create(proofed_user, client_pubkey, ttl_step_seconds?)`.
    pub async fn create(
        &self,
        user_id: i64,
        client_pubkey: &str,
        ttl_step_seconds: Option<i64>,
    ) -> CoreResult<Session> {
        if !self.allow_multiple_active_sessions {
            if let Some(active) = self.find_active_for_user(user_id).await? {
                let active = self.expire_if_needed(active).await?;
                if active.status == SessionStatus::Active {
                    return Err(CoreError::Conflict("Active session exists".into()));
                }
            }
        }

        let ttl_step = ttl_step_seconds.unwrap_or(self.ttl_step_default_seconds);
        if ttl_step <= 0 || ttl_step > self.ttl_max_seconds {
            return Err(CoreError::BadRequest("Invalid ttl_step".into()));
        }

        let now = sessiond_shared::now_utc();
        let max_expires_at = now + time::Duration::seconds(self.ttl_max_seconds);
        let expires_at = std::cmp::min(now + time::Duration::seconds(ttl_step), max_expires_at);
        let id = Uuid::new_v4().to_string();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sessions
                (id, user_id, status, started_at, expires_at, max_expires_at,
                 ttl_max_seconds, ttl_step_seconds, client_pubkey, updated_at)
            VALUES ($1, $2, 'ACTIVE', $3, $4, $5, $6, $7, $8, $3)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(now)
        .bind(expires_at)
        .bind(max_expires_at)
        .bind(self.ttl_max_seconds)
        .bind(ttl_step)
        .bind(client_pubkey)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        // Per spec.md §4.I step 5 / §9: allocation runs in its own
        // transaction, after the session row is already committed, so a
        // Conflict on exhaustion (matching
        // `original_source/app/api/routes/sessions.py`'s `db.commit()`
        // before `_allocate_address`) leaves the session row in place
        // rather than rolling it back.
        let mut tx = self.pool.begin().await?;
        let ip = ip_pool::allocate_ip(&mut tx, &id).await?;

        audit::record(
            &mut *tx,
            "session_created",
            Some(user_id),
            Some(&id),
            Some(&format!("Created session. Allocated IP: {ip}/32")),
        )
        .await?;

        tx.commit().await?;

        let allowed_ips = format!("{ip}/32");
        // Per spec.md §9 open issue: a failure here leaves the session and
        // IP rows committed with no peer installed. We propagate the error
        // rather than compensate — operators reconcile via admin revoke.
        self.peer.add_peer(client_pubkey, &allowed_ips).await?;

        self.find_by_id(&id).await
    }

    /// `status(session_id, user)`.
    pub async fn status(&self, session_id: &str, user_id: i64) -> CoreResult<Session> {
        let session = self.find_by_id(session_id).await?;
        Self::check_owner(&session, user_id)?;
        self.expire_if_needed(session).await
    }

    /// Admin listing, optionally filtered by status, newest first.
    pub async fn admin_list(&self, status: Option<SessionStatus>) -> CoreResult<Vec<Session>> {
        let sessions = match status {
            Some(status) => {
                sqlx::query_as::<_, Session>(
                    r#"
                    SELECT id, user_id, status, started_at, expires_at, max_expires_at,
                           ttl_max_seconds, ttl_step_seconds, client_pubkey, created_at, updated_at
                    FROM sessions WHERE status = $1 ORDER BY created_at DESC
                    "#,
                )
                .bind(status)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Session>(
                    r#"
                    SELECT id, user_id, status, started_at, expires_at, max_expires_at,
                           ttl_max_seconds, ttl_step_seconds, client_pubkey, created_at, updated_at
                    FROM sessions ORDER BY created_at DESC
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(sessions)
    }

    /// `admin revoke`: per spec.md §9, this quirk is deliberately preserved
    /// — unlike user-initiated revoke, the admin path removes the peer but
    /// does not quarantine the IP. It also, per
    /// `original_source/app/api/routes/admin.py`, skips the on-access
    /// expiry check and the not-active `Conflict` that the user-facing
    /// revoke applies: an operator can force any session straight to
    /// REVOKED regardless of its current status.
    pub async fn admin_revoke(&self, session_id: &str) -> CoreResult<Session> {
        let session = self.find_by_id(session_id).await?;

        let now = sessiond_shared::now_utc();
        sqlx::query("UPDATE sessions SET status = 'REVOKED', updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(&session.id)
            .execute(&self.pool)
            .await?;

        self.peer.remove_peer(&session.client_pubkey).await?;
        audit::record(&self.pool, "admin_revoke", Some(session.user_id), Some(&session.id), None)
            .await?;

        Ok(Session {
            status: SessionStatus::Revoked,
            updated_at: now,
            ..session
        })
    }

    /// `revoke(session_id, user)`.
    pub async fn revoke(&self, session_id: &str, user_id: i64) -> CoreResult<Session> {
        let session = self.find_by_id(session_id).await?;
        Self::check_owner(&session, user_id)?;
        let session = self.expire_if_needed(session).await?;
        if session.status != SessionStatus::Active {
            return Err(CoreError::Conflict("Session not active".into()));
        }

        let now = sessiond_shared::now_utc();
        sqlx::query("UPDATE sessions SET status = 'REVOKED', updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(&session.id)
            .execute(&self.pool)
            .await?;

        self.peer.remove_peer(&session.client_pubkey).await?;
        ip_pool::quarantine_session(&self.pool, &session.id, self.ip_quarantine_duration_seconds)
            .await?;
        audit::record(
            &self.pool,
            "session_revoked",
            Some(user_id),
            Some(&session.id),
            Some("Manual revoke"),
        )
        .await?;

        Ok(Session {
            status: SessionStatus::Revoked,
            updated_at: now,
            ..session
        })
    }

    /// `renew(session_id, proofed_user)`: slide `expires_at` forward by
    /// `ttl_step_seconds`, capped at `max_expires_at`.
    pub async fn renew(&self, session_id: &str, user_id: i64) -> CoreResult<Session> {
        let session = self.find_by_id(session_id).await?;
        Self::check_owner(&session, user_id)?;
        let session = self.expire_if_needed(session).await?;
        if session.status != SessionStatus::Active {
            return Err(CoreError::Conflict("Session not active".into()));
        }

        let now = sessiond_shared::now_utc();
        if now >= session.max_expires_at {
            return Err(CoreError::Conflict("TTL max reached".into()));
        }

        let new_expires =
            std::cmp::min(now + time::Duration::seconds(session.ttl_step_seconds), session.max_expires_at);
        if new_expires <= session.expires_at {
            return Err(CoreError::Conflict("No extension possible".into()));
        }

        sqlx::query("UPDATE sessions SET expires_at = $1, updated_at = $2 WHERE id = $3")
            .bind(new_expires)
            .bind(now)
            .bind(&session.id)
            .execute(&self.pool)
            .await?;

        audit::record(&self.pool, "session_renewed", Some(user_id), Some(&session.id), None)
            .await?;

        Ok(Session {
            expires_at: new_expires,
            updated_at: now,
            ..session
        })
    }

    /// `config(session_id, proofed_user)`.
    pub async fn config(&self, session_id: &str, user_id: i64) -> CoreResult<SessionConfig> {
        let session = self.find_by_id(session_id).await?;
        Self::check_owner(&session, user_id)?;
        let session = self.expire_if_needed(session).await?;
        if session.status != SessionStatus::Active {
            return Err(CoreError::Conflict("Session not active".into()));
        }

        let row: Option<(ipnetwork::IpNetwork,)> =
            sqlx::query_as("SELECT ip FROM ip_pool WHERE session_id = $1")
                .bind(&session.id)
                .fetch_optional(&self.pool)
                .await?;
        let (ip,) = row.ok_or_else(|| CoreError::Internal("IP not found for active session".into()))?;

        Ok(SessionConfig {
            interface: WgInterface {
                address: ip.ip().to_string(),
                dns: vec![self.dns.clone()],
            },
            peer: WgPeer {
                public_key: self.gateway_pubkey.clone(),
                endpoint: self.endpoint.clone(),
                allowed_ips: self.allowed_ips.clone(),
                persistent_keepalive: CONFIG_PERSISTENT_KEEPALIVE,
            },
        })
    }

    /// Remaining seconds until expiry, floored at zero, for the status
    /// response.
    pub fn remaining_seconds(session: &Session) -> i64 {
        (session.expires_at - sessiond_shared::now_utc())
            .whole_seconds()
            .max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_session(ttl_max: i64, ttl_step: i64) -> Session {
        let now = OffsetDateTime::now_utc();
        Session {
            id: "s1".into(),
            user_id: 1,
            status: SessionStatus::Active,
            started_at: now,
            expires_at: now + time::Duration::seconds(ttl_step),
            max_expires_at: now + time::Duration::seconds(ttl_max),
            ttl_max_seconds: ttl_max,
            ttl_step_seconds: ttl_step,
            client_pubkey: "PK1234567890ABCD".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn remaining_seconds_never_negative() {
        let mut sess = base_session(28800, 900);
        sess.expires_at = OffsetDateTime::now_utc() - time::Duration::seconds(10);
        assert_eq!(SessionService::remaining_seconds(&sess), 0);
    }

    #[test]
    fn remaining_seconds_matches_step() {
        let sess = base_session(28800, 900);
        let remaining = SessionService::remaining_seconds(&sess);
        assert!((895..=900).contains(&remaining));
    }

    #[test]
    fn check_owner_rejects_mismatch() {
        let sess = base_session(28800, 900);
        assert!(SessionService::check_owner(&sess, 1).is_ok());
        assert!(SessionService::check_owner(&sess, 2).is_err());
    }
}
