//! Append-only audit trail. Never updated or deleted by the core, per
//! spec.md §3.

use sqlx::{Executor, PgPool, Postgres};
use time::OffsetDateTime;

use crate::error::CoreResult;

const ADMIN_AUDIT_LIMIT: i64 = 200;

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct AuditEntry {
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
    pub user_id: Option<i64>,
    pub session_id: Option<String>,
    pub action: String,
    pub detail: Option<String>,
}

/// Record one audit line. Takes any `Postgres` executor so it can be
/// called either against the pool directly or inside an in-flight
/// transaction, matching the call sites in `session.rs`/`auth.rs`.
pub async fn record<'c, E>(
    executor: E,
    action: &str,
    user_id: Option<i64>,
    session_id: Option<&str>,
    detail: Option<&str>,
) -> Result<(), sqlx::Error>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query(
        "INSERT INTO audit_logs (user_id, session_id, action, detail) VALUES ($1, $2, $3, $4)",
    )
    .bind(user_id)
    .bind(session_id)
    .bind(action)
    .bind(detail)
    .execute(executor)
    .await?;
    Ok(())
}

/// `GET /v1/admin/audit?session_id=`: last 200 entries, newest first.
pub async fn list(pool: &PgPool, session_id: Option<&str>) -> CoreResult<Vec<AuditEntry>> {
    let entries = match session_id {
        Some(session_id) => {
            sqlx::query_as::<_, AuditEntry>(
                r#"
                SELECT occurred_at, user_id, session_id, action, detail
                FROM audit_logs WHERE session_id = $1
                ORDER BY occurred_at DESC LIMIT $2
                "#,
            )
            .bind(session_id)
            .bind(ADMIN_AUDIT_LIMIT)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, AuditEntry>(
                r#"
                SELECT occurred_at, user_id, session_id, action, detail
                FROM audit_logs ORDER BY occurred_at DESC LIMIT $1
                "#,
            )
            .bind(ADMIN_AUDIT_LIMIT)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(entries)
}
