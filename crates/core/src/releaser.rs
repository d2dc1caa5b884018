//! Quarantine releaser, per spec.md §4.K. Cooperative background sweep,
//! default period 10s — the scheduling loop lives in `sessiond-api`/
//! `sessiond-worker`, this module only owns `tick_once`.

use sqlx::PgPool;

pub const DEFAULT_PERIOD_SECONDS: u64 = 10;

/// Release QUARANTINED IPs whose `quarantined_until` has passed, back to
/// FREE, in one bulk statement. Returns the number of rows released.
pub async fn tick_once(pool: &PgPool) -> anyhow::Result<usize> {
    let result = sqlx::query(
        r#"
        UPDATE ip_pool
        SET state = 'FREE', quarantined_until = NULL, updated_at = $1
        WHERE state = 'QUARANTINED' AND quarantined_until <= $1
        "#,
    )
    .bind(sessiond_shared::now_utc())
    .execute(pool)
    .await?;

    let released = result.rows_affected() as usize;
    if released > 0 {
        tracing::info!(count = released, "releaser: released quarantined IPs");
    } else {
        tracing::debug!("releaser: nothing due");
    }

    Ok(released)
}
