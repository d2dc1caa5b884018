//! IP pool allocator (spec.md §4.D) and pool synchronizer (§4.E).

use std::collections::HashMap;
use std::net::IpAddr;

use ipnetwork::IpNetwork;
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;

use crate::error::{CoreError, CoreResult};
use sessiond_shared::advisory_lock::AdvisoryLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "ip_state", rename_all = "UPPERCASE")]
pub enum IpState {
    Free,
    Assigned,
    Quarantined,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IpEntry {
    pub ip: IpNetwork,
    pub state: IpState,
    pub session_id: Option<String>,
    pub quarantined_until: Option<OffsetDateTime>,
    pub updated_at: OffsetDateTime,
}

/// `allocate_ip(session_id) -> ip`: pick a FREE row, order randomized,
/// under `SELECT ... FOR UPDATE SKIP LOCKED`, inside the caller's
/// transaction, and flip it to ASSIGNED.
///
/// Runs inside the same transaction as the session insert so that a
/// failure here rolls back the session row too — matching spec.md §5's
/// "session transaction is committed before add_peer is issued".
pub async fn allocate_ip(
    tx: &mut Transaction<'_, Postgres>,
    session_id: &str,
) -> CoreResult<IpAddr> {
    let row: Option<(IpNetwork,)> = sqlx::query_as(
        r#"
        SELECT ip FROM ip_pool
        WHERE state = 'FREE'
        ORDER BY random()
        FOR UPDATE SKIP LOCKED
        LIMIT 1
        "#,
    )
    .fetch_optional(&mut **tx)
    .await?;

    let (ip,) = row.ok_or_else(|| CoreError::Conflict("No free IPs available".to_string()))?;

    sqlx::query(
        "UPDATE ip_pool SET state = 'ASSIGNED', session_id = $1, updated_at = now() WHERE ip = $2",
    )
    .bind(session_id)
    .bind(ip)
    .execute(&mut **tx)
    .await?;

    Ok(ip.ip())
}

/// `quarantine_ip(ip)`. Sets QUARANTINED, clears session_id, sets
/// `quarantined_until`.
pub async fn quarantine_ip(
    pool: &PgPool,
    ip: IpAddr,
    quarantine_duration_seconds: i64,
) -> CoreResult<()> {
    let until = sessiond_shared::now_utc() + time::Duration::seconds(quarantine_duration_seconds);
    sqlx::query(
        r#"
        UPDATE ip_pool
        SET state = 'QUARANTINED', session_id = NULL, quarantined_until = $1, updated_at = now()
        WHERE ip = $2
        "#,
    )
    .bind(until)
    .bind(IpNetwork::from(ip))
    .execute(pool)
    .await?;
    Ok(())
}

/// `quarantine_session(session_id)`. A missing ASSIGNED row is a no-op —
/// revoke can race with the expiry sweep over the same session.
pub async fn quarantine_session(
    pool: &PgPool,
    session_id: &str,
    quarantine_duration_seconds: i64,
) -> CoreResult<()> {
    let row: Option<(IpNetwork,)> =
        sqlx::query_as("SELECT ip FROM ip_pool WHERE session_id = $1 AND state = 'ASSIGNED'")
            .bind(session_id)
            .fetch_optional(pool)
            .await?;

    if let Some((ip,)) = row {
        quarantine_ip(pool, ip.ip(), quarantine_duration_seconds).await?;
    }
    Ok(())
}

/// Every usable host address in `cidr`, the way Python's
/// `ipaddress.ip_network(...).hosts()` computes it: network and broadcast
/// excluded for prefixes shorter than /31, all addresses usable at /31 and
/// /32.
fn hosts(cidr: &IpNetwork) -> Vec<IpAddr> {
    match cidr {
        IpNetwork::V4(net) => {
            if net.prefix() >= 31 {
                net.iter().map(IpAddr::V4).collect()
            } else {
                let all: Vec<_> = net.iter().collect();
                if all.len() <= 2 {
                    Vec::new()
                } else {
                    all[1..all.len() - 1].iter().map(|ip| IpAddr::V4(*ip)).collect()
                }
            }
        }
        IpNetwork::V6(net) => net.iter().map(IpAddr::V6).collect(),
    }
}

/// Reconcile `ip_pool` rows against `desired = hosts(cidr) - reserved`,
/// per spec.md §4.E. Runs once at startup under a process-wide advisory
/// lock so multiple instances starting concurrently serialize.
pub async fn sync_pool(
    pool: &PgPool,
    project_name: &str,
    network_cidr: &str,
    reserved: &[IpAddr],
) -> anyhow::Result<()> {
    let cidr: IpNetwork = network_cidr.parse()?;
    let reserved: std::collections::HashSet<IpAddr> = reserved.iter().copied().collect();
    let desired: std::collections::HashSet<IpAddr> = hosts(&cidr)
        .into_iter()
        .filter(|ip| !reserved.contains(ip))
        .collect();

    let lock = AdvisoryLock::acquire(pool, project_name).await?;

    let result = sync_pool_locked(pool, &desired).await;

    lock.release().await?;
    result
}

async fn sync_pool_locked(
    pool: &PgPool,
    desired: &std::collections::HashSet<IpAddr>,
) -> anyhow::Result<()> {
    let existing_rows: Vec<(IpNetwork, IpState)> =
        sqlx::query_as("SELECT ip, state FROM ip_pool").fetch_all(pool).await?;
    let existing: HashMap<IpAddr, IpState> = existing_rows
        .iter()
        .map(|(ip, state)| (ip.ip(), *state))
        .collect();

    let to_add: Vec<IpAddr> = desired
        .iter()
        .filter(|ip| !existing.contains_key(ip))
        .copied()
        .collect();
    for ip in &to_add {
        sqlx::query("INSERT INTO ip_pool (ip, state) VALUES ($1, 'FREE')")
            .bind(IpNetwork::from(*ip))
            .execute(pool)
            .await?;
    }
    if !to_add.is_empty() {
        tracing::info!(count = to_add.len(), "ip_pool: added IPs");
    }

    let mut deletable = Vec::new();
    let mut assigned_outside = Vec::new();
    for (ip, state) in &existing {
        if desired.contains(ip) {
            continue;
        }
        match state {
            IpState::Free | IpState::Quarantined => deletable.push(*ip),
            IpState::Assigned => assigned_outside.push(*ip),
        }
    }

    for ip in &deletable {
        sqlx::query("DELETE FROM ip_pool WHERE ip = $1")
            .bind(IpNetwork::from(*ip))
            .execute(pool)
            .await?;
    }
    if !deletable.is_empty() {
        tracing::info!(
            count = deletable.len(),
            "ip_pool: removed FREE/QUARANTINED IPs outside CIDR"
        );
    }

    if !assigned_outside.is_empty() {
        tracing::warn!(
            count = assigned_outside.len(),
            examples = ?&assigned_outside[..assigned_outside.len().min(5)],
            "ip_pool: ASSIGNED IPs outside current CIDR; manual action required"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn hosts_excludes_network_and_broadcast_for_slash_30() {
        let cidr: IpNetwork = "10.0.0.0/30".parse().expect("valid cidr");
        let host_list = hosts(&cidr);
        assert_eq!(
            host_list,
            vec![
                IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
                IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            ]
        );
    }

    #[test]
    fn hosts_slash_32_is_the_single_address() {
        let cidr: IpNetwork = "10.0.0.5/32".parse().expect("valid cidr");
        assert_eq!(hosts(&cidr), vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))]);
    }
}
