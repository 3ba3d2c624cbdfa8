//! Connection pool and query metrics.

use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, metric};

/// Pool gauge name, labelled by `state` (`open`, `idle`, `in_use`, `max`).
pub const POOL_CONNECTIONS: &str = "db_pool_connections";

/// Statement latency histogram name, labelled by `failed`.
pub const QUERY_DURATION_SECONDS: &str = "db_query_duration_seconds";

/// Publishes the current pool occupancy.
///
/// Does nothing for non-Postgres connections.
pub fn record_pool_stats(db: &DatabaseConnection, max_connections: u32) {
    if db.get_database_backend() != DbBackend::Postgres {
        return;
    }
    let pool = db.get_postgres_connection_pool();
    let open = pool.size();
    let idle = u32::try_from(pool.num_idle()).unwrap_or(u32::MAX);

    metrics::gauge!(POOL_CONNECTIONS, "state" => "open").set(f64::from(open));
    metrics::gauge!(POOL_CONNECTIONS, "state" => "idle").set(f64::from(idle));
    metrics::gauge!(POOL_CONNECTIONS, "state" => "in_use")
        .set(f64::from(open.saturating_sub(idle)));
    metrics::gauge!(POOL_CONNECTIONS, "state" => "max").set(f64::from(max_connections));
}

pub(crate) fn record_query(info: &metric::Info<'_>) {
    metrics::histogram!(QUERY_DURATION_SECONDS, "failed" => info.failed.to_string())
        .record(info.elapsed.as_secs_f64());
}
