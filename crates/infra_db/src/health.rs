//! Health checks shared by the PostgreSQL adapters

use sqlx::PgPool;

use core_kernel::HealthCheckResult;

/// Round-trips `SELECT 1` and reports the latency
pub(crate) async fn check(pool: &PgPool, adapter_id: &str) -> HealthCheckResult {
    let start = std::time::Instant::now();

    let result = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await;

    let latency_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(_) => HealthCheckResult::healthy(adapter_id, latency_ms)
            .with_message(format!("{} pooled connections", pool.size())),
        Err(e) => HealthCheckResult::unhealthy(adapter_id, latency_ms, format!("Database error: {}", e)),
    }
}
