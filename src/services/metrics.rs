use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge, CounterVec, Gauge};
use sqlx::PgPool;
use tracing::{info, warn};

lazy_static! {
    // ── Event counters (increment on each event) ────────────────────────────
    pub static ref LOGINS_COUNTER: CounterVec = register_counter_vec!(
        "carehome_logins_total",
        "Login attempts by outcome",
        &["status"]
    ).unwrap();

    pub static ref ADMINISTRATIONS_COUNTER: CounterVec = register_counter_vec!(
        "carehome_medication_administrations_total",
        "Medication administrations recorded, by status",
        &["status"]
    ).unwrap();

    pub static ref INCIDENTS_COUNTER: CounterVec = register_counter_vec!(
        "carehome_incidents_total",
        "Incidents reported, by severity",
        &["severity"]
    ).unwrap();

    pub static ref DOCUMENTS_COUNTER: CounterVec = register_counter_vec!(
        "carehome_documents_total",
        "Document uploads and downloads",
        &["operation"]
    ).unwrap();

    // ── Business metrics ────────────────────────────────────────────────────
    pub static ref ACTIVE_RESIDENTS_GAUGE: Gauge = register_gauge!(
        "carehome_service_users_active",
        "Active service users"
    ).unwrap();

    pub static ref ACTIVE_STAFF_GAUGE: Gauge = register_gauge!(
        "carehome_staff_active",
        "Active staff members"
    ).unwrap();

    pub static ref LOW_STOCK_GAUGE: Gauge = register_gauge!(
        "carehome_medications_low_stock",
        "Active medications at or below the low-stock threshold"
    ).unwrap();
}

/// Spawn the background metrics collector (refreshes every 5 minutes).
pub fn start(pool: PgPool, low_stock_threshold: i32) {
    tokio::spawn(async move {
        // Initial collection on startup
        if let Err(e) = collect(&pool, low_stock_threshold).await {
            warn!("Metrics: initial collection failed: {}", e);
        }
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(300)).await;
            if let Err(e) = collect(&pool, low_stock_threshold).await {
                warn!("Metrics: collection failed: {}", e);
            }
        }
    });
}

async fn collect(pool: &PgPool, low_stock_threshold: i32) -> anyhow::Result<()> {
    let residents: i64 =
        sqlx::query_scalar("SELECT COUNT(*)::BIGINT FROM service_users WHERE is_active = TRUE")
            .fetch_one(pool)
            .await?;
    ACTIVE_RESIDENTS_GAUGE.set(residents as f64);

    let staff: i64 =
        sqlx::query_scalar("SELECT COUNT(*)::BIGINT FROM staff_members WHERE is_active = TRUE")
            .fetch_one(pool)
            .await?;
    ACTIVE_STAFF_GAUGE.set(staff as f64);

    let low_stock: i64 = sqlx::query_scalar(
        "SELECT COUNT(*)::BIGINT FROM medications WHERE is_active = TRUE AND current_balance <= $1",
    )
    .bind(low_stock_threshold)
    .fetch_one(pool)
    .await?;
    LOW_STOCK_GAUGE.set(low_stock as f64);

    info!(residents, staff, low_stock, "Metrics: collected");
    Ok(())
}
