/// Scan the last 24 h of the security log and record suspicious findings.
/// Run periodically (e.g. cron: */30 * * * * /app/security-check)

use anyhow::Context;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;

use carehome_api::{
    models::audit::SecurityStatus,
    services::security::{SecurityLogEntry, SecurityService, BRUTE_FORCE_THRESHOLD},
};

const LOOKBACK_HOURS: i64 = 24;
const FAILED_LOGIN_THRESHOLD: i64 = 5;
/// Source address recorded for events raised by this job.
const SYSTEM_IP: &str = "127.0.0.1";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL environment variable not set")?;
    let pool = PgPoolOptions::new().max_connections(2).connect(&database_url).await?;

    tracing::info!("Running security checks...");
    let mut findings = 0;

    for ip in SecurityService::brute_force_ips(&pool, LOOKBACK_HOURS, BRUTE_FORCE_THRESHOLD).await? {
        tracing::warn!("Potential brute force attack detected from IP: {}", ip.ip_address);
        let entry = SecurityLogEntry::new("Brute Force Attack Detected", SecurityStatus::Suspicious, &ip.ip_address)
            .details(json!({ "ip_address": ip.ip_address, "failed_logins": ip.count, "check": "automated" }));
        SecurityService::record(&pool, &entry).await?;
        findings += 1;
    }

    for user in SecurityService::inactive_users_with_activity(&pool, LOOKBACK_HOURS).await? {
        tracing::warn!("Inactive user {} has recent activity", user.username);
        let entry = SecurityLogEntry::new("Inactive User Activity", SecurityStatus::Suspicious, SYSTEM_IP)
            .user(Some(user.user_id))
            .details(json!({ "username": user.username, "events": user.count, "check": "automated" }));
        SecurityService::record(&pool, &entry).await?;
        findings += 1;
    }

    for user in SecurityService::users_with_failed_logins(&pool, LOOKBACK_HOURS, FAILED_LOGIN_THRESHOLD).await? {
        tracing::warn!(
            "User {} has {} failed login attempts in the last {LOOKBACK_HOURS} hours",
            user.username,
            user.count
        );
        let entry = SecurityLogEntry::new("Multiple Failed Login Attempts", SecurityStatus::Suspicious, SYSTEM_IP)
            .user(Some(user.user_id))
            .details(json!({ "username": user.username, "attempts": user.count, "check": "automated" }));
        SecurityService::record(&pool, &entry).await?;
        findings += 1;
    }

    tracing::info!(findings, "Security checks completed");
    Ok(())
}
