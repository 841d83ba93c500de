use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::audit::{SecurityEvent, SecurityStatus};

pub const BLOCKED_IPS_KEY: &str = "security:blocked_ips";

/// Failed logins from one IP inside this window trigger the brute-force block.
pub const BRUTE_FORCE_WINDOW_SECS: i64 = 300;
pub const BRUTE_FORCE_THRESHOLD: i64 = 5;

/// A security event to record.
#[derive(Debug, Clone)]
pub struct SecurityLogEntry {
    pub user_id:    Option<Uuid>,
    pub ip_address: String,
    pub user_agent: String,
    pub action:     String,
    pub status:     SecurityStatus,
    pub details:    Value,
}

impl SecurityLogEntry {
    pub fn new(action: impl Into<String>, status: SecurityStatus, ip_address: impl Into<String>) -> Self {
        Self {
            user_id: None,
            ip_address: ip_address.into(),
            user_agent: String::new(),
            action: action.into(),
            status,
            details: json!({}),
        }
    }

    pub fn user(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct IpCount {
    pub ip_address: String,
    pub count: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserFailureCount {
    pub user_id: Uuid,
    pub username: String,
    pub count: i64,
}

pub struct SecurityService;

impl SecurityService {
    /// Fire-and-forget variant used on the request path.
    pub fn log(pool: PgPool, entry: SecurityLogEntry) {
        tokio::spawn(async move {
            if let Err(e) = Self::record(&pool, &entry).await {
                tracing::warn!("security log insert failed for {}: {e}", entry.action);
            }
        });
    }

    pub async fn record(pool: &PgPool, entry: &SecurityLogEntry) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO security_log (user_id, ip_address, user_agent, action, status, details)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.user_id)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(&entry.action)
        .bind(entry.status.as_str())
        .bind(&entry.details)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn recent_failed_logins(pool: &PgPool, ip: &str, window_secs: i64) -> anyhow::Result<i64> {
        let since = Utc::now() - Duration::seconds(window_secs);
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM security_log
             WHERE ip_address = $1 AND action = 'Login' AND status = 'Failed' AND timestamp >= $2",
        )
        .bind(ip)
        .bind(since)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    pub async fn dashboard(pool: &PgPool, hours: i64) -> anyhow::Result<Value> {
        let since = Utc::now() - Duration::hours(hours);

        let failed_logins: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM security_log
             WHERE action = 'Login' AND status = 'Failed' AND timestamp >= $1",
        )
        .bind(since)
        .fetch_one(pool)
        .await?;

        let suspicious: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM security_log WHERE status = 'Suspicious' AND timestamp >= $1",
        )
        .bind(since)
        .fetch_one(pool)
        .await?;

        let unique_ips: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT ip_address) FROM security_log WHERE timestamp >= $1",
        )
        .bind(since)
        .fetch_one(pool)
        .await?;

        let top_failing_ips = sqlx::query_as::<_, IpCount>(
            "SELECT ip_address, COUNT(*) AS count FROM security_log
             WHERE status = 'Failed' AND timestamp >= $1
             GROUP BY ip_address ORDER BY count DESC LIMIT 10",
        )
        .bind(since)
        .fetch_all(pool)
        .await?;

        let recent_events = sqlx::query_as::<_, SecurityEvent>(
            "SELECT * FROM security_log WHERE timestamp >= $1 ORDER BY timestamp DESC LIMIT 50",
        )
        .bind(since)
        .fetch_all(pool)
        .await?;

        Ok(json!({
            "range_hours": hours,
            "failed_logins": failed_logins,
            "suspicious_events": suspicious,
            "unique_ips": unique_ips,
            "top_failing_ips": top_failing_ips,
            "recent_events": recent_events,
        }))
    }

    pub async fn investigate_ip(pool: &PgPool, ip: &str) -> anyhow::Result<Value> {
        let events = sqlx::query_as::<_, SecurityEvent>(
            "SELECT * FROM security_log WHERE ip_address = $1 ORDER BY timestamp DESC LIMIT 100",
        )
        .bind(ip)
        .fetch_all(pool)
        .await?;

        let (total, failed, suspicious): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*),
                    COUNT(*) FILTER (WHERE status = 'Failed'),
                    COUNT(*) FILTER (WHERE status = 'Suspicious')
             FROM security_log WHERE ip_address = $1",
        )
        .bind(ip)
        .fetch_one(pool)
        .await?;

        let users: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT u.username FROM security_log s
             JOIN users u ON u.id = s.user_id
             WHERE s.ip_address = $1",
        )
        .bind(ip)
        .fetch_all(pool)
        .await?;

        Ok(json!({
            "ip_address": ip,
            "total_events": total,
            "failed_events": failed,
            "suspicious_events": suspicious,
            "users": users,
            "events": events,
        }))
    }

    /// IPs with at least `threshold` failed logins in the last `hours`.
    pub async fn brute_force_ips(pool: &PgPool, hours: i64, threshold: i64) -> anyhow::Result<Vec<IpCount>> {
        let since = Utc::now() - Duration::hours(hours);
        let rows = sqlx::query_as::<_, IpCount>(
            "SELECT ip_address, COUNT(*) AS count FROM security_log
             WHERE action = 'Login' AND status = 'Failed' AND timestamp >= $1
             GROUP BY ip_address HAVING COUNT(*) >= $2
             ORDER BY count DESC",
        )
        .bind(since)
        .bind(threshold)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// Deactivated accounts that still produced events in the last `hours`.
    pub async fn inactive_users_with_activity(pool: &PgPool, hours: i64) -> anyhow::Result<Vec<UserFailureCount>> {
        let since = Utc::now() - Duration::hours(hours);
        let rows = sqlx::query_as::<_, UserFailureCount>(
            "SELECT u.id AS user_id, u.username, COUNT(*) AS count
             FROM security_log s JOIN users u ON u.id = s.user_id
             WHERE u.is_active = FALSE AND s.timestamp >= $1
             GROUP BY u.id, u.username",
        )
        .bind(since)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    pub async fn users_with_failed_logins(
        pool: &PgPool,
        hours: i64,
        threshold: i64,
    ) -> anyhow::Result<Vec<UserFailureCount>> {
        let since = Utc::now() - Duration::hours(hours);
        let rows = sqlx::query_as::<_, UserFailureCount>(
            "SELECT u.id AS user_id, u.username, COUNT(*) AS count
             FROM security_log s JOIN users u ON u.id = s.user_id
             WHERE s.action = 'Login' AND s.status = 'Failed' AND s.timestamp >= $1
             GROUP BY u.id, u.username HAVING COUNT(*) >= $2",
        )
        .bind(since)
        .bind(threshold)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    // ─── Blocked IPs (Redis set) ─────────────────────────────────────────────

    pub async fn is_blocked(redis: &mut redis::aio::MultiplexedConnection, ip: &str) -> bool {
        let member: Result<bool, _> = redis::cmd("SISMEMBER")
            .arg(BLOCKED_IPS_KEY)
            .arg(ip)
            .query_async(redis)
            .await;
        member.unwrap_or(false)
    }

    pub async fn block_ip(redis: &mut redis::aio::MultiplexedConnection, ip: &str) -> anyhow::Result<bool> {
        let added: i64 = redis::cmd("SADD")
            .arg(BLOCKED_IPS_KEY)
            .arg(ip)
            .query_async(redis)
            .await?;
        Ok(added > 0)
    }

    pub async fn unblock_ip(redis: &mut redis::aio::MultiplexedConnection, ip: &str) -> anyhow::Result<bool> {
        let removed: i64 = redis::cmd("SREM")
            .arg(BLOCKED_IPS_KEY)
            .arg(ip)
            .query_async(redis)
            .await?;
        Ok(removed > 0)
    }

    pub async fn blocked_ips(redis: &mut redis::aio::MultiplexedConnection) -> anyhow::Result<Vec<String>> {
        let mut ips: Vec<String> = redis::cmd("SMEMBERS")
            .arg(BLOCKED_IPS_KEY)
            .query_async(redis)
            .await?;
        ips.sort();
        Ok(ips)
    }
}
