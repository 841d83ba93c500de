use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{audit::{AuditLogEntry, AuditLogQuery}, paginate};

/// An audit log entry to record.
pub struct AuditEntry {
    pub user_id:    Option<Uuid>,
    pub action:     &'static str,
    pub model_name: &'static str,
    pub object_id:  String,
    pub details:    Value,
    pub ip_address: String,
}

impl AuditEntry {
    pub fn new(user_id: Uuid, action: &'static str, model_name: &'static str, object_id: impl ToString) -> Self {
        Self {
            user_id: Some(user_id),
            action,
            model_name,
            object_id: object_id.to_string(),
            details: Value::Object(Default::default()),
            ip_address: "unknown".into(),
        }
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn ip(mut self, ip: String) -> Self {
        self.ip_address = ip;
        self
    }
}

/// Fire-and-forget audit log entry.
/// Spawns a background task so the request handler never waits on it;
/// failures are logged as warnings.
pub fn log(pool: PgPool, entry: AuditEntry) {
    tokio::spawn(async move {
        let res = sqlx::query(
            "INSERT INTO audit_log (user_id, action, model_name, object_id, details, ip_address)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.user_id)
        .bind(entry.action)
        .bind(entry.model_name)
        .bind(&entry.object_id)
        .bind(&entry.details)
        .bind(&entry.ip_address)
        .execute(&pool)
        .await;

        if let Err(e) = res {
            tracing::warn!(
                "audit log insert failed for {} {}: {e}",
                entry.model_name,
                entry.object_id
            );
        }
    });
}

const AUDIT_SELECT: &str = "
    SELECT a.id, a.user_id, u.username, a.action, a.model_name, a.object_id,
           a.details, a.ip_address, a.cqc_can_view, a.created_at
    FROM audit_log a
    LEFT JOIN users u ON u.id = a.user_id";

pub struct AuditService;

impl AuditService {
    pub async fn list(pool: &PgPool, q: &AuditLogQuery) -> anyhow::Result<(Vec<AuditLogEntry>, i64)> {
        let (limit, offset) = paginate(q.page, q.per_page);
        let filter = "WHERE ($1::text IS NULL OR a.action = $1)
              AND ($2::text IS NULL OR a.model_name = $2)
              AND ($3::uuid IS NULL OR a.user_id = $3)";

        let entries = sqlx::query_as::<_, AuditLogEntry>(&format!(
            "{AUDIT_SELECT} {filter} ORDER BY a.created_at DESC LIMIT $4 OFFSET $5"
        ))
        .bind(&q.action)
        .bind(&q.model_name)
        .bind(q.user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM audit_log a {filter}"
        ))
        .bind(&q.action)
        .bind(&q.model_name)
        .bind(q.user_id)
        .fetch_one(pool)
        .await?;

        Ok((entries, total))
    }

    /// Entries shared with the regulator, newest first.
    pub async fn list_cqc_visible(pool: &PgPool, limit: i64) -> anyhow::Result<Vec<AuditLogEntry>> {
        let entries = sqlx::query_as::<_, AuditLogEntry>(&format!(
            "{AUDIT_SELECT} WHERE a.cqc_can_view = TRUE ORDER BY a.created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(entries)
    }

    pub async fn set_cqc_can_view(pool: &PgPool, id: Uuid, visible: bool) -> anyhow::Result<Option<AuditLogEntry>> {
        let updated = sqlx::query("UPDATE audit_log SET cqc_can_view = $2 WHERE id = $1")
            .bind(id)
            .bind(visible)
            .execute(pool)
            .await?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        let entry = sqlx::query_as::<_, AuditLogEntry>(&format!("{AUDIT_SELECT} WHERE a.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(entry)
    }
}
