use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub action: String,
    pub model_name: String,
    pub object_id: String,
    pub details: serde_json::Value,
    pub ip_address: Option<String>,
    pub cqc_can_view: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct AuditLogQuery {
    pub action: Option<String>,
    pub model_name: Option<String>,
    pub user_id: Option<Uuid>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Outcome recorded against a security event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SecurityStatus {
    Success,
    Failed,
    Suspicious,
}

impl SecurityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SecurityStatus::Success => "Success",
            SecurityStatus::Failed => "Failed",
            SecurityStatus::Suspicious => "Suspicious",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SecurityEvent {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub ip_address: String,
    pub user_agent: String,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub status: String,
    pub details: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct SecurityDashboardQuery {
    /// "24h" | "7d" | "30d"
    pub range: Option<String>,
}

/// Hours covered by a dashboard range keyword, 24 h when unknown.
pub fn range_hours(range: Option<&str>) -> i64 {
    match range {
        Some("7d") => 24 * 7,
        Some("30d") => 24 * 30,
        _ => 24,
    }
}

#[derive(Debug, Deserialize)]
pub struct CqcShareRequest {
    pub cqc_can_view: bool,
}

#[derive(Debug, Deserialize)]
pub struct BlockIpRequest {
    pub ip_address: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CqcAccessLog {
    pub id: Uuid,
    pub cqc_member_id: Uuid,
    pub accessed_item_type: String,
    pub accessed_item_id: String,
    pub accessed_item_title: String,
    pub access_date: DateTime<Utc>,
    pub ip_address: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dashboard_ranges() {
        assert_eq!(range_hours(None), 24);
        assert_eq!(range_hours(Some("24h")), 24);
        assert_eq!(range_hours(Some("7d")), 168);
        assert_eq!(range_hours(Some("30d")), 720);
        assert_eq!(range_hours(Some("1y")), 24);
    }
}
