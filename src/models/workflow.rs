use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::DomainError;
use crate::models::records::check_choice;

pub const SHIFT_TYPES: &[&str] = &["morning", "evening", "night", "long_day"];
pub const HANDOVER_PRIORITIES: &[&str] = &["low", "medium", "high"];
pub const NOTE_PRIORITIES: &[&str] = &["low", "medium", "high", "urgent"];
pub const GOVERNANCE_TYPES: &[&str] = &[
    "policy",
    "audit",
    "complaint",
    "compliment",
    "incident",
    "training",
    "meeting",
    "other",
];

// --------------------------------------------------------------------- shifts

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StaffShift {
    pub id: Uuid,
    pub staff_member_id: Uuid,
    pub shift_date: NaiveDate,
    pub shift_type: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub notes: String,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ShiftRequest {
    pub staff_member_id: Option<Uuid>,
    pub shift_date: Option<NaiveDate>,
    pub shift_type: Option<String>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub notes: Option<String>,
}

impl ShiftRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(kind) = self.shift_type.as_deref() {
            check_choice(kind, SHIFT_TYPES, "shift_type")?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct ShiftQuery {
    pub staff_member_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

// ------------------------------------------------------------ daily summaries

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DailySummary {
    pub id: Uuid,
    pub shift_id: Uuid,
    pub service_users_present: Vec<Uuid>,
    pub general_observations: String,
    pub issues_concerns: String,
    pub positive_events: String,
    pub tasks_completed: String,
    pub tasks_pending: String,
    pub handover_notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct DailySummaryRequest {
    pub shift_id: Option<Uuid>,
    pub service_users_present: Option<Vec<Uuid>>,
    pub general_observations: Option<String>,
    pub issues_concerns: Option<String>,
    pub positive_events: Option<String>,
    pub tasks_completed: Option<String>,
    pub tasks_pending: Option<String>,
    pub handover_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DailySummaryQuery {
    pub service_user_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

// ----------------------------------------------------------- staff handovers

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StaffHandover {
    pub id: Uuid,
    pub handed_over_by: Uuid,
    pub handed_over_to: Uuid,
    pub shift_date: NaiveDate,
    pub shift_type: String,
    pub service_users_covered: Vec<Uuid>,
    pub general_notes: String,
    pub tasks_completed: String,
    pub tasks_pending: String,
    pub urgent_issues: String,
    pub priority: String,
    pub medications_administered: String,
    pub medications_due: String,
    pub incidents_occurred: String,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct StaffHandoverRequest {
    pub handed_over_to: Option<Uuid>,
    pub shift_date: Option<NaiveDate>,
    pub shift_type: Option<String>,
    pub service_users_covered: Option<Vec<Uuid>>,
    pub general_notes: Option<String>,
    pub tasks_completed: Option<String>,
    pub tasks_pending: Option<String>,
    pub urgent_issues: Option<String>,
    pub priority: Option<String>,
    pub medications_administered: Option<String>,
    pub medications_due: Option<String>,
    pub incidents_occurred: Option<String>,
}

impl StaffHandoverRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(kind) = self.shift_type.as_deref() {
            check_choice(kind, SHIFT_TYPES, "shift_type")?;
        }
        if let Some(p) = self.priority.as_deref() {
            check_choice(p, HANDOVER_PRIORITIES, "priority")?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct HandoverQuery {
    pub date: Option<NaiveDate>,
    /// "received" | "given"; defaults to both for the caller.
    pub direction: Option<String>,
    pub acknowledged: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

// ------------------------------------------------------ management daily notes

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ManagementDailyNote {
    pub id: Uuid,
    pub title: String,
    pub note: String,
    pub priority: String,
    pub related_department_id: Option<Uuid>,
    pub related_service_user_id: Option<Uuid>,
    pub related_staff_id: Option<Uuid>,
    pub action_required: bool,
    pub action_details: String,
    pub action_deadline: Option<NaiveDate>,
    pub is_resolved: bool,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ManagementNoteRequest {
    pub title: Option<String>,
    pub note: Option<String>,
    pub priority: Option<String>,
    pub related_department_id: Option<Uuid>,
    pub related_service_user_id: Option<Uuid>,
    pub related_staff_id: Option<Uuid>,
    pub action_required: Option<bool>,
    pub action_details: Option<String>,
    pub action_deadline: Option<NaiveDate>,
}

impl ManagementNoteRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(p) = self.priority.as_deref() {
            check_choice(p, NOTE_PRIORITIES, "priority")?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct ResolveNoteRequest {
    pub resolution_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ManagementNoteQuery {
    pub priority: Option<String>,
    pub is_resolved: Option<bool>,
    pub action_required: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

// ------------------------------------------------------ management handovers

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ManagementHandover {
    pub id: Uuid,
    pub handed_over_by: Uuid,
    pub handed_over_to: Uuid,
    pub handover_date: NaiveDate,
    pub notes: String,
    pub urgent_matters: String,
    pub follow_up_required: String,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ManagementHandoverRequest {
    pub handed_over_to: Option<Uuid>,
    pub handover_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub urgent_matters: Option<String>,
    pub follow_up_required: Option<String>,
}

// ------------------------------------------------------- governance records

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct GovernanceRecord {
    pub id: Uuid,
    pub priority: String,
    pub title: String,
    pub record_type: String,
    pub description: String,
    pub date_occurred: NaiveDate,
    pub date_recorded: NaiveDate,
    pub related_department_id: Option<Uuid>,
    pub related_service_user_id: Option<Uuid>,
    pub related_staff_id: Option<Uuid>,
    pub actions_taken: String,
    pub follow_up_required: bool,
    pub follow_up_details: String,
    pub follow_up_actions: String,
    pub outcome: String,
    pub notes: String,
    pub is_confidential: bool,
    pub document_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct GovernanceRequest {
    pub priority: Option<String>,
    pub title: Option<String>,
    pub record_type: Option<String>,
    pub description: Option<String>,
    pub date_occurred: Option<NaiveDate>,
    pub date_recorded: Option<NaiveDate>,
    pub related_department_id: Option<Uuid>,
    pub related_service_user_id: Option<Uuid>,
    pub related_staff_id: Option<Uuid>,
    pub actions_taken: Option<String>,
    pub follow_up_required: Option<bool>,
    pub follow_up_details: Option<String>,
    pub follow_up_actions: Option<String>,
    pub outcome: Option<String>,
    pub notes: Option<String>,
    pub is_confidential: Option<bool>,
    pub document_ids: Option<Vec<Uuid>>,
}

impl GovernanceRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(kind) = self.record_type.as_deref() {
            check_choice(kind, GOVERNANCE_TYPES, "record_type")?;
        }
        if let Some(p) = self.priority.as_deref() {
            check_choice(p, HANDOVER_PRIORITIES, "priority")?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct GovernanceQuery {
    pub record_type: Option<String>,
    pub follow_up_required: Option<bool>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Whether the handover may be acknowledged by `staff_member_id`.
pub fn may_acknowledge(recipient: Uuid, staff_member_id: Option<Uuid>, is_management: bool) -> bool {
    is_management || staff_member_id == Some(recipient)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_recipient_or_management_acknowledges() {
        let recipient = Uuid::new_v4();
        assert!(may_acknowledge(recipient, Some(recipient), false));
        assert!(may_acknowledge(recipient, None, true));
        assert!(!may_acknowledge(recipient, Some(Uuid::new_v4()), false));
        assert!(!may_acknowledge(recipient, None, false));
    }

    #[test]
    fn unknown_shift_type_is_rejected() {
        let req = ShiftRequest {
            staff_member_id: None,
            shift_date: None,
            shift_type: Some("afternoon".into()),
            start_time: None,
            end_time: None,
            notes: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn governance_record_types() {
        for kind in GOVERNANCE_TYPES {
            assert!(check_choice(kind, GOVERNANCE_TYPES, "record_type").is_ok());
        }
        assert!(check_choice("memo", GOVERNANCE_TYPES, "record_type").is_err());
    }
}
