use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const STAFF_PAGE_SIZE: i64 = 20;

/// "ST" followed by six random digits.
pub fn generate_staff_id() -> String {
    format!("ST{}", random_digits(6))
}

/// "CQC" followed by six random digits.
pub fn generate_cqc_id() -> String {
    format!("CQC{}", random_digits(6))
}

fn random_digits(n: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..n).map(|_| char::from(b'0' + rng.gen_range(0..10u8))).collect()
}

pub fn generate_temp_password() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(12)
        .map(char::from)
        .collect()
}

// ---------------------------------------------------------------- departments

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub manager_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDepartmentRequest {
    pub name: String,
    pub description: Option<String>,
    pub manager_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDepartmentRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub manager_id: Option<Uuid>,
}

// ---------------------------------------------------------------------- roles

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub is_management: bool,
    pub can_manage_staff: bool,
    pub can_view_reports: bool,
    pub can_manage_care_plans: bool,
    pub can_manage_medications: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct RoleFlags {
    #[serde(default)]
    pub is_management: bool,
    #[serde(default)]
    pub can_manage_staff: bool,
    #[serde(default)]
    pub can_view_reports: bool,
    #[serde(default)]
    pub can_manage_care_plans: bool,
    #[serde(default)]
    pub can_manage_medications: bool,
}

impl RoleFlags {
    /// A management role always carries every capability.
    pub fn normalised(self) -> Self {
        if self.is_management {
            Self {
                is_management: true,
                can_manage_staff: true,
                can_view_reports: true,
                can_manage_care_plans: true,
                can_manage_medications: true,
            }
        } else {
            self
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(flatten)]
    pub flags: RoleFlags,
}

// -------------------------------------------------------------- staff members

/// Staff member joined with its login account.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StaffMember {
    pub id: Uuid,
    pub user_id: Uuid,
    pub staff_id: String,
    pub photo_path: Option<String>,
    pub phone_number: String,
    pub department_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
    pub position: String,
    pub qualifications: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub emergency_contact_relationship: String,
    pub dbs_check_date: Option<NaiveDate>,
    pub dbs_check_reference: String,
    pub training_records: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl StaffMember {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateStaffRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub phone_number: Option<String>,
    pub department_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
    pub position: String,
    pub qualifications: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relationship: Option<String>,
    pub dbs_check_date: Option<NaiveDate>,
    pub dbs_check_reference: Option<String>,
    pub training_records: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStaffRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub department_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
    pub position: Option<String>,
    pub qualifications: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relationship: Option<String>,
    pub dbs_check_date: Option<NaiveDate>,
    pub dbs_check_reference: Option<String>,
    pub training_records: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct StaffQuery {
    pub search: Option<String>,
    pub department_id: Option<Uuid>,
    /// "active" | "inactive"
    pub status: Option<String>,
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct StaffCreated {
    pub staff_member: StaffMember,
    pub username: String,
    /// Returned once when the password was generated server-side.
    pub temp_password: Option<String>,
    pub credentials_emailed: bool,
}

// ---------------------------------------------------------------- CQC members

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CqcMember {
    pub id: Uuid,
    pub user_id: Uuid,
    pub cqc_id: String,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub can_view_incidents: bool,
    pub incident_view_delay_hours: i32,
    pub can_view_audit_logs: bool,
    pub can_view_care_plans: bool,
    pub can_download_reports: bool,
    pub is_active: bool,
    pub last_access: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCqcMemberRequest {
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub can_view_incidents: Option<bool>,
    pub incident_view_delay_hours: Option<i32>,
    pub can_view_audit_logs: Option<bool>,
    pub can_view_care_plans: Option<bool>,
    pub can_download_reports: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCqcMemberRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub can_view_incidents: Option<bool>,
    pub incident_view_delay_hours: Option<i32>,
    pub can_view_audit_logs: Option<bool>,
    pub can_view_care_plans: Option<bool>,
    pub can_download_reports: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct CqcMemberCreated {
    pub cqc_member: CqcMember,
    pub username: String,
    pub temp_password: String,
    pub credentials_emailed: bool,
}

/// Split "Jane Mary Doe" into ("Jane", "Mary Doe").
pub fn split_name(name: &str) -> (String, String) {
    let mut parts = name.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let rest = parts.collect::<Vec<_>>().join(" ");
    (first, rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn management_role_forces_all_capabilities() {
        let flags = RoleFlags { is_management: true, ..Default::default() }.normalised();
        assert!(flags.can_manage_staff);
        assert!(flags.can_view_reports);
        assert!(flags.can_manage_care_plans);
        assert!(flags.can_manage_medications);
    }

    #[test]
    fn non_management_role_keeps_its_flags() {
        let flags = RoleFlags { can_view_reports: true, ..Default::default() };
        assert_eq!(flags.normalised(), flags);
    }

    #[test]
    fn generated_ids_have_expected_shape() {
        let staff = generate_staff_id();
        assert_eq!(staff.len(), 8);
        assert!(staff.starts_with("ST"));
        assert!(staff[2..].chars().all(|c| c.is_ascii_digit()));

        let cqc = generate_cqc_id();
        assert_eq!(cqc.len(), 9);
        assert!(cqc.starts_with("CQC"));
        assert!(cqc[3..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn temp_password_is_alphanumeric() {
        let pw = generate_temp_password();
        assert_eq!(pw.len(), 12);
        assert!(pw.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn split_name_keeps_middle_names_in_last_name() {
        assert_eq!(split_name("Jane Mary Doe"), ("Jane".into(), "Mary Doe".into()));
        assert_eq!(split_name("Inspector"), ("Inspector".into(), String::new()));
        assert_eq!(split_name(""), (String::new(), String::new()));
    }
}
