use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const GENDERS: &[&str] = &["M", "F", "O", "U"];
pub const MARITAL_STATUSES: &[&str] = &["single", "married", "divorced", "widowed", "separated"];

/// A resident of the home.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ServiceUser {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub marital_status: String,
    pub photo_path: Option<String>,
    pub bio: String,
    pub admission_date: NaiveDate,
    pub room_number: String,
    pub bed_number: String,
    pub email: String,
    pub phone_number: String,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub emergency_contact_relationship: String,
    pub emergency_contact_address: String,
    pub next_of_kin_name: String,
    pub next_of_kin_phone: String,
    pub next_of_kin_relationship: String,
    pub is_active: bool,
    pub discharge_date: Option<NaiveDate>,
    pub discharge_reason: String,
    pub allergies: String,
    pub medical_conditions: String,
    pub special_requirements: String,
    pub dietary_restrictions: String,
    pub mobility_requirements: String,
    pub communication_needs: String,
    pub has_advanced_directive: bool,
    pub advanced_directive_details: String,
    pub has_power_of_attorney: bool,
    pub power_of_attorney_details: String,
    pub funding_source: String,
    pub key_worker_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

impl ServiceUser {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn age(&self, today: NaiveDate) -> i32 {
        age_on(self.date_of_birth, today)
    }
}

/// Completed years between `dob` and `today`.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut years = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }
    years
}

#[derive(Debug, Deserialize)]
pub struct CreateServiceUserRequest {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub marital_status: Option<String>,
    pub bio: Option<String>,
    pub admission_date: NaiveDate,
    pub room_number: String,
    pub bed_number: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub emergency_contact_relationship: String,
    pub emergency_contact_address: Option<String>,
    pub next_of_kin_name: Option<String>,
    pub next_of_kin_phone: Option<String>,
    pub next_of_kin_relationship: Option<String>,
    pub allergies: Option<String>,
    pub medical_conditions: Option<String>,
    pub special_requirements: Option<String>,
    pub dietary_restrictions: Option<String>,
    pub mobility_requirements: Option<String>,
    pub communication_needs: Option<String>,
    pub has_advanced_directive: Option<bool>,
    pub advanced_directive_details: Option<String>,
    pub has_power_of_attorney: Option<bool>,
    pub power_of_attorney_details: Option<String>,
    pub funding_source: Option<String>,
    pub key_worker_id: Option<Uuid>,
}

impl CreateServiceUserRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err("first_name and last_name are required".into());
        }
        if !GENDERS.contains(&self.gender.as_str()) {
            return Err(format!("Invalid gender: {}", self.gender));
        }
        if let Some(ms) = self.marital_status.as_deref() {
            if !ms.is_empty() && !MARITAL_STATUSES.contains(&ms) {
                return Err(format!("Invalid marital_status: {ms}"));
            }
        }
        if self.room_number.trim().is_empty() {
            return Err("room_number is required".into());
        }
        if self.date_of_birth > self.admission_date {
            return Err("date_of_birth cannot be after admission_date".into());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateServiceUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub marital_status: Option<String>,
    pub bio: Option<String>,
    pub admission_date: Option<NaiveDate>,
    pub room_number: Option<String>,
    pub bed_number: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub emergency_contact_relationship: Option<String>,
    pub emergency_contact_address: Option<String>,
    pub next_of_kin_name: Option<String>,
    pub next_of_kin_phone: Option<String>,
    pub next_of_kin_relationship: Option<String>,
    pub discharge_date: Option<NaiveDate>,
    pub discharge_reason: Option<String>,
    pub allergies: Option<String>,
    pub medical_conditions: Option<String>,
    pub special_requirements: Option<String>,
    pub dietary_restrictions: Option<String>,
    pub mobility_requirements: Option<String>,
    pub communication_needs: Option<String>,
    pub has_advanced_directive: Option<bool>,
    pub advanced_directive_details: Option<String>,
    pub has_power_of_attorney: Option<bool>,
    pub power_of_attorney_details: Option<String>,
    pub funding_source: Option<String>,
    pub key_worker_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceUserQuery {
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub key_worker_id: Option<Uuid>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn age_counts_completed_years() {
        assert_eq!(age_on(d(1940, 6, 15), d(2024, 6, 14)), 83);
        assert_eq!(age_on(d(1940, 6, 15), d(2024, 6, 15)), 84);
        assert_eq!(age_on(d(1940, 2, 29), d(2023, 2, 28)), 82);
    }

    #[test]
    fn create_request_rejects_unknown_gender() {
        let req: CreateServiceUserRequest = serde_json::from_value(serde_json::json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "date_of_birth": "1940-01-01",
            "gender": "X",
            "admission_date": "2024-01-01",
            "room_number": "12",
            "emergency_contact_name": "Byron",
            "emergency_contact_phone": "0123",
            "emergency_contact_relationship": "Father"
        }))
        .unwrap();
        assert!(req.validate().is_err());
    }
}
