//! Day-to-day care records kept against residents.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::DomainError;

pub const ACTIVITY_TYPES: &[&str] = &[
    "personal_care",
    "meal",
    "social",
    "therapy",
    "medical",
    "outing",
    "exercise",
    "entertainment",
    "religious",
    "other",
];
pub const MEAL_TYPES: &[&str] = &["breakfast", "lunch", "dinner", "supper", "snack"];
pub const INCIDENT_TYPES: &[&str] = &[
    "fall",
    "aggression",
    "wandering",
    "medication_error",
    "injury",
    "skin_integrity",
    "choking",
    "other",
];
pub const SEVERITIES: &[&str] = &["low", "medium", "high", "critical"];
pub const APPOINTMENT_TYPES: &[&str] = &["medical", "dental", "therapy", "social", "other"];

/// Unwrap a field required on create.
pub fn required<T>(value: Option<T>, field: &str) -> Result<T, DomainError> {
    value.ok_or_else(|| DomainError::Validation(format!("{field} is required")))
}

pub fn check_choice(value: &str, allowed: &[&str], field: &str) -> Result<(), DomainError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(DomainError::Validation(format!("Invalid {field}: {value}")))
    }
}

/// Filters shared by the operational record listings.
#[derive(Debug, Default, Deserialize)]
pub struct RecordQuery {
    pub service_user_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Activity, incident or appointment type.
    pub kind: Option<String>,
    pub severity: Option<String>,
    pub follow_up_required: Option<bool>,
    pub upcoming: Option<bool>,
    pub is_completed: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

// ----------------------------------------------------------------- activities

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Activity {
    pub id: Uuid,
    pub service_user_id: Uuid,
    pub activity_type: String,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub location: String,
    pub staff_involved: Vec<Uuid>,
    pub meal_type: Option<String>,
    pub food_consumed: String,
    pub fluid_intake: Option<i32>,
    pub appetite_level: Option<i32>,
    pub provider: String,
    pub notes: String,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityRequest {
    pub service_user_id: Option<Uuid>,
    pub activity_type: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub location: Option<String>,
    pub staff_involved: Option<Vec<Uuid>>,
    pub meal_type: Option<String>,
    pub food_consumed: Option<String>,
    pub fluid_intake: Option<i32>,
    pub appetite_level: Option<i32>,
    pub provider: Option<String>,
    pub notes: Option<String>,
    pub is_completed: Option<bool>,
}

impl ActivityRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(kind) = self.activity_type.as_deref() {
            check_choice(kind, ACTIVITY_TYPES, "activity_type")?;
        }
        if let Some(meal) = self.meal_type.as_deref() {
            check_choice(meal, MEAL_TYPES, "meal_type")?;
        }
        if let Some(level) = self.appetite_level {
            if !(1..=5).contains(&level) {
                return Err(DomainError::Validation("appetite_level must be between 1 and 5".into()));
            }
        }
        if matches!(self.fluid_intake, Some(ml) if ml < 0) {
            return Err(DomainError::Validation("fluid_intake cannot be negative".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ActivityPhoto {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub photo_path: String,
    pub caption: String,
    pub uploaded_at: DateTime<Utc>,
}

// ------------------------------------------------------------------ incidents

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Incident {
    pub id: Uuid,
    pub service_user_id: Uuid,
    pub incident_type: String,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub location: String,
    pub severity: String,
    pub staff_involved: Vec<Uuid>,
    pub witnesses: String,
    pub actions_taken: String,
    pub follow_up_required: bool,
    pub follow_up_notes: String,
    pub reported_to_family: bool,
    pub family_notification_details: String,
    pub antecedent: String,
    pub behavior: String,
    pub consequence: String,
    pub cqc_can_view: bool,
    pub cqc_viewable_after: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

impl Incident {
    pub fn is_viewable_by_cqc(&self, now: DateTime<Utc>) -> bool {
        self.cqc_can_view && now >= self.cqc_viewable_after
    }
}

/// Default release time for a new incident.
pub fn default_cqc_viewable_after(now: DateTime<Utc>, delay_hours: i64) -> DateTime<Utc> {
    now + Duration::hours(delay_hours)
}

#[derive(Debug, Deserialize)]
pub struct IncidentRequest {
    pub service_user_id: Option<Uuid>,
    pub incident_type: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub location: Option<String>,
    pub severity: Option<String>,
    pub staff_involved: Option<Vec<Uuid>>,
    pub witnesses: Option<String>,
    pub actions_taken: Option<String>,
    pub follow_up_required: Option<bool>,
    pub follow_up_notes: Option<String>,
    pub reported_to_family: Option<bool>,
    pub family_notification_details: Option<String>,
    pub antecedent: Option<String>,
    pub behavior: Option<String>,
    pub consequence: Option<String>,
    pub cqc_can_view: Option<bool>,
    pub cqc_viewable_after: Option<DateTime<Utc>>,
}

impl IncidentRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(kind) = self.incident_type.as_deref() {
            check_choice(kind, INCIDENT_TYPES, "incident_type")?;
        }
        if let Some(sev) = self.severity.as_deref() {
            check_choice(sev, SEVERITIES, "severity")?;
        }
        Ok(())
    }
}

// --------------------------------------------------------------- appointments

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Appointment {
    pub id: Uuid,
    pub service_user_id: Uuid,
    pub appointment_type: String,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub location: String,
    pub provider: String,
    pub staff_accompanying: Vec<Uuid>,
    pub notes: String,
    pub is_completed: bool,
    pub transport_arranged: bool,
    pub transport_details: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentRequest {
    pub service_user_id: Option<Uuid>,
    pub appointment_type: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub location: Option<String>,
    pub provider: Option<String>,
    pub staff_accompanying: Option<Vec<Uuid>>,
    pub notes: Option<String>,
    pub transport_arranged: Option<bool>,
    pub transport_details: Option<String>,
}

impl AppointmentRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(kind) = self.appointment_type.as_deref() {
            check_choice(kind, APPOINTMENT_TYPES, "appointment_type")?;
        }
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if end < start {
                return Err(DomainError::Validation("end_time is before start_time".into()));
            }
        }
        Ok(())
    }
}

// ------------------------------------------------------------------- visitors

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Visitor {
    pub id: Uuid,
    pub service_user_id: Uuid,
    pub visitor_name: String,
    pub relationship: String,
    pub phone_number: String,
    pub visit_date: NaiveDate,
    pub arrival_time: NaiveTime,
    pub departure_time: Option<NaiveTime>,
    pub purpose: String,
    pub notes: String,
    pub covid_screening_passed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VisitDuration {
    pub hours: i64,
    pub minutes: i64,
}

impl Visitor {
    pub fn visit_duration(&self) -> Option<VisitDuration> {
        Some(visit_duration(self.arrival_time, self.departure_time?))
    }
}

/// Departure earlier than arrival means the visit ran past midnight.
pub fn visit_duration(arrival: NaiveTime, departure: NaiveTime) -> VisitDuration {
    let mut elapsed = departure.signed_duration_since(arrival);
    if elapsed < Duration::zero() {
        elapsed += Duration::days(1);
    }
    let minutes = elapsed.num_minutes();
    VisitDuration { hours: minutes / 60, minutes: minutes % 60 }
}

#[derive(Debug, Deserialize)]
pub struct VisitorRequest {
    pub service_user_id: Option<Uuid>,
    pub visitor_name: Option<String>,
    pub relationship: Option<String>,
    pub phone_number: Option<String>,
    pub visit_date: Option<NaiveDate>,
    pub arrival_time: Option<NaiveTime>,
    pub departure_time: Option<NaiveTime>,
    pub purpose: Option<String>,
    pub notes: Option<String>,
    pub covid_screening_passed: Option<bool>,
}

// ---------------------------------------------------------------------- trips

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Trip {
    pub id: Uuid,
    pub service_user_ids: Vec<Uuid>,
    pub destination: String,
    pub purpose: String,
    pub date: NaiveDate,
    pub departure_time: NaiveTime,
    pub return_time: Option<NaiveTime>,
    pub staff_accompanying: Vec<Uuid>,
    pub notes: String,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,
    pub risk_assessment_completed: bool,
    pub risk_assessment_details: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct TripRequest {
    pub service_user_ids: Option<Vec<Uuid>>,
    pub destination: Option<String>,
    pub purpose: Option<String>,
    pub date: Option<NaiveDate>,
    pub departure_time: Option<NaiveTime>,
    pub return_time: Option<NaiveTime>,
    pub staff_accompanying: Option<Vec<Uuid>>,
    pub notes: Option<String>,
    pub estimated_cost: Option<f64>,
    pub actual_cost: Option<f64>,
    pub risk_assessment_completed: Option<bool>,
    pub risk_assessment_details: Option<String>,
}

impl TripRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        if matches!(&self.service_user_ids, Some(ids) if ids.is_empty()) {
            return Err(DomainError::Validation("A trip needs at least one resident".into()));
        }
        if matches!(self.estimated_cost, Some(c) if c < 0.0)
            || matches!(self.actual_cost, Some(c) if c < 0.0)
        {
            return Err(DomainError::Validation("Costs cannot be negative".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------- vital signs

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct VitalSigns {
    pub id: Uuid,
    pub service_user_id: Uuid,
    pub recorded_by: Uuid,
    pub recorded_date: NaiveDate,
    pub recorded_time: NaiveTime,
    pub temperature: Option<f64>,
    pub pulse: Option<i32>,
    pub respiratory_rate: Option<i32>,
    pub blood_pressure_systolic: Option<i32>,
    pub blood_pressure_diastolic: Option<i32>,
    pub oxygen_saturation: Option<i32>,
    pub blood_glucose: Option<f64>,
    pub pain_level: Option<i32>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct VitalSignsRequest {
    pub service_user_id: Option<Uuid>,
    pub recorded_date: Option<NaiveDate>,
    pub recorded_time: Option<NaiveTime>,
    pub temperature: Option<f64>,
    pub pulse: Option<i32>,
    pub respiratory_rate: Option<i32>,
    pub blood_pressure_systolic: Option<i32>,
    pub blood_pressure_diastolic: Option<i32>,
    pub oxygen_saturation: Option<i32>,
    pub blood_glucose: Option<f64>,
    pub pain_level: Option<i32>,
    pub notes: Option<String>,
}

impl VitalSignsRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        if matches!(self.oxygen_saturation, Some(v) if !(0..=100).contains(&v)) {
            return Err(DomainError::Validation("oxygen_saturation must be between 0 and 100".into()));
        }
        if matches!(self.pain_level, Some(v) if !(0..=10).contains(&v)) {
            return Err(DomainError::Validation("pain_level must be between 0 and 10".into()));
        }
        for (field, value) in [
            ("pulse", self.pulse),
            ("respiratory_rate", self.respiratory_rate),
            ("blood_pressure_systolic", self.blood_pressure_systolic),
            ("blood_pressure_diastolic", self.blood_pressure_diastolic),
        ] {
            if matches!(value, Some(v) if v < 0) {
                return Err(DomainError::Validation(format!("{field} cannot be negative")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn visit_duration_same_day() {
        assert_eq!(
            visit_duration(t(14, 15), t(16, 45)),
            VisitDuration { hours: 2, minutes: 30 }
        );
    }

    #[test]
    fn visit_duration_wraps_past_midnight() {
        assert_eq!(
            visit_duration(t(22, 30), t(1, 0)),
            VisitDuration { hours: 2, minutes: 30 }
        );
    }

    #[test]
    fn incident_hidden_from_cqc_until_release() {
        let now = Utc::now();
        let mut incident_visible_after = default_cqc_viewable_after(now, 48);
        assert!(incident_visible_after > now);
        incident_visible_after = now - Duration::minutes(1);
        let incident = Incident {
            id: Uuid::new_v4(),
            service_user_id: Uuid::new_v4(),
            incident_type: "fall".into(),
            title: "Fall in lounge".into(),
            description: String::new(),
            date: now.date_naive(),
            time: t(10, 0),
            location: "Lounge".into(),
            severity: "low".into(),
            staff_involved: vec![],
            witnesses: String::new(),
            actions_taken: String::new(),
            follow_up_required: false,
            follow_up_notes: String::new(),
            reported_to_family: false,
            family_notification_details: String::new(),
            antecedent: String::new(),
            behavior: String::new(),
            consequence: String::new(),
            cqc_can_view: true,
            cqc_viewable_after: incident_visible_after,
            created_at: now,
            updated_at: now,
            created_by: None,
            updated_by: None,
        };
        assert!(incident.is_viewable_by_cqc(now));
        assert!(!incident.is_viewable_by_cqc(now - Duration::hours(1)));

        let hidden = Incident { cqc_can_view: false, ..incident };
        assert!(!hidden.is_viewable_by_cqc(now));
    }

    #[test]
    fn vitals_reject_out_of_range_saturation_and_pain() {
        let mut req = VitalSignsRequest {
            service_user_id: None,
            recorded_date: None,
            recorded_time: None,
            temperature: Some(36.8),
            pulse: Some(72),
            respiratory_rate: None,
            blood_pressure_systolic: None,
            blood_pressure_diastolic: None,
            oxygen_saturation: Some(101),
            blood_glucose: None,
            pain_level: Some(3),
            notes: None,
        };
        assert!(req.validate().is_err());
        req.oxygen_saturation = Some(97);
        assert!(req.validate().is_ok());
        req.pain_level = Some(11);
        assert!(req.validate().is_err());
    }

    #[test]
    fn appetite_level_is_one_to_five() {
        let req: ActivityRequest = serde_json::from_value(serde_json::json!({
            "activity_type": "meal",
            "meal_type": "lunch",
            "appetite_level": 6
        }))
        .unwrap();
        assert!(req.validate().is_err());
    }
}
