use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::DomainError;

pub const MEDICATION_TYPES: &[&str] = &[
    "tablet", "capsule", "liquid", "injection", "inhaler", "topical", "patch", "drops", "other",
];

pub const FREQUENCIES: &[&str] = &[
    "once_daily",
    "twice_daily",
    "three_times_daily",
    "four_times_daily",
    "prn",
    "other",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePeriod {
    Morning,
    Afternoon,
    Evening,
    Night,
    Prn,
}

impl TimePeriod {
    pub const TIMED: [TimePeriod; 4] = [
        TimePeriod::Morning,
        TimePeriod::Afternoon,
        TimePeriod::Evening,
        TimePeriod::Night,
    ];

    pub fn default_time(self) -> Option<NaiveTime> {
        let hour = match self {
            TimePeriod::Morning => 8,
            TimePeriod::Afternoon => 13,
            TimePeriod::Evening => 18,
            TimePeriod::Night => 22,
            TimePeriod::Prn => return None,
        };
        NaiveTime::from_hms_opt(hour, 0, 0)
    }

    /// Dashboard period for a wall-clock hour: 06-12 morning, 12-17
    /// afternoon, 17-22 evening, anything else night.
    pub fn current(hour: u32) -> TimePeriod {
        match hour {
            6..=11 => TimePeriod::Morning,
            12..=16 => TimePeriod::Afternoon,
            17..=21 => TimePeriod::Evening,
            _ => TimePeriod::Night,
        }
    }
}

impl std::fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TimePeriod::Morning => "morning",
            TimePeriod::Afternoon => "afternoon",
            TimePeriod::Evening => "evening",
            TimePeriod::Night => "night",
            TimePeriod::Prn => "prn",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MedicationStatus {
    Inactive,
    OutOfStock,
    Due,
    Ok,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdministrationStatus {
    Given,
    Refused,
    Omitted,
    Held,
}

impl std::fmt::Display for AdministrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AdministrationStatus::Given => "given",
            AdministrationStatus::Refused => "refused",
            AdministrationStatus::Omitted => "omitted",
            AdministrationStatus::Held => "held",
        };
        write!(f, "{s}")
    }
}

/// One entry of a medication's daily schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledDose {
    pub period: TimePeriod,
    pub time: Option<NaiveTime>,
    pub dosage: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Medication {
    pub id: Uuid,
    pub service_user_id: Uuid,
    pub name: String,
    pub medication_type: String,
    pub dosage: String,
    pub frequency: String,
    pub administer_morning: bool,
    pub morning_time: Option<NaiveTime>,
    pub morning_dosage: String,
    pub administer_afternoon: bool,
    pub afternoon_time: Option<NaiveTime>,
    pub afternoon_dosage: String,
    pub administer_evening: bool,
    pub evening_time: Option<NaiveTime>,
    pub evening_dosage: String,
    pub administer_night: bool,
    pub night_time: Option<NaiveTime>,
    pub night_dosage: String,
    pub administer_prn: bool,
    pub prn_instructions: String,
    pub prn_max_daily: i32,
    pub route: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub prescribed_by: String,
    pub reason: String,
    pub is_controlled_drug: bool,
    pub total_quantity: i32,
    pub current_balance: i32,
    pub instructions: String,
    pub is_active: bool,
    pub last_administered: Option<DateTime<Utc>>,
    pub next_due_time: Option<DateTime<Utc>>,
    pub requires_refrigeration: bool,
    pub special_handling: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

impl Medication {
    fn slot(&self, period: TimePeriod) -> Option<(Option<NaiveTime>, &str)> {
        let (enabled, time, dosage) = match period {
            TimePeriod::Morning => (self.administer_morning, self.morning_time, &self.morning_dosage),
            TimePeriod::Afternoon => {
                (self.administer_afternoon, self.afternoon_time, &self.afternoon_dosage)
            }
            TimePeriod::Evening => (self.administer_evening, self.evening_time, &self.evening_dosage),
            TimePeriod::Night => (self.administer_night, self.night_time, &self.night_dosage),
            TimePeriod::Prn => (self.administer_prn, None, &self.dosage),
        };
        enabled.then(|| {
            let time = time.or_else(|| period.default_time());
            let dosage = if dosage.is_empty() { self.dosage.as_str() } else { dosage.as_str() };
            (time, dosage)
        })
    }

    /// Schedule ordered morning, afternoon, evening, night, PRN.
    pub fn time_periods(&self) -> Vec<ScheduledDose> {
        TimePeriod::TIMED
            .iter()
            .chain(std::iter::once(&TimePeriod::Prn))
            .filter_map(|&period| {
                self.slot(period).map(|(time, dosage)| ScheduledDose {
                    period,
                    time,
                    dosage: dosage.to_string(),
                })
            })
            .collect()
    }

    pub fn is_scheduled_in(&self, period: TimePeriod) -> bool {
        self.slot(period).is_some()
    }

    /// Times of the enabled timed slots, earliest first.
    pub fn slot_times(&self) -> Vec<NaiveTime> {
        let mut times: Vec<NaiveTime> = TimePeriod::TIMED
            .iter()
            .filter_map(|&p| self.slot(p).and_then(|(time, _)| time))
            .collect();
        times.sort();
        times
    }

    pub fn is_prn_only(&self) -> bool {
        self.administer_prn && self.slot_times().is_empty()
    }

    /// Whether the prescription covers `date`.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && self.end_date.map_or(true, |end| date <= end)
    }

    /// Next scheduled dose after `now` (local wall-clock time).
    pub fn next_due_time(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        if !self.is_active {
            return None;
        }
        let times = self.slot_times();
        let today = now.date();
        if let Some(t) = times.iter().find(|&&t| t > now.time()) {
            return Some(today.and_time(*t));
        }
        let first = times.first()?;
        Some((today + Duration::days(1)).and_time(*first))
    }

    /// Number of timed slots on `date` that should have been given by `now`.
    fn slots_due_on(&self, date: NaiveDate, now: NaiveDateTime) -> i64 {
        if !self.covers(date) || date > now.date() {
            return 0;
        }
        let times = self.slot_times();
        if date < now.date() {
            return times.len() as i64;
        }
        times.iter().filter(|&&t| t <= now.time()).count() as i64
    }

    pub fn status(&self, now: NaiveDateTime, given_today: i64) -> MedicationStatus {
        if !self.is_active {
            MedicationStatus::Inactive
        } else if self.current_balance <= 0 {
            MedicationStatus::OutOfStock
        } else if self.slots_due_on(now.date(), now) > given_today {
            MedicationStatus::Due
        } else {
            MedicationStatus::Ok
        }
    }

    /// Timed doses not covered by a "given" administration between `start`
    /// and `end` inclusive. `given_per_day` holds the given count per date.
    /// Slots later than `now` are not yet missed and PRN never counts.
    pub fn missed_doses(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        now: NaiveDateTime,
        given_per_day: &HashMap<NaiveDate, i64>,
    ) -> i64 {
        if !self.is_active {
            return 0;
        }
        let last = end.min(now.date());
        let mut missed = 0;
        let mut day = start;
        while day <= last {
            let due = self.slots_due_on(day, now);
            let given = given_per_day.get(&day).copied().unwrap_or(0);
            missed += (due - given).max(0);
            day = match day.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        missed
    }

    pub fn is_low_stock(&self, threshold: i32) -> bool {
        self.current_balance <= threshold
    }

    /// At or below a quarter of the prescribed quantity.
    pub fn is_below_quarter(&self) -> bool {
        i64::from(self.current_balance) * 4 <= i64::from(self.total_quantity)
    }

    /// Next timed dose falls within `minutes` of `now`.
    pub fn is_due_within(&self, now: NaiveDateTime, minutes: i64) -> bool {
        self.next_due_time(now)
            .is_some_and(|due| due <= now + Duration::minutes(minutes))
    }

    /// Checks that do not need the database. The witness's identity and
    /// password are verified by the caller.
    pub fn check_administration(
        &self,
        status: AdministrationStatus,
        dose: i32,
        has_witness: bool,
    ) -> Result<(), DomainError> {
        if !self.is_active {
            return Err(DomainError::Validation("Medication is not active".into()));
        }
        if status != AdministrationStatus::Given {
            return Ok(());
        }
        if dose <= 0 {
            return Err(DomainError::Validation("Dose administered must be positive".into()));
        }
        if dose > self.current_balance {
            return Err(DomainError::InsufficientBalance {
                requested: dose,
                available: self.current_balance,
            });
        }
        if self.is_controlled_drug && !has_witness {
            return Err(DomainError::WitnessRequired);
        }
        Ok(())
    }
}

/// Witness rules that do not need the database: someone other than the
/// administering member, an active staff account and a non-empty password.
/// `witness_active` is None when no staff member has the given id.
pub fn check_witness<'a>(
    administered_by: Uuid,
    witness_id: Uuid,
    witness_active: Option<bool>,
    password: Option<&'a str>,
) -> Result<&'a str, DomainError> {
    if witness_id == administered_by {
        return Err(DomainError::InvalidWitness(
            "The witness must be a different staff member.".into(),
        ));
    }
    match witness_active {
        None => return Err(DomainError::InvalidWitness("Witness not found.".into())),
        Some(false) => {
            return Err(DomainError::InvalidWitness(
                "Witness is not an active staff member.".into(),
            ))
        }
        Some(true) => {}
    }
    password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| DomainError::InvalidWitness("Witness password is required.".into()))
}

#[derive(Debug, Deserialize)]
pub struct CreateMedicationRequest {
    pub service_user_id: Uuid,
    pub name: String,
    pub medication_type: String,
    pub dosage: String,
    pub frequency: Option<String>,
    #[serde(default)]
    pub administer_morning: bool,
    pub morning_time: Option<NaiveTime>,
    pub morning_dosage: Option<String>,
    #[serde(default)]
    pub administer_afternoon: bool,
    pub afternoon_time: Option<NaiveTime>,
    pub afternoon_dosage: Option<String>,
    #[serde(default)]
    pub administer_evening: bool,
    pub evening_time: Option<NaiveTime>,
    pub evening_dosage: Option<String>,
    #[serde(default)]
    pub administer_night: bool,
    pub night_time: Option<NaiveTime>,
    pub night_dosage: Option<String>,
    #[serde(default)]
    pub administer_prn: bool,
    pub prn_instructions: Option<String>,
    pub prn_max_daily: Option<i32>,
    pub route: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub prescribed_by: String,
    pub reason: Option<String>,
    #[serde(default)]
    pub is_controlled_drug: bool,
    pub total_quantity: i32,
    pub instructions: Option<String>,
    #[serde(default)]
    pub requires_refrigeration: bool,
    pub special_handling: Option<String>,
}

impl CreateMedicationRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_schedule(
            [
                self.administer_morning,
                self.administer_afternoon,
                self.administer_evening,
                self.administer_night,
            ],
            self.administer_prn,
            self.prn_max_daily.unwrap_or(0),
        )?;
        if self.name.trim().is_empty() || self.dosage.trim().is_empty() {
            return Err(DomainError::Validation("name and dosage are required".into()));
        }
        if !MEDICATION_TYPES.contains(&self.medication_type.as_str()) {
            return Err(DomainError::Validation(format!(
                "Invalid medication_type: {}",
                self.medication_type
            )));
        }
        if let Some(freq) = self.frequency.as_deref() {
            if !FREQUENCIES.contains(&freq) {
                return Err(DomainError::Validation(format!("Invalid frequency: {freq}")));
            }
        }
        if self.total_quantity < 0 {
            return Err(DomainError::Validation("total_quantity cannot be negative".into()));
        }
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(DomainError::Validation("end_date is before start_date".into()));
            }
        }
        Ok(())
    }

    /// Period dosage, falling back to the general dosage when the period is
    /// enabled and no specific dosage was given.
    pub fn period_dosage(&self, enabled: bool, specific: &Option<String>) -> String {
        match specific.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ if enabled => self.dosage.clone(),
            _ => String::new(),
        }
    }
}

/// At least one period or PRN; PRN needs a positive daily maximum.
pub fn validate_schedule(
    timed: [bool; 4],
    prn: bool,
    prn_max_daily: i32,
) -> Result<(), DomainError> {
    if !timed.iter().any(|&b| b) && !prn {
        return Err(DomainError::Validation(
            "Please select at least one time period for medication administration.".into(),
        ));
    }
    if prn && prn_max_daily <= 0 {
        return Err(DomainError::Validation(
            "Please specify maximum daily doses for PRN medication.".into(),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct UpdateMedicationRequest {
    pub name: Option<String>,
    pub medication_type: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub administer_morning: Option<bool>,
    pub morning_time: Option<NaiveTime>,
    pub morning_dosage: Option<String>,
    pub administer_afternoon: Option<bool>,
    pub afternoon_time: Option<NaiveTime>,
    pub afternoon_dosage: Option<String>,
    pub administer_evening: Option<bool>,
    pub evening_time: Option<NaiveTime>,
    pub evening_dosage: Option<String>,
    pub administer_night: Option<bool>,
    pub night_time: Option<NaiveTime>,
    pub night_dosage: Option<String>,
    pub administer_prn: Option<bool>,
    pub prn_instructions: Option<String>,
    pub prn_max_daily: Option<i32>,
    pub route: Option<String>,
    pub start_date: Option<NaiveDate>,
    /// `null` clears the end date.
    #[serde(default, deserialize_with = "crate::models::nullable")]
    pub end_date: Option<Option<NaiveDate>>,
    pub prescribed_by: Option<String>,
    pub reason: Option<String>,
    pub is_controlled_drug: Option<bool>,
    pub instructions: Option<String>,
    pub requires_refrigeration: Option<bool>,
    pub special_handling: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MedicationQuery {
    pub service_user_id: Option<Uuid>,
    pub medication_type: Option<String>,
    pub is_controlled_drug: Option<bool>,
    pub is_active: Option<bool>,
    pub low_stock: Option<bool>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

// ------------------------------------------------------------ administrations

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MedicationAdministration {
    pub id: Uuid,
    pub medication_id: Uuid,
    pub administered_by: Uuid,
    pub administered_date: NaiveDate,
    pub administered_time: NaiveTime,
    pub scheduled_time: Option<NaiveTime>,
    pub dose_administered: i32,
    pub status: String,
    pub witness_id: Option<Uuid>,
    pub notes: String,
    pub refusal_reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

/// Administration joined with medication, resident and staff names for
/// listings and export.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AdministrationRow {
    pub id: Uuid,
    pub medication_id: Uuid,
    pub medication_name: String,
    pub service_user_id: Uuid,
    pub service_user_name: String,
    pub administered_by: Uuid,
    pub administered_by_name: String,
    pub witness_id: Option<Uuid>,
    pub witness_name: Option<String>,
    pub administered_date: NaiveDate,
    pub administered_time: NaiveTime,
    pub scheduled_time: Option<NaiveTime>,
    pub dose_administered: i32,
    pub status: String,
    pub notes: String,
    pub refusal_reason: String,
}

#[derive(Debug, Deserialize)]
pub struct AdministerRequest {
    pub dose_administered: i32,
    pub status: Option<AdministrationStatus>,
    pub scheduled_time: Option<NaiveTime>,
    pub administered_date: Option<NaiveDate>,
    pub administered_time: Option<NaiveTime>,
    pub witness_id: Option<Uuid>,
    pub witness_password: Option<String>,
    pub notes: Option<String>,
    pub refusal_reason: Option<String>,
    /// The administering member must tick the confirmation box.
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Deserialize)]
pub struct AdministrationQuery {
    pub service_user_id: Option<Uuid>,
    pub medication_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub service_user_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(y: i32, mo: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, mo, day).unwrap()
    }

    fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
        date.and_time(t(h, m))
    }

    fn medication() -> Medication {
        Medication {
            id: Uuid::new_v4(),
            service_user_id: Uuid::new_v4(),
            name: "Paracetamol".into(),
            medication_type: "tablet".into(),
            dosage: "500mg".into(),
            frequency: "twice_daily".into(),
            administer_morning: true,
            morning_time: Some(t(8, 0)),
            morning_dosage: String::new(),
            administer_afternoon: false,
            afternoon_time: Some(t(13, 0)),
            afternoon_dosage: String::new(),
            administer_evening: true,
            evening_time: Some(t(18, 0)),
            evening_dosage: "1g".into(),
            administer_night: false,
            night_time: Some(t(22, 0)),
            night_dosage: String::new(),
            administer_prn: false,
            prn_instructions: String::new(),
            prn_max_daily: 0,
            route: "oral".into(),
            start_date: d(2024, 1, 1),
            end_date: None,
            prescribed_by: "Dr Smith".into(),
            reason: String::new(),
            is_controlled_drug: false,
            total_quantity: 100,
            current_balance: 100,
            instructions: String::new(),
            is_active: true,
            last_administered: None,
            next_due_time: None,
            requires_refrigeration: false,
            special_handling: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            created_by: None,
            updated_by: None,
        }
    }

    #[test]
    fn time_periods_are_ordered_with_prn_last() {
        let mut med = medication();
        med.administer_prn = true;
        med.administer_night = true;
        let periods: Vec<TimePeriod> = med.time_periods().iter().map(|p| p.period).collect();
        assert_eq!(
            periods,
            vec![TimePeriod::Morning, TimePeriod::Evening, TimePeriod::Night, TimePeriod::Prn]
        );
    }

    #[test]
    fn period_dosage_falls_back_to_general_dosage() {
        let med = medication();
        let periods = med.time_periods();
        assert_eq!(periods[0].dosage, "500mg");
        assert_eq!(periods[1].dosage, "1g");
    }

    #[test]
    fn next_due_is_next_slot_today() {
        let med = medication();
        let now = at(d(2024, 5, 1), 9, 30);
        assert_eq!(med.next_due_time(now), Some(at(d(2024, 5, 1), 18, 0)));
    }

    #[test]
    fn next_due_is_strictly_after_now() {
        let med = medication();
        let now = at(d(2024, 5, 1), 8, 0);
        assert_eq!(med.next_due_time(now), Some(at(d(2024, 5, 1), 18, 0)));
    }

    #[test]
    fn next_due_rolls_over_to_tomorrow() {
        let med = medication();
        let now = at(d(2024, 5, 1), 19, 0);
        assert_eq!(med.next_due_time(now), Some(at(d(2024, 5, 2), 8, 0)));
    }

    #[test]
    fn next_due_is_none_for_inactive_or_prn_only() {
        let mut med = medication();
        med.is_active = false;
        assert_eq!(med.next_due_time(at(d(2024, 5, 1), 7, 0)), None);

        let mut prn = medication();
        prn.administer_morning = false;
        prn.administer_evening = false;
        prn.administer_prn = true;
        prn.prn_max_daily = 4;
        assert!(prn.is_prn_only());
        assert_eq!(prn.next_due_time(at(d(2024, 5, 1), 7, 0)), None);
    }

    #[test]
    fn status_precedence() {
        let now = at(d(2024, 5, 1), 9, 0);
        let mut med = medication();
        assert_eq!(med.status(now, 0), MedicationStatus::Due);
        assert_eq!(med.status(now, 1), MedicationStatus::Ok);

        med.current_balance = 0;
        assert_eq!(med.status(now, 0), MedicationStatus::OutOfStock);

        med.is_active = false;
        assert_eq!(med.status(now, 0), MedicationStatus::Inactive);
    }

    #[test]
    fn status_ok_before_first_slot() {
        let med = medication();
        assert_eq!(med.status(at(d(2024, 5, 1), 7, 59), 0), MedicationStatus::Ok);
    }

    #[test]
    fn missed_doses_counts_uncovered_slots() {
        let med = medication();
        let now = at(d(2024, 5, 3), 12, 0);
        let mut given = HashMap::new();
        given.insert(d(2024, 5, 1), 2);
        given.insert(d(2024, 5, 2), 1);
        // 1st: none missed, 2nd: one missed, 3rd: morning slot passed, not given
        assert_eq!(med.missed_doses(d(2024, 5, 1), d(2024, 5, 3), now, &given), 2);
    }

    #[test]
    fn missed_doses_ignore_future_slots_and_dates() {
        let med = medication();
        let now = at(d(2024, 5, 3), 7, 0);
        let given = HashMap::new();
        assert_eq!(med.missed_doses(d(2024, 5, 3), d(2024, 5, 10), now, &given), 0);
    }

    #[test]
    fn missed_doses_respect_prescription_window() {
        let mut med = medication();
        med.start_date = d(2024, 5, 2);
        med.end_date = Some(d(2024, 5, 2));
        let now = at(d(2024, 5, 5), 12, 0);
        assert_eq!(med.missed_doses(d(2024, 5, 1), d(2024, 5, 5), now, &HashMap::new()), 2);
    }

    #[test]
    fn extra_administrations_do_not_go_negative() {
        let med = medication();
        let now = at(d(2024, 5, 1), 23, 0);
        let mut given = HashMap::new();
        given.insert(d(2024, 5, 1), 5);
        assert_eq!(med.missed_doses(d(2024, 5, 1), d(2024, 5, 1), now, &given), 0);
    }

    #[test]
    fn prn_never_counts_as_missed() {
        let mut med = medication();
        med.administer_morning = false;
        med.administer_evening = false;
        med.administer_prn = true;
        med.prn_max_daily = 2;
        let now = at(d(2024, 5, 3), 23, 0);
        assert_eq!(med.missed_doses(d(2024, 5, 1), d(2024, 5, 3), now, &HashMap::new()), 0);
    }

    #[test]
    fn administering_more_than_balance_fails() {
        let mut med = medication();
        med.current_balance = 2;
        let err = med
            .check_administration(AdministrationStatus::Given, 3, false)
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::InsufficientBalance { requested: 3, available: 2 }
        ));
        assert!(med.check_administration(AdministrationStatus::Given, 2, false).is_ok());
    }

    #[test]
    fn controlled_drug_requires_witness_only_when_given() {
        let mut med = medication();
        med.is_controlled_drug = true;
        assert!(matches!(
            med.check_administration(AdministrationStatus::Given, 1, false),
            Err(DomainError::WitnessRequired)
        ));
        assert!(med.check_administration(AdministrationStatus::Given, 1, true).is_ok());
        assert!(med.check_administration(AdministrationStatus::Refused, 1, false).is_ok());
    }

    #[test]
    fn refused_dose_ignores_balance() {
        let mut med = medication();
        med.current_balance = 0;
        assert!(med.check_administration(AdministrationStatus::Refused, 5, false).is_ok());
    }

    #[test]
    fn schedule_requires_a_period() {
        assert!(validate_schedule([false; 4], false, 0).is_err());
        assert!(validate_schedule([false; 4], true, 0).is_err());
        assert!(validate_schedule([false; 4], true, 3).is_ok());
        assert!(validate_schedule([true, false, false, false], false, 0).is_ok());
    }

    #[test]
    fn current_period_by_hour() {
        assert_eq!(TimePeriod::current(5), TimePeriod::Night);
        assert_eq!(TimePeriod::current(6), TimePeriod::Morning);
        assert_eq!(TimePeriod::current(11), TimePeriod::Morning);
        assert_eq!(TimePeriod::current(12), TimePeriod::Afternoon);
        assert_eq!(TimePeriod::current(17), TimePeriod::Evening);
        assert_eq!(TimePeriod::current(22), TimePeriod::Night);
    }

    #[test]
    fn quarter_stock_threshold() {
        let mut med = medication();
        med.current_balance = 25;
        assert!(med.is_below_quarter());
        med.current_balance = 26;
        assert!(!med.is_below_quarter());
    }

    #[test]
    fn quarter_stock_handles_large_quantities() {
        let mut med = medication();
        med.total_quantity = i32::MAX;
        med.current_balance = 600_000_000;
        assert!(!med.is_below_quarter());
        med.current_balance = 500_000_000;
        assert!(med.is_below_quarter());
    }

    #[test]
    fn due_soon_uses_the_clock_not_the_last_given_dose() {
        let mut med = medication();
        // stale value left behind by a refused morning dose
        med.next_due_time = Some(Utc::now() - Duration::days(3));
        let day = d(2024, 5, 3);
        assert!(med.is_due_within(at(day, 17, 30), 60));
        assert!(!med.is_due_within(at(day, 16, 30), 60));
        assert!(med.is_due_within(at(day, 7, 0), 60));
    }

    #[test]
    fn due_soon_ignores_prn_only_and_inactive() {
        let mut med = medication();
        med.is_active = false;
        assert!(!med.is_due_within(at(d(2024, 5, 3), 7, 30), 60));

        let mut prn = medication();
        prn.administer_morning = false;
        prn.administer_evening = false;
        prn.administer_prn = true;
        assert!(!prn.is_due_within(at(d(2024, 5, 3), 7, 30), 60));
    }

    #[test]
    fn witness_cannot_be_the_administering_member() {
        let staff = Uuid::new_v4();
        assert!(matches!(
            check_witness(staff, staff, Some(true), Some("Witness123")),
            Err(DomainError::InvalidWitness(_))
        ));
    }

    #[test]
    fn witness_must_exist_and_be_active() {
        let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(matches!(
            check_witness(me, other, Some(false), Some("Witness123")),
            Err(DomainError::InvalidWitness(msg)) if msg.contains("not an active")
        ));
        assert!(matches!(
            check_witness(me, other, None, Some("Witness123")),
            Err(DomainError::InvalidWitness(msg)) if msg.contains("not found")
        ));
    }

    #[test]
    fn witness_password_is_required() {
        let (me, other) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(check_witness(me, other, Some(true), None).is_err());
        assert!(check_witness(me, other, Some(true), Some("")).is_err());
        assert_eq!(check_witness(me, other, Some(true), Some("Witness123")).unwrap(), "Witness123");
    }
}
