use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const RISK_LEVELS: &[&str] = &["low", "medium", "high"];

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CarePlan {
    pub id: Uuid,
    pub service_user_id: Uuid,
    pub personal_care: String,
    pub mobility: String,
    pub nutrition: String,
    pub hydration: String,
    pub social_activities: String,
    pub medical_requirements: String,
    pub personal_goals: String,
    pub spiritual_needs: String,
    pub cultural_needs: String,
    pub last_review_date: NaiveDate,
    pub next_review_date: NaiveDate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

impl CarePlan {
    pub fn is_due_for_review(&self, today: NaiveDate) -> bool {
        today >= self.next_review_date
    }
}

#[derive(Debug, Deserialize)]
pub struct CarePlanRequest {
    pub service_user_id: Option<Uuid>,
    pub personal_care: Option<String>,
    pub mobility: Option<String>,
    pub nutrition: Option<String>,
    pub hydration: Option<String>,
    pub social_activities: Option<String>,
    pub medical_requirements: Option<String>,
    pub personal_goals: Option<String>,
    pub spiritual_needs: Option<String>,
    pub cultural_needs: Option<String>,
    pub last_review_date: Option<NaiveDate>,
    pub next_review_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PbsPlan {
    pub id: Uuid,
    pub service_user_id: Uuid,
    pub behaviors_of_concern: String,
    pub triggers: String,
    pub prevention_strategies: String,
    pub deescalation_techniques: String,
    pub emergency_procedures: String,
    pub last_review_date: NaiveDate,
    pub next_review_date: NaiveDate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

impl PbsPlan {
    pub fn is_due_for_review(&self, today: NaiveDate) -> bool {
        today >= self.next_review_date
    }
}

#[derive(Debug, Deserialize)]
pub struct PbsPlanRequest {
    pub service_user_id: Option<Uuid>,
    pub behaviors_of_concern: Option<String>,
    pub triggers: Option<String>,
    pub prevention_strategies: Option<String>,
    pub deescalation_techniques: Option<String>,
    pub emergency_procedures: Option<String>,
    pub last_review_date: Option<NaiveDate>,
    pub next_review_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PlanQuery {
    pub service_user_id: Option<Uuid>,
    pub due_for_review: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RiskAssessment {
    pub id: Uuid,
    pub service_user_id: Uuid,
    pub category: String,
    pub risk_level: String,
    pub assessment_details: String,
    pub control_measures: String,
    pub date_assessed: NaiveDate,
    pub review_date: NaiveDate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct RiskAssessmentRequest {
    pub service_user_id: Option<Uuid>,
    pub category: Option<String>,
    pub risk_level: Option<String>,
    pub assessment_details: Option<String>,
    pub control_measures: Option<String>,
    pub date_assessed: Option<NaiveDate>,
    pub review_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct RiskAssessmentQuery {
    pub service_user_id: Option<Uuid>,
    pub risk_level: Option<String>,
    pub is_active: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn care_plan_due_on_review_date() {
        let review = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let plan = CarePlan {
            id: Uuid::new_v4(),
            service_user_id: Uuid::new_v4(),
            personal_care: String::new(),
            mobility: String::new(),
            nutrition: String::new(),
            hydration: String::new(),
            social_activities: String::new(),
            medical_requirements: String::new(),
            personal_goals: String::new(),
            spiritual_needs: String::new(),
            cultural_needs: String::new(),
            last_review_date: NaiveDate::from_ymd_opt(2023, 9, 1).unwrap(),
            next_review_date: review,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            created_by: None,
            updated_by: None,
        };
        assert!(!plan.is_due_for_review(review.pred_opt().unwrap()));
        assert!(plan.is_due_for_review(review));
        assert!(plan.is_due_for_review(review.succ_opt().unwrap()));
    }
}
