use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::DomainError,
    models::{
        care::{
            CarePlan, CarePlanRequest, PbsPlan, PbsPlanRequest, PlanQuery, RiskAssessment,
            RiskAssessmentQuery, RiskAssessmentRequest, RISK_LEVELS,
        },
        paginate,
        records::{check_choice, required},
    },
};

const PLAN_FILTER: &str = "WHERE ($1::uuid IS NULL OR service_user_id = $1)
                             AND ($2::bool IS NULL OR (next_review_date <= $3) = $2)";

async fn ensure_no_plan(pool: &PgPool, table: &str, service_user_id: Uuid, what: &str) -> anyhow::Result<()> {
    let exists: bool = sqlx::query_scalar(&format!(
        "SELECT EXISTS(SELECT 1 FROM {table} WHERE service_user_id = $1)"
    ))
    .bind(service_user_id)
    .fetch_one(pool)
    .await?;
    if exists {
        return Err(DomainError::Conflict(format!("This service user already has a {what}")).into());
    }
    Ok(())
}

fn check_review_dates(last: Option<NaiveDate>, next: Option<NaiveDate>) -> Result<(), DomainError> {
    match (last, next) {
        (Some(last), Some(next)) if next < last => Err(DomainError::Validation(
            "next_review_date cannot be before last_review_date".into(),
        )),
        _ => Ok(()),
    }
}

pub struct CarePlanService;

impl CarePlanService {
    pub async fn list(pool: &PgPool, q: &PlanQuery, today: NaiveDate) -> anyhow::Result<(Vec<CarePlan>, i64)> {
        let (limit, offset) = paginate(q.page, q.per_page);
        let rows = sqlx::query_as::<_, CarePlan>(&format!(
            "SELECT * FROM care_plans {PLAN_FILTER} ORDER BY next_review_date LIMIT $4 OFFSET $5"
        ))
        .bind(q.service_user_id)
        .bind(q.due_for_review)
        .bind(today)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM care_plans {PLAN_FILTER}"))
            .bind(q.service_user_id)
            .bind(q.due_for_review)
            .bind(today)
            .fetch_one(pool)
            .await?;
        Ok((rows, total))
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> anyhow::Result<CarePlan> {
        let row = sqlx::query_as::<_, CarePlan>("SELECT * FROM care_plans WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("Care plan"))?;
        Ok(row)
    }

    pub async fn create(pool: &PgPool, req: &CarePlanRequest, actor: Uuid) -> anyhow::Result<CarePlan> {
        let service_user_id = required(req.service_user_id, "service_user_id")?;
        let last = required(req.last_review_date, "last_review_date")?;
        let next = required(req.next_review_date, "next_review_date")?;
        check_review_dates(Some(last), Some(next))?;
        ensure_no_plan(pool, "care_plans", service_user_id, "care plan").await?;

        let row = sqlx::query_as::<_, CarePlan>(
            "INSERT INTO care_plans (
                service_user_id, personal_care, mobility, nutrition, hydration, social_activities,
                medical_requirements, personal_goals, spiritual_needs, cultural_needs,
                last_review_date, next_review_date, is_active, created_by, updated_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
             RETURNING *",
        )
        .bind(service_user_id)
        .bind(req.personal_care.as_deref().unwrap_or(""))
        .bind(req.mobility.as_deref().unwrap_or(""))
        .bind(req.nutrition.as_deref().unwrap_or(""))
        .bind(req.hydration.as_deref().unwrap_or(""))
        .bind(req.social_activities.as_deref().unwrap_or(""))
        .bind(req.medical_requirements.as_deref().unwrap_or(""))
        .bind(req.personal_goals.as_deref().unwrap_or(""))
        .bind(req.spiritual_needs.as_deref().unwrap_or(""))
        .bind(req.cultural_needs.as_deref().unwrap_or(""))
        .bind(last)
        .bind(next)
        .bind(req.is_active.unwrap_or(true))
        .bind(actor)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    pub async fn update(pool: &PgPool, id: Uuid, req: &CarePlanRequest, actor: Uuid) -> anyhow::Result<CarePlan> {
        check_review_dates(req.last_review_date, req.next_review_date)?;
        let row = sqlx::query_as::<_, CarePlan>(
            "UPDATE care_plans SET
                personal_care        = COALESCE($2, personal_care),
                mobility             = COALESCE($3, mobility),
                nutrition            = COALESCE($4, nutrition),
                hydration            = COALESCE($5, hydration),
                social_activities    = COALESCE($6, social_activities),
                medical_requirements = COALESCE($7, medical_requirements),
                personal_goals       = COALESCE($8, personal_goals),
                spiritual_needs      = COALESCE($9, spiritual_needs),
                cultural_needs       = COALESCE($10, cultural_needs),
                last_review_date     = COALESCE($11, last_review_date),
                next_review_date     = COALESCE($12, next_review_date),
                is_active            = COALESCE($13, is_active),
                updated_by           = $14
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&req.personal_care)
        .bind(&req.mobility)
        .bind(&req.nutrition)
        .bind(&req.hydration)
        .bind(&req.social_activities)
        .bind(&req.medical_requirements)
        .bind(&req.personal_goals)
        .bind(&req.spiritual_needs)
        .bind(&req.cultural_needs)
        .bind(req.last_review_date)
        .bind(req.next_review_date)
        .bind(req.is_active)
        .bind(actor)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound("Care plan"))?;
        Ok(row)
    }

    /// Most recently updated active plans, for the CQC portal.
    pub async fn recent_active(pool: &PgPool, limit: i64) -> anyhow::Result<Vec<CarePlan>> {
        let rows = sqlx::query_as::<_, CarePlan>(
            "SELECT * FROM care_plans WHERE is_active = TRUE ORDER BY updated_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}

pub struct PbsPlanService;

impl PbsPlanService {
    pub async fn list(pool: &PgPool, q: &PlanQuery, today: NaiveDate) -> anyhow::Result<(Vec<PbsPlan>, i64)> {
        let (limit, offset) = paginate(q.page, q.per_page);
        let rows = sqlx::query_as::<_, PbsPlan>(&format!(
            "SELECT * FROM pbs_plans {PLAN_FILTER} ORDER BY next_review_date LIMIT $4 OFFSET $5"
        ))
        .bind(q.service_user_id)
        .bind(q.due_for_review)
        .bind(today)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM pbs_plans {PLAN_FILTER}"))
            .bind(q.service_user_id)
            .bind(q.due_for_review)
            .bind(today)
            .fetch_one(pool)
            .await?;
        Ok((rows, total))
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> anyhow::Result<PbsPlan> {
        let row = sqlx::query_as::<_, PbsPlan>("SELECT * FROM pbs_plans WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("PBS plan"))?;
        Ok(row)
    }

    pub async fn create(pool: &PgPool, req: &PbsPlanRequest, actor: Uuid) -> anyhow::Result<PbsPlan> {
        let service_user_id = required(req.service_user_id, "service_user_id")?;
        let behaviors = required(req.behaviors_of_concern.as_deref(), "behaviors_of_concern")?;
        let triggers = required(req.triggers.as_deref(), "triggers")?;
        let prevention = required(req.prevention_strategies.as_deref(), "prevention_strategies")?;
        let deescalation = required(req.deescalation_techniques.as_deref(), "deescalation_techniques")?;
        let emergency = required(req.emergency_procedures.as_deref(), "emergency_procedures")?;
        let last = required(req.last_review_date, "last_review_date")?;
        let next = required(req.next_review_date, "next_review_date")?;
        check_review_dates(Some(last), Some(next))?;
        ensure_no_plan(pool, "pbs_plans", service_user_id, "PBS plan").await?;

        let row = sqlx::query_as::<_, PbsPlan>(
            "INSERT INTO pbs_plans (
                service_user_id, behaviors_of_concern, triggers, prevention_strategies,
                deescalation_techniques, emergency_procedures, last_review_date, next_review_date,
                is_active, created_by, updated_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
             RETURNING *",
        )
        .bind(service_user_id)
        .bind(behaviors)
        .bind(triggers)
        .bind(prevention)
        .bind(deescalation)
        .bind(emergency)
        .bind(last)
        .bind(next)
        .bind(req.is_active.unwrap_or(true))
        .bind(actor)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    pub async fn update(pool: &PgPool, id: Uuid, req: &PbsPlanRequest, actor: Uuid) -> anyhow::Result<PbsPlan> {
        check_review_dates(req.last_review_date, req.next_review_date)?;
        let row = sqlx::query_as::<_, PbsPlan>(
            "UPDATE pbs_plans SET
                behaviors_of_concern    = COALESCE($2, behaviors_of_concern),
                triggers                = COALESCE($3, triggers),
                prevention_strategies   = COALESCE($4, prevention_strategies),
                deescalation_techniques = COALESCE($5, deescalation_techniques),
                emergency_procedures    = COALESCE($6, emergency_procedures),
                last_review_date        = COALESCE($7, last_review_date),
                next_review_date        = COALESCE($8, next_review_date),
                is_active               = COALESCE($9, is_active),
                updated_by              = $10
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&req.behaviors_of_concern)
        .bind(&req.triggers)
        .bind(&req.prevention_strategies)
        .bind(&req.deescalation_techniques)
        .bind(&req.emergency_procedures)
        .bind(req.last_review_date)
        .bind(req.next_review_date)
        .bind(req.is_active)
        .bind(actor)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound("PBS plan"))?;
        Ok(row)
    }
}

pub struct RiskAssessmentService;

impl RiskAssessmentService {
    pub async fn list(pool: &PgPool, q: &RiskAssessmentQuery) -> anyhow::Result<(Vec<RiskAssessment>, i64)> {
        let (limit, offset) = paginate(q.page, q.per_page);
        let filter = "WHERE ($1::uuid IS NULL OR service_user_id = $1)
                        AND ($2::text IS NULL OR risk_level = $2)
                        AND ($3::bool IS NULL OR is_active = $3)";

        let rows = sqlx::query_as::<_, RiskAssessment>(&format!(
            "SELECT * FROM risk_assessments {filter} ORDER BY review_date LIMIT $4 OFFSET $5"
        ))
        .bind(q.service_user_id)
        .bind(&q.risk_level)
        .bind(q.is_active)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM risk_assessments {filter}"))
            .bind(q.service_user_id)
            .bind(&q.risk_level)
            .bind(q.is_active)
            .fetch_one(pool)
            .await?;
        Ok((rows, total))
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> anyhow::Result<RiskAssessment> {
        let row = sqlx::query_as::<_, RiskAssessment>("SELECT * FROM risk_assessments WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("Risk assessment"))?;
        Ok(row)
    }

    pub async fn create(pool: &PgPool, req: &RiskAssessmentRequest, actor: Uuid) -> anyhow::Result<RiskAssessment> {
        let service_user_id = required(req.service_user_id, "service_user_id")?;
        let category = required(req.category.as_deref(), "category")?;
        let level = required(req.risk_level.as_deref(), "risk_level")?;
        check_choice(level, RISK_LEVELS, "risk_level")?;
        let details = required(req.assessment_details.as_deref(), "assessment_details")?;
        let measures = required(req.control_measures.as_deref(), "control_measures")?;
        let review_date = required(req.review_date, "review_date")?;

        let row = sqlx::query_as::<_, RiskAssessment>(
            "INSERT INTO risk_assessments (
                service_user_id, category, risk_level, assessment_details, control_measures,
                date_assessed, review_date, created_by, updated_by)
             VALUES ($1, $2, $3, $4, $5, COALESCE($6, CURRENT_DATE), $7, $8, $8)
             RETURNING *",
        )
        .bind(service_user_id)
        .bind(category)
        .bind(level)
        .bind(details)
        .bind(measures)
        .bind(req.date_assessed)
        .bind(review_date)
        .bind(actor)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        req: &RiskAssessmentRequest,
        actor: Uuid,
    ) -> anyhow::Result<RiskAssessment> {
        if let Some(level) = req.risk_level.as_deref() {
            check_choice(level, RISK_LEVELS, "risk_level")?;
        }
        let row = sqlx::query_as::<_, RiskAssessment>(
            "UPDATE risk_assessments SET
                category           = COALESCE($2, category),
                risk_level         = COALESCE($3, risk_level),
                assessment_details = COALESCE($4, assessment_details),
                control_measures   = COALESCE($5, control_measures),
                date_assessed      = COALESCE($6, date_assessed),
                review_date        = COALESCE($7, review_date),
                updated_by         = $8
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&req.category)
        .bind(&req.risk_level)
        .bind(&req.assessment_details)
        .bind(&req.control_measures)
        .bind(req.date_assessed)
        .bind(req.review_date)
        .bind(actor)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound("Risk assessment"))?;
        Ok(row)
    }

    pub async fn toggle_active(pool: &PgPool, id: Uuid, actor: Uuid) -> anyhow::Result<RiskAssessment> {
        let row = sqlx::query_as::<_, RiskAssessment>(
            "UPDATE risk_assessments SET is_active = NOT is_active, updated_by = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(actor)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound("Risk assessment"))?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn review_dates_must_be_ordered() {
        assert!(check_review_dates(Some(d(2024, 1, 1)), Some(d(2024, 7, 1))).is_ok());
        assert!(check_review_dates(Some(d(2024, 1, 1)), Some(d(2024, 1, 1))).is_ok());
        assert!(check_review_dates(Some(d(2024, 7, 1)), Some(d(2024, 1, 1))).is_err());
        assert!(check_review_dates(None, Some(d(2024, 1, 1))).is_ok());
    }
}
