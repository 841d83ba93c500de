use chrono::NaiveDate;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::DomainError,
    models::{
        care::{CarePlan, PbsPlan, RiskAssessment},
        medication::Medication,
        paginate,
        records::Incident,
        resident::{CreateServiceUserRequest, ServiceUser, ServiceUserQuery, UpdateServiceUserRequest},
    },
    services::photos,
};

pub struct ResidentService;

impl ResidentService {
    pub async fn list(pool: &PgPool, q: &ServiceUserQuery) -> anyhow::Result<(Vec<ServiceUser>, i64)> {
        let (limit, offset) = paginate(q.page, q.per_page);
        let search = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(|s| format!("%{s}%"));
        let filter = "WHERE ($1::text IS NULL OR first_name ILIKE $1 OR last_name ILIKE $1 OR room_number ILIKE $1)
                        AND ($2::bool IS NULL OR is_active = $2)
                        AND ($3::uuid IS NULL OR key_worker_id = $3)";

        let rows = sqlx::query_as::<_, ServiceUser>(&format!(
            "SELECT * FROM service_users {filter} ORDER BY last_name, first_name LIMIT $4 OFFSET $5"
        ))
        .bind(&search)
        .bind(q.is_active)
        .bind(q.key_worker_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM service_users {filter}"))
            .bind(&search)
            .bind(q.is_active)
            .bind(q.key_worker_id)
            .fetch_one(pool)
            .await?;

        Ok((rows, total))
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> anyhow::Result<ServiceUser> {
        let row = sqlx::query_as::<_, ServiceUser>("SELECT * FROM service_users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("Service user"))?;
        Ok(row)
    }

    /// Resident with everything the care team needs on one page.
    pub async fn detail(pool: &PgPool, id: Uuid, today: NaiveDate) -> anyhow::Result<Value> {
        let resident = Self::get(pool, id).await?;

        let care_plan = sqlx::query_as::<_, CarePlan>("SELECT * FROM care_plans WHERE service_user_id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        let pbs_plan = sqlx::query_as::<_, PbsPlan>("SELECT * FROM pbs_plans WHERE service_user_id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        let risk_assessments = sqlx::query_as::<_, RiskAssessment>(
            "SELECT * FROM risk_assessments WHERE service_user_id = $1 AND is_active = TRUE
             ORDER BY review_date",
        )
        .bind(id)
        .fetch_all(pool)
        .await?;
        let medications = sqlx::query_as::<_, Medication>(
            "SELECT * FROM medications WHERE service_user_id = $1 AND is_active = TRUE ORDER BY name",
        )
        .bind(id)
        .fetch_all(pool)
        .await?;
        let recent_incidents = sqlx::query_as::<_, Incident>(
            "SELECT * FROM incidents WHERE service_user_id = $1 ORDER BY date DESC, time DESC LIMIT 10",
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        let care_plan_due = care_plan.as_ref().map(|p| p.is_due_for_review(today));
        let pbs_plan_due = pbs_plan.as_ref().map(|p| p.is_due_for_review(today));

        Ok(json!({
            "service_user": resident,
            "age": resident.age(today),
            "care_plan": care_plan,
            "care_plan_due_for_review": care_plan_due,
            "pbs_plan": pbs_plan,
            "pbs_plan_due_for_review": pbs_plan_due,
            "risk_assessments": risk_assessments,
            "medications": medications,
            "recent_incidents": recent_incidents,
        }))
    }

    pub async fn create(pool: &PgPool, req: &CreateServiceUserRequest, actor: Uuid) -> anyhow::Result<ServiceUser> {
        req.validate().map_err(DomainError::Validation)?;

        let row = sqlx::query_as::<_, ServiceUser>(
            "INSERT INTO service_users (
                first_name, last_name, date_of_birth, gender, marital_status, bio, admission_date,
                room_number, bed_number, email, phone_number, emergency_contact_name,
                emergency_contact_phone, emergency_contact_relationship, emergency_contact_address,
                next_of_kin_name, next_of_kin_phone, next_of_kin_relationship, allergies,
                medical_conditions, special_requirements, dietary_restrictions, mobility_requirements,
                communication_needs, has_advanced_directive, advanced_directive_details,
                has_power_of_attorney, power_of_attorney_details, funding_source, key_worker_id,
                created_by, updated_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18,
                     $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31, $31)
             RETURNING *",
        )
        .bind(req.first_name.trim())
        .bind(req.last_name.trim())
        .bind(req.date_of_birth)
        .bind(&req.gender)
        .bind(req.marital_status.as_deref().unwrap_or(""))
        .bind(req.bio.as_deref().unwrap_or(""))
        .bind(req.admission_date)
        .bind(req.room_number.trim())
        .bind(req.bed_number.as_deref().unwrap_or(""))
        .bind(req.email.as_deref().unwrap_or(""))
        .bind(req.phone_number.as_deref().unwrap_or(""))
        .bind(&req.emergency_contact_name)
        .bind(&req.emergency_contact_phone)
        .bind(&req.emergency_contact_relationship)
        .bind(req.emergency_contact_address.as_deref().unwrap_or(""))
        .bind(req.next_of_kin_name.as_deref().unwrap_or(""))
        .bind(req.next_of_kin_phone.as_deref().unwrap_or(""))
        .bind(req.next_of_kin_relationship.as_deref().unwrap_or(""))
        .bind(req.allergies.as_deref().unwrap_or(""))
        .bind(req.medical_conditions.as_deref().unwrap_or(""))
        .bind(req.special_requirements.as_deref().unwrap_or(""))
        .bind(req.dietary_restrictions.as_deref().unwrap_or(""))
        .bind(req.mobility_requirements.as_deref().unwrap_or(""))
        .bind(req.communication_needs.as_deref().unwrap_or(""))
        .bind(req.has_advanced_directive.unwrap_or(false))
        .bind(req.advanced_directive_details.as_deref().unwrap_or(""))
        .bind(req.has_power_of_attorney.unwrap_or(false))
        .bind(req.power_of_attorney_details.as_deref().unwrap_or(""))
        .bind(req.funding_source.as_deref().unwrap_or(""))
        .bind(req.key_worker_id)
        .bind(actor)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        req: &UpdateServiceUserRequest,
        actor: Uuid,
    ) -> anyhow::Result<ServiceUser> {
        if let Some(g) = req.gender.as_deref() {
            if !crate::models::resident::GENDERS.contains(&g) {
                return Err(DomainError::Validation(format!("Invalid gender: {g}")).into());
            }
        }

        let row = sqlx::query_as::<_, ServiceUser>(
            "UPDATE service_users SET
                first_name                     = COALESCE($2, first_name),
                last_name                      = COALESCE($3, last_name),
                date_of_birth                  = COALESCE($4, date_of_birth),
                gender                         = COALESCE($5, gender),
                marital_status                 = COALESCE($6, marital_status),
                bio                            = COALESCE($7, bio),
                admission_date                 = COALESCE($8, admission_date),
                room_number                    = COALESCE($9, room_number),
                bed_number                     = COALESCE($10, bed_number),
                email                          = COALESCE($11, email),
                phone_number                   = COALESCE($12, phone_number),
                emergency_contact_name         = COALESCE($13, emergency_contact_name),
                emergency_contact_phone        = COALESCE($14, emergency_contact_phone),
                emergency_contact_relationship = COALESCE($15, emergency_contact_relationship),
                emergency_contact_address      = COALESCE($16, emergency_contact_address),
                next_of_kin_name               = COALESCE($17, next_of_kin_name),
                next_of_kin_phone              = COALESCE($18, next_of_kin_phone),
                next_of_kin_relationship       = COALESCE($19, next_of_kin_relationship),
                discharge_date                 = COALESCE($20, discharge_date),
                discharge_reason               = COALESCE($21, discharge_reason),
                allergies                      = COALESCE($22, allergies),
                medical_conditions             = COALESCE($23, medical_conditions),
                special_requirements           = COALESCE($24, special_requirements),
                dietary_restrictions           = COALESCE($25, dietary_restrictions),
                mobility_requirements          = COALESCE($26, mobility_requirements),
                communication_needs            = COALESCE($27, communication_needs),
                has_advanced_directive         = COALESCE($28, has_advanced_directive),
                advanced_directive_details     = COALESCE($29, advanced_directive_details),
                has_power_of_attorney          = COALESCE($30, has_power_of_attorney),
                power_of_attorney_details      = COALESCE($31, power_of_attorney_details),
                funding_source                 = COALESCE($32, funding_source),
                key_worker_id                  = COALESCE($33, key_worker_id),
                updated_by                     = $34
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(req.date_of_birth)
        .bind(&req.gender)
        .bind(&req.marital_status)
        .bind(&req.bio)
        .bind(req.admission_date)
        .bind(&req.room_number)
        .bind(&req.bed_number)
        .bind(&req.email)
        .bind(&req.phone_number)
        .bind(&req.emergency_contact_name)
        .bind(&req.emergency_contact_phone)
        .bind(&req.emergency_contact_relationship)
        .bind(&req.emergency_contact_address)
        .bind(&req.next_of_kin_name)
        .bind(&req.next_of_kin_phone)
        .bind(&req.next_of_kin_relationship)
        .bind(req.discharge_date)
        .bind(&req.discharge_reason)
        .bind(&req.allergies)
        .bind(&req.medical_conditions)
        .bind(&req.special_requirements)
        .bind(&req.dietary_restrictions)
        .bind(&req.mobility_requirements)
        .bind(&req.communication_needs)
        .bind(req.has_advanced_directive)
        .bind(&req.advanced_directive_details)
        .bind(req.has_power_of_attorney)
        .bind(&req.power_of_attorney_details)
        .bind(&req.funding_source)
        .bind(req.key_worker_id)
        .bind(actor)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound("Service user"))?;
        Ok(row)
    }

    pub async fn toggle_active(pool: &PgPool, id: Uuid, actor: Uuid) -> anyhow::Result<ServiceUser> {
        let row = sqlx::query_as::<_, ServiceUser>(
            "UPDATE service_users SET is_active = NOT is_active, updated_by = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(actor)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound("Service user"))?;
        Ok(row)
    }

    /// Stores a resized profile photo and replaces the previous one.
    pub async fn set_photo(
        pool: &PgPool,
        media_dir: &str,
        id: Uuid,
        image: &photos::UploadedImage,
        actor: Uuid,
    ) -> anyhow::Result<ServiceUser> {
        let previous = Self::get(pool, id).await?.photo_path;

        let resized = photos::fit_within(&image.bytes, image.ext, photos::PROFILE_PHOTO_MAX)?;
        let path = photos::store(media_dir, "profiles", image.ext, &resized).await?;

        let row = sqlx::query_as::<_, ServiceUser>(
            "UPDATE service_users SET photo_path = $2, updated_by = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&path)
        .bind(actor)
        .fetch_one(pool)
        .await?;

        if let Some(old) = previous {
            photos::remove(media_dir, &old).await;
        }
        Ok(row)
    }
}
