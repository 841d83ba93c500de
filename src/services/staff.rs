use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    error::DomainError,
    models::{
        staff::{
            generate_staff_id, generate_temp_password, CreateDepartmentRequest, CreateStaffRequest,
            Department, Role, RoleRequest, StaffCreated, StaffMember, StaffQuery,
            UpdateDepartmentRequest, UpdateStaffRequest, STAFF_PAGE_SIZE,
        },
        user::{validate_password, UserRole},
    },
    services::{auth::AuthService, email::EmailService},
};

pub const STAFF_SELECT: &str = "
    SELECT s.*, u.username, u.email, u.first_name, u.last_name
    FROM staff_members s
    JOIN users u ON u.id = s.user_id";

pub struct DepartmentService;

impl DepartmentService {
    pub async fn list(pool: &PgPool, include_inactive: bool) -> anyhow::Result<Vec<Department>> {
        let rows = sqlx::query_as::<_, Department>(
            "SELECT * FROM departments WHERE ($1 OR is_active = TRUE) ORDER BY name",
        )
        .bind(include_inactive)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> anyhow::Result<Department> {
        let row = sqlx::query_as::<_, Department>("SELECT * FROM departments WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("Department"))?;
        Ok(row)
    }

    pub async fn create(pool: &PgPool, req: &CreateDepartmentRequest, actor: Uuid) -> anyhow::Result<Department> {
        if req.name.trim().is_empty() {
            return Err(DomainError::Validation("Department name is required".into()).into());
        }
        let row = sqlx::query_as::<_, Department>(
            "INSERT INTO departments (name, description, manager_id, created_by, updated_by)
             VALUES ($1, $2, $3, $4, $4)
             RETURNING *",
        )
        .bind(req.name.trim())
        .bind(req.description.as_deref().unwrap_or(""))
        .bind(req.manager_id)
        .bind(actor)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        req: &UpdateDepartmentRequest,
        actor: Uuid,
    ) -> anyhow::Result<Department> {
        let row = sqlx::query_as::<_, Department>(
            "UPDATE departments SET
                name        = COALESCE($2, name),
                description = COALESCE($3, description),
                manager_id  = COALESCE($4, manager_id),
                updated_by  = $5
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.manager_id)
        .bind(actor)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound("Department"))?;
        Ok(row)
    }

    pub async fn toggle_active(pool: &PgPool, id: Uuid, actor: Uuid) -> anyhow::Result<Department> {
        let row = sqlx::query_as::<_, Department>(
            "UPDATE departments SET is_active = NOT is_active, updated_by = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(actor)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound("Department"))?;
        Ok(row)
    }
}

pub struct RoleService;

impl RoleService {
    pub async fn list(pool: &PgPool) -> anyhow::Result<Vec<Role>> {
        let rows = sqlx::query_as::<_, Role>("SELECT * FROM roles ORDER BY name")
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> anyhow::Result<Role> {
        let row = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("Role"))?;
        Ok(row)
    }

    pub async fn create(pool: &PgPool, req: &RoleRequest, actor: Uuid) -> anyhow::Result<Role> {
        if req.name.trim().is_empty() {
            return Err(DomainError::Validation("Role name is required".into()).into());
        }
        let flags = req.flags.normalised();
        let row = sqlx::query_as::<_, Role>(
            "INSERT INTO roles (name, description, is_management, can_manage_staff, can_view_reports,
                                can_manage_care_plans, can_manage_medications, created_by, updated_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
             RETURNING *",
        )
        .bind(req.name.trim())
        .bind(req.description.as_deref().unwrap_or(""))
        .bind(flags.is_management)
        .bind(flags.can_manage_staff)
        .bind(flags.can_view_reports)
        .bind(flags.can_manage_care_plans)
        .bind(flags.can_manage_medications)
        .bind(actor)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    /// Full replacement of a role. Users holding it follow its management flag.
    pub async fn update(pool: &PgPool, id: Uuid, req: &RoleRequest, actor: Uuid) -> anyhow::Result<Role> {
        let flags = req.flags.normalised();
        let mut tx = pool.begin().await?;

        let row = sqlx::query_as::<_, Role>(
            "UPDATE roles SET
                name = $2, description = $3, is_management = $4, can_manage_staff = $5,
                can_view_reports = $6, can_manage_care_plans = $7, can_manage_medications = $8,
                updated_by = $9
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(req.name.trim())
        .bind(req.description.as_deref().unwrap_or(""))
        .bind(flags.is_management)
        .bind(flags.can_manage_staff)
        .bind(flags.can_view_reports)
        .bind(flags.can_manage_care_plans)
        .bind(flags.can_manage_medications)
        .bind(actor)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DomainError::NotFound("Role"))?;

        sqlx::query(
            "UPDATE users SET role = $2::user_role
             WHERE id IN (SELECT user_id FROM staff_members WHERE role_id = $1)",
        )
        .bind(id)
        .bind(user_role_for(flags.is_management).to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> anyhow::Result<()> {
        let mut tx = pool.begin().await?;
        // Staff losing their role drop back to plain staff accounts.
        sqlx::query(
            "UPDATE users SET role = 'staff'
             WHERE id IN (SELECT user_id FROM staff_members WHERE role_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let deleted = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(DomainError::NotFound("Role").into());
        }
        tx.commit().await?;
        Ok(())
    }
}

fn user_role_for(is_management: bool) -> UserRole {
    if is_management {
        UserRole::Management
    } else {
        UserRole::Staff
    }
}

async fn role_is_management(tx: &mut Transaction<'_, Postgres>, role_id: Option<Uuid>) -> anyhow::Result<bool> {
    let Some(role_id) = role_id else {
        return Ok(false);
    };
    let is_management: bool = sqlx::query_scalar("SELECT is_management FROM roles WHERE id = $1")
        .bind(role_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(DomainError::Validation("Unknown role".into()))?;
    Ok(is_management)
}

async fn unique_staff_id(tx: &mut Transaction<'_, Postgres>) -> anyhow::Result<String> {
    for _ in 0..10 {
        let candidate = generate_staff_id();
        let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM staff_members WHERE staff_id = $1)")
            .bind(&candidate)
            .fetch_one(&mut **tx)
            .await?;
        if !taken {
            return Ok(candidate);
        }
    }
    anyhow::bail!("Could not allocate a unique staff id")
}

pub struct StaffService;

impl StaffService {
    pub async fn list(pool: &PgPool, q: &StaffQuery) -> anyhow::Result<(Vec<StaffMember>, i64)> {
        let page = q.page.unwrap_or(1).max(1);
        let offset = (page - 1) * STAFF_PAGE_SIZE;
        let search = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(|s| format!("%{s}%"));
        let active = match q.status.as_deref() {
            Some("active") => Some(true),
            Some("inactive") => Some(false),
            _ => None,
        };

        let filter = "WHERE ($1::text IS NULL OR u.first_name ILIKE $1 OR u.last_name ILIKE $1
                             OR s.staff_id ILIKE $1 OR s.position ILIKE $1 OR u.username ILIKE $1)
                        AND ($2::uuid IS NULL OR s.department_id = $2)
                        AND ($3::bool IS NULL OR s.is_active = $3)";

        let rows = sqlx::query_as::<_, StaffMember>(&format!(
            "{STAFF_SELECT} {filter} ORDER BY u.last_name, u.first_name LIMIT $4 OFFSET $5"
        ))
        .bind(&search)
        .bind(q.department_id)
        .bind(active)
        .bind(STAFF_PAGE_SIZE)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM staff_members s JOIN users u ON u.id = s.user_id {filter}"
        ))
        .bind(&search)
        .bind(q.department_id)
        .bind(active)
        .fetch_one(pool)
        .await?;

        Ok((rows, total))
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> anyhow::Result<StaffMember> {
        let row = sqlx::query_as::<_, StaffMember>(&format!("{STAFF_SELECT} WHERE s.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("Staff member"))?;
        Ok(row)
    }

    pub async fn find_by_user(pool: &PgPool, user_id: Uuid) -> anyhow::Result<Option<StaffMember>> {
        let row = sqlx::query_as::<_, StaffMember>(&format!("{STAFF_SELECT} WHERE s.user_id = $1"))
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
        Ok(row)
    }

    /// Creates the login account and the staff record together, then mails
    /// the credentials when SMTP is configured.
    pub async fn create(
        pool: &PgPool,
        email_svc: Option<&EmailService>,
        login_url: &str,
        req: &CreateStaffRequest,
        actor: Uuid,
    ) -> anyhow::Result<StaffCreated> {
        if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
            return Err(DomainError::Validation("First and last name are required".into()).into());
        }
        if let Some(pw) = &req.password {
            validate_password(pw).map_err(DomainError::Validation)?;
        }

        let mut tx = pool.begin().await?;

        let staff_id = unique_staff_id(&mut tx).await?;
        let username = req
            .username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| staff_id.to_lowercase());
        let temp_password = req.password.is_none().then(generate_temp_password);
        let password = req.password.clone().or_else(|| temp_password.clone()).unwrap_or_default();

        let role = user_role_for(role_is_management(&mut tx, req.role_id).await?);
        let user = AuthService::create_user(
            &mut tx,
            &username,
            req.email.trim(),
            &password,
            req.first_name.trim(),
            req.last_name.trim(),
            role,
        )
        .await?;

        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO staff_members (
                user_id, staff_id, phone_number, department_id, role_id, position, qualifications,
                start_date, end_date, emergency_contact_name, emergency_contact_phone,
                emergency_contact_relationship, dbs_check_date, dbs_check_reference,
                training_records, created_by, updated_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $16)
             RETURNING id",
        )
        .bind(user.id)
        .bind(&staff_id)
        .bind(req.phone_number.as_deref().unwrap_or(""))
        .bind(req.department_id)
        .bind(req.role_id)
        .bind(req.position.trim())
        .bind(req.qualifications.as_deref().unwrap_or(""))
        .bind(req.start_date)
        .bind(req.end_date)
        .bind(req.emergency_contact_name.as_deref().unwrap_or(""))
        .bind(req.emergency_contact_phone.as_deref().unwrap_or(""))
        .bind(req.emergency_contact_relationship.as_deref().unwrap_or(""))
        .bind(req.dbs_check_date)
        .bind(req.dbs_check_reference.as_deref().unwrap_or(""))
        .bind(req.training_records.clone().unwrap_or_else(|| serde_json::json!({})))
        .bind(actor)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let staff_member = Self::get(pool, id).await?;

        let mut credentials_emailed = false;
        if let Some(svc) = email_svc.filter(|_| !staff_member.email.is_empty()) {
            match svc
                .send_credentials(&staff_member.email, &staff_member.full_name(), &username, &password, login_url)
                .await
            {
                Ok(()) => credentials_emailed = true,
                Err(e) => tracing::warn!("Failed to email credentials to {}: {e}", staff_member.email),
            }
        }

        Ok(StaffCreated { staff_member, username, temp_password, credentials_emailed })
    }

    pub async fn update(pool: &PgPool, id: Uuid, req: &UpdateStaffRequest, actor: Uuid) -> anyhow::Result<StaffMember> {
        let mut tx = pool.begin().await?;

        let user_id: Uuid = sqlx::query_scalar(
            "UPDATE staff_members SET
                phone_number                   = COALESCE($2, phone_number),
                department_id                  = COALESCE($3, department_id),
                role_id                        = COALESCE($4, role_id),
                position                       = COALESCE($5, position),
                qualifications                 = COALESCE($6, qualifications),
                start_date                     = COALESCE($7, start_date),
                end_date                       = COALESCE($8, end_date),
                emergency_contact_name         = COALESCE($9, emergency_contact_name),
                emergency_contact_phone        = COALESCE($10, emergency_contact_phone),
                emergency_contact_relationship = COALESCE($11, emergency_contact_relationship),
                dbs_check_date                 = COALESCE($12, dbs_check_date),
                dbs_check_reference            = COALESCE($13, dbs_check_reference),
                training_records               = COALESCE($14, training_records),
                updated_by                     = $15
             WHERE id = $1
             RETURNING user_id",
        )
        .bind(id)
        .bind(&req.phone_number)
        .bind(req.department_id)
        .bind(req.role_id)
        .bind(&req.position)
        .bind(&req.qualifications)
        .bind(req.start_date)
        .bind(req.end_date)
        .bind(&req.emergency_contact_name)
        .bind(&req.emergency_contact_phone)
        .bind(&req.emergency_contact_relationship)
        .bind(req.dbs_check_date)
        .bind(&req.dbs_check_reference)
        .bind(&req.training_records)
        .bind(actor)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DomainError::NotFound("Staff member"))?;

        sqlx::query(
            "UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name  = COALESCE($3, last_name),
                email      = COALESCE($4, email)
             WHERE id = $1",
        )
        .bind(user_id)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(&req.email)
        .execute(&mut *tx)
        .await?;

        if req.role_id.is_some() {
            let role = user_role_for(role_is_management(&mut tx, req.role_id).await?);
            sqlx::query("UPDATE users SET role = $2::user_role WHERE id = $1")
                .bind(user_id)
                .bind(role.to_string())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Self::get(pool, id).await
    }

    /// Flips the active flag; the login account follows it.
    pub async fn toggle_active(pool: &PgPool, id: Uuid, actor: Uuid) -> anyhow::Result<StaffMember> {
        let mut tx = pool.begin().await?;

        let (user_id, is_active): (Uuid, bool) = sqlx::query_as(
            "UPDATE staff_members SET is_active = NOT is_active, updated_by = $2
             WHERE id = $1
             RETURNING user_id, is_active",
        )
        .bind(id)
        .bind(actor)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DomainError::NotFound("Staff member"))?;

        sqlx::query("UPDATE users SET is_active = $2 WHERE id = $1")
            .bind(user_id)
            .bind(is_active)
            .execute(&mut *tx)
            .await?;

        if !is_active {
            sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Self::get(pool, id).await
    }

    /// Sets the given password, or a generated one which is returned.
    pub async fn reset_password(
        pool: &PgPool,
        user_id: Uuid,
        new_password: Option<&str>,
    ) -> anyhow::Result<Option<String>> {
        match new_password {
            Some(pw) => {
                validate_password(pw).map_err(DomainError::Validation)?;
                AuthService::set_password(pool, user_id, pw).await?;
                Ok(None)
            }
            None => {
                let temp = generate_temp_password();
                AuthService::set_password(pool, user_id, &temp).await?;
                Ok(Some(temp))
            }
        }
    }
}
