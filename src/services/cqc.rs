use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    error::DomainError,
    models::{
        audit::CqcAccessLog,
        document::{Document, DocumentQuery},
        paginate,
        records::Incident,
        staff::{
            generate_cqc_id, generate_temp_password, split_name, CqcMember, CqcMemberCreated,
            CreateCqcMemberRequest, UpdateCqcMemberRequest,
        },
        user::UserRole,
    },
    services::{
        audit::AuditService, auth::AuthService, care::CarePlanService, documents::DocumentService,
        email::EmailService,
    },
};

/// Incidents a member may see: released, shared and within the member's rights.
const VISIBLE_INCIDENTS: &str = "WHERE cqc_can_view = TRUE AND cqc_viewable_after <= $1";

async fn unique_cqc_id(tx: &mut Transaction<'_, Postgres>) -> anyhow::Result<String> {
    for _ in 0..10 {
        let candidate = generate_cqc_id();
        let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM cqc_members WHERE cqc_id = $1)")
            .bind(&candidate)
            .fetch_one(&mut **tx)
            .await?;
        if !taken {
            return Ok(candidate);
        }
    }
    anyhow::bail!("Could not allocate a unique CQC id")
}

pub struct CqcMemberService;

impl CqcMemberService {
    pub async fn list(
        pool: &PgPool,
        search: Option<&str>,
        page: Option<i64>,
        per_page: Option<i64>,
    ) -> anyhow::Result<(Vec<CqcMember>, i64)> {
        let (limit, offset) = paginate(page, per_page);
        let search = search.map(str::trim).filter(|s| !s.is_empty()).map(|s| format!("%{s}%"));
        let filter = "WHERE ($1::text IS NULL OR name ILIKE $1 OR email ILIKE $1 OR cqc_id ILIKE $1)";

        let rows = sqlx::query_as::<_, CqcMember>(&format!(
            "SELECT * FROM cqc_members {filter} ORDER BY name LIMIT $2 OFFSET $3"
        ))
        .bind(&search)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM cqc_members {filter}"))
            .bind(&search)
            .fetch_one(pool)
            .await?;
        Ok((rows, total))
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> anyhow::Result<CqcMember> {
        let row = sqlx::query_as::<_, CqcMember>("SELECT * FROM cqc_members WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("CQC member"))?;
        Ok(row)
    }

    /// The active inspector record behind a CQC login.
    pub async fn for_user(pool: &PgPool, user_id: Uuid) -> anyhow::Result<CqcMember> {
        let row = sqlx::query_as::<_, CqcMember>("SELECT * FROM cqc_members WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?
            .filter(|m| m.is_active)
            .ok_or_else(|| DomainError::Forbidden("No active CQC membership for this account".into()))?;
        Ok(row)
    }

    /// Creates the inspector and a `cqc_<id>` login with a temporary password.
    pub async fn create(
        pool: &PgPool,
        email_svc: Option<&EmailService>,
        login_url: &str,
        req: &CreateCqcMemberRequest,
        actor: Uuid,
    ) -> anyhow::Result<CqcMemberCreated> {
        let name = req.name.trim();
        let email = req.email.trim();
        if name.is_empty() || email.is_empty() {
            return Err(DomainError::Validation("Name and email are required".into()).into());
        }
        if matches!(req.incident_view_delay_hours, Some(h) if h < 0) {
            return Err(DomainError::Validation("incident_view_delay_hours cannot be negative".into()).into());
        }

        let mut tx = pool.begin().await?;
        let cqc_id = unique_cqc_id(&mut tx).await?;
        let username = format!("cqc_{}", cqc_id.to_lowercase());
        let temp_password = generate_temp_password();
        let (first_name, last_name) = split_name(name);

        let user = AuthService::create_user(
            &mut tx,
            &username,
            email,
            &temp_password,
            &first_name,
            &last_name,
            UserRole::Cqc,
        )
        .await?;

        let member = sqlx::query_as::<_, CqcMember>(
            "INSERT INTO cqc_members (
                user_id, cqc_id, name, email, phone_number, can_view_incidents,
                incident_view_delay_hours, can_view_audit_logs, can_view_care_plans,
                can_download_reports, created_by, updated_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
             RETURNING *",
        )
        .bind(user.id)
        .bind(&cqc_id)
        .bind(name)
        .bind(email)
        .bind(req.phone_number.as_deref().unwrap_or(""))
        .bind(req.can_view_incidents.unwrap_or(true))
        .bind(req.incident_view_delay_hours.unwrap_or(48))
        .bind(req.can_view_audit_logs.unwrap_or(false))
        .bind(req.can_view_care_plans.unwrap_or(false))
        .bind(req.can_download_reports.unwrap_or(false))
        .bind(actor)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        let mut credentials_emailed = false;
        if let Some(svc) = email_svc {
            match svc.send_credentials(email, name, &username, &temp_password, login_url).await {
                Ok(()) => credentials_emailed = true,
                Err(e) => tracing::warn!("Failed to email CQC credentials to {email}: {e}"),
            }
        }

        Ok(CqcMemberCreated { cqc_member: member, username, temp_password, credentials_emailed })
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        req: &UpdateCqcMemberRequest,
        actor: Uuid,
    ) -> anyhow::Result<CqcMember> {
        if matches!(req.incident_view_delay_hours, Some(h) if h < 0) {
            return Err(DomainError::Validation("incident_view_delay_hours cannot be negative".into()).into());
        }
        let mut tx = pool.begin().await?;
        let member = sqlx::query_as::<_, CqcMember>(
            "UPDATE cqc_members SET
                name                      = COALESCE($2, name),
                email                     = COALESCE($3, email),
                phone_number              = COALESCE($4, phone_number),
                can_view_incidents        = COALESCE($5, can_view_incidents),
                incident_view_delay_hours = COALESCE($6, incident_view_delay_hours),
                can_view_audit_logs       = COALESCE($7, can_view_audit_logs),
                can_view_care_plans       = COALESCE($8, can_view_care_plans),
                can_download_reports      = COALESCE($9, can_download_reports),
                updated_by                = $10
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&req.name)
        .bind(&req.email)
        .bind(&req.phone_number)
        .bind(req.can_view_incidents)
        .bind(req.incident_view_delay_hours)
        .bind(req.can_view_audit_logs)
        .bind(req.can_view_care_plans)
        .bind(req.can_download_reports)
        .bind(actor)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DomainError::NotFound("CQC member"))?;

        let (first_name, last_name) = split_name(&member.name);
        sqlx::query("UPDATE users SET first_name = $2, last_name = $3, email = $4 WHERE id = $1")
            .bind(member.user_id)
            .bind(&first_name)
            .bind(&last_name)
            .bind(&member.email)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(member)
    }

    /// Flips the active flag; the login account follows it.
    pub async fn toggle_active(pool: &PgPool, id: Uuid, actor: Uuid) -> anyhow::Result<CqcMember> {
        let mut tx = pool.begin().await?;
        let member = sqlx::query_as::<_, CqcMember>(
            "UPDATE cqc_members SET is_active = NOT is_active, updated_by = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(actor)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DomainError::NotFound("CQC member"))?;

        sqlx::query("UPDATE users SET is_active = $2 WHERE id = $1")
            .bind(member.user_id)
            .bind(member.is_active)
            .execute(&mut *tx)
            .await?;
        if !member.is_active {
            sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1")
                .bind(member.user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(member)
    }
}

/// Something a CQC member looked at, for the access log.
pub struct AccessedItem<'a> {
    pub item_type: &'a str,
    pub item_id: String,
    pub title: &'a str,
}

pub struct CqcPortalService;

impl CqcPortalService {
    /// Writes the access log row and stamps the member's last access.
    pub async fn record_access(
        pool: &PgPool,
        member: &CqcMember,
        item: AccessedItem<'_>,
        ip: &str,
    ) -> anyhow::Result<()> {
        let title: String = item.title.chars().take(200).collect();
        sqlx::query(
            "INSERT INTO cqc_access_log
                (cqc_member_id, accessed_item_type, accessed_item_id, accessed_item_title, ip_address)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(member.id)
        .bind(item.item_type)
        .bind(&item.item_id)
        .bind(&title)
        .bind(ip)
        .execute(pool)
        .await?;

        sqlx::query("UPDATE cqc_members SET last_access = NOW() WHERE id = $1")
            .bind(member.id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn dashboard(pool: &PgPool, member: &CqcMember, now: DateTime<Utc>) -> anyhow::Result<Value> {
        let incidents = if member.can_view_incidents {
            Self::visible_incidents(pool, member, now, Some(1), Some(10)).await?.0
        } else {
            Vec::new()
        };

        let doc_query = DocumentQuery {
            document_type: None,
            service_user_id: None,
            is_confidential: None,
            cqc_can_view: Some(true),
            search: None,
            page: Some(1),
            per_page: Some(10),
        };
        let (documents, _) = DocumentService::list(pool, &doc_query, true).await?;

        let audit_logs = if member.can_view_audit_logs {
            AuditService::list_cqc_visible(pool, 10).await?
        } else {
            Vec::new()
        };
        let care_plans = if member.can_view_care_plans {
            CarePlanService::recent_active(pool, 5).await?
        } else {
            Vec::new()
        };

        Ok(json!({
            "cqc_member": member,
            "recent_incidents": incidents,
            "recent_documents": documents,
            "audit_logs": audit_logs,
            "care_plans": care_plans,
            "permissions": {
                "can_view_incidents": member.can_view_incidents,
                "can_view_audit_logs": member.can_view_audit_logs,
                "can_view_care_plans": member.can_view_care_plans,
                "can_download_reports": member.can_download_reports,
            },
        }))
    }

    pub async fn visible_incidents(
        pool: &PgPool,
        member: &CqcMember,
        now: DateTime<Utc>,
        page: Option<i64>,
        per_page: Option<i64>,
    ) -> anyhow::Result<(Vec<Incident>, i64)> {
        if !member.can_view_incidents {
            return Err(DomainError::Forbidden("You are not permitted to view incidents".into()).into());
        }
        let (limit, offset) = paginate(page, per_page);
        let rows = sqlx::query_as::<_, Incident>(&format!(
            "SELECT * FROM incidents {VISIBLE_INCIDENTS} ORDER BY date DESC, time DESC LIMIT $2 OFFSET $3"
        ))
        .bind(now)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM incidents {VISIBLE_INCIDENTS}"))
            .bind(now)
            .fetch_one(pool)
            .await?;
        Ok((rows, total))
    }

    /// Hidden incidents look the same as missing ones.
    pub async fn incident(
        pool: &PgPool,
        member: &CqcMember,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Incident> {
        if !member.can_view_incidents {
            return Err(DomainError::Forbidden("You are not permitted to view incidents".into()).into());
        }
        let row = sqlx::query_as::<_, Incident>("SELECT * FROM incidents WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .filter(|i| i.is_viewable_by_cqc(now))
            .ok_or(DomainError::NotFound("Incident"))?;
        Ok(row)
    }

    /// Shared documents only; anything else is reported missing.
    pub async fn document(pool: &PgPool, id: Uuid) -> anyhow::Result<Document> {
        let doc = DocumentService::get(pool, id).await?;
        if !doc.cqc_can_view {
            return Err(DomainError::NotFound("Document").into());
        }
        Ok(doc)
    }

    /// Access log, for one member or all of them.
    pub async fn access_log(
        pool: &PgPool,
        member_id: Option<Uuid>,
        page: Option<i64>,
        per_page: Option<i64>,
    ) -> anyhow::Result<(Vec<CqcAccessLog>, i64)> {
        let (limit, offset) = paginate(page, per_page);
        let rows = sqlx::query_as::<_, CqcAccessLog>(
            "SELECT * FROM cqc_access_log WHERE ($1::uuid IS NULL OR cqc_member_id = $1)
             ORDER BY access_date DESC LIMIT $2 OFFSET $3",
        )
        .bind(member_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM cqc_access_log WHERE ($1::uuid IS NULL OR cqc_member_id = $1)",
        )
        .bind(member_id)
        .fetch_one(pool)
        .await?;
        Ok((rows, total))
    }
}
