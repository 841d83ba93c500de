use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::DomainError,
    models::{
        auth::AuthenticatedUser,
        notification::NewNotification,
        paginate,
        records::required,
        staff::StaffMember,
        workflow::{
            may_acknowledge, DailySummary, DailySummaryQuery, DailySummaryRequest, GovernanceQuery,
            GovernanceRecord, GovernanceRequest, HandoverQuery, ManagementDailyNote,
            ManagementHandover, ManagementHandoverRequest, ManagementNoteQuery,
            ManagementNoteRequest, ShiftQuery, ShiftRequest, StaffHandover, StaffHandoverRequest,
            StaffShift,
        },
    },
    services::{notifications::NotificationService, staff::StaffService},
};

fn required_text<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, DomainError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DomainError::Validation(format!("{field} is required")))
}

/// The staff record linked to the caller's account.
pub async fn caller_staff(pool: &PgPool, user_id: Uuid) -> anyhow::Result<StaffMember> {
    let staff = StaffService::find_by_user(pool, user_id)
        .await?
        .ok_or_else(|| DomainError::Forbidden("No staff record is linked to this account".into()))?;
    Ok(staff)
}

/// Staff record id of the caller, if any. Management accounts may not have one.
async fn caller_staff_id(pool: &PgPool, user_id: Uuid) -> anyhow::Result<Option<Uuid>> {
    Ok(StaffService::find_by_user(pool, user_id).await?.map(|s| s.id))
}

// --------------------------------------------------------------------- shifts

pub struct ShiftService;

impl ShiftService {
    /// Staff only ever see their own shifts; `own_staff_id` overrides the filter.
    pub async fn list(
        pool: &PgPool,
        q: &ShiftQuery,
        own_staff_id: Option<Uuid>,
    ) -> anyhow::Result<(Vec<StaffShift>, i64)> {
        let (limit, offset) = paginate(q.page, q.per_page);
        let staff_filter = own_staff_id.or(q.staff_member_id);
        let filter = "WHERE ($1::uuid IS NULL OR staff_member_id = $1)
                        AND ($2::date IS NULL OR shift_date = $2)
                        AND ($3::date IS NULL OR shift_date >= $3)
                        AND ($4::date IS NULL OR shift_date <= $4)";

        let rows = sqlx::query_as::<_, StaffShift>(&format!(
            "SELECT * FROM staff_shifts {filter} ORDER BY shift_date DESC, start_time LIMIT $5 OFFSET $6"
        ))
        .bind(staff_filter)
        .bind(q.date)
        .bind(q.start_date)
        .bind(q.end_date)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM staff_shifts {filter}"))
            .bind(staff_filter)
            .bind(q.date)
            .bind(q.start_date)
            .bind(q.end_date)
            .fetch_one(pool)
            .await?;
        Ok((rows, total))
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> anyhow::Result<StaffShift> {
        let row = sqlx::query_as::<_, StaffShift>("SELECT * FROM staff_shifts WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("Shift"))?;
        Ok(row)
    }

    pub async fn create(pool: &PgPool, req: &ShiftRequest, actor: Uuid) -> anyhow::Result<StaffShift> {
        req.validate()?;
        let staff_member_id = required(req.staff_member_id, "staff_member_id")?;
        let shift_date = required(req.shift_date, "shift_date")?;
        let shift_type = required_text(&req.shift_type, "shift_type")?;
        let start_time = required(req.start_time, "start_time")?;
        let end_time = required(req.end_time, "end_time")?;

        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM staff_shifts WHERE staff_member_id = $1 AND shift_date = $2)",
        )
        .bind(staff_member_id)
        .bind(shift_date)
        .fetch_one(pool)
        .await?;
        if taken {
            return Err(DomainError::Conflict("This staff member already has a shift on that date".into()).into());
        }

        let row = sqlx::query_as::<_, StaffShift>(
            "INSERT INTO staff_shifts
                (staff_member_id, shift_date, shift_type, start_time, end_time, notes, created_by, updated_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             RETURNING *",
        )
        .bind(staff_member_id)
        .bind(shift_date)
        .bind(shift_type)
        .bind(start_time)
        .bind(end_time)
        .bind(req.notes.as_deref().unwrap_or(""))
        .bind(actor)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    pub async fn update(pool: &PgPool, id: Uuid, req: &ShiftRequest, actor: Uuid) -> anyhow::Result<StaffShift> {
        req.validate()?;
        let row = sqlx::query_as::<_, StaffShift>(
            "UPDATE staff_shifts SET
                staff_member_id = COALESCE($2, staff_member_id),
                shift_date      = COALESCE($3, shift_date),
                shift_type      = COALESCE($4, shift_type),
                start_time      = COALESCE($5, start_time),
                end_time        = COALESCE($6, end_time),
                notes           = COALESCE($7, notes),
                updated_by      = $8
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(req.staff_member_id)
        .bind(req.shift_date)
        .bind(&req.shift_type)
        .bind(req.start_time)
        .bind(req.end_time)
        .bind(&req.notes)
        .bind(actor)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound("Shift"))?;
        Ok(row)
    }

    /// The shift owner or management may flip completion.
    pub async fn toggle_completed(pool: &PgPool, id: Uuid, user: &AuthenticatedUser) -> anyhow::Result<StaffShift> {
        let shift = Self::get(pool, id).await?;
        if !user.is_management() && caller_staff_id(pool, user.user_id).await? != Some(shift.staff_member_id) {
            return Err(DomainError::Forbidden("You can only complete your own shifts".into()).into());
        }
        let row = sqlx::query_as::<_, StaffShift>(
            "UPDATE staff_shifts SET is_completed = NOT is_completed, updated_by = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(user.user_id)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }
}

// ------------------------------------------------------------ daily summaries

pub struct DailySummaryService;

impl DailySummaryService {
    pub async fn list(pool: &PgPool, q: &DailySummaryQuery) -> anyhow::Result<(Vec<DailySummary>, i64)> {
        let (limit, offset) = paginate(q.page, q.per_page);
        let filter = "WHERE ($1::uuid IS NULL OR $1 = ANY(ds.service_users_present))
                        AND ($2::date IS NULL OR sh.shift_date = $2)";

        let rows = sqlx::query_as::<_, DailySummary>(&format!(
            "SELECT ds.* FROM daily_summaries ds JOIN staff_shifts sh ON sh.id = ds.shift_id
             {filter} ORDER BY sh.shift_date DESC, ds.created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(q.service_user_id)
        .bind(q.date)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM daily_summaries ds JOIN staff_shifts sh ON sh.id = ds.shift_id {filter}"
        ))
        .bind(q.service_user_id)
        .bind(q.date)
        .fetch_one(pool)
        .await?;
        Ok((rows, total))
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> anyhow::Result<DailySummary> {
        let row = sqlx::query_as::<_, DailySummary>("SELECT * FROM daily_summaries WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("Daily summary"))?;
        Ok(row)
    }

    async fn ensure_shift_writer(pool: &PgPool, shift: &StaffShift, user: &AuthenticatedUser) -> anyhow::Result<()> {
        if user.is_management() || caller_staff_id(pool, user.user_id).await? == Some(shift.staff_member_id) {
            Ok(())
        } else {
            Err(DomainError::Forbidden("Only the shift owner or management can write this summary".into()).into())
        }
    }

    pub async fn create(
        pool: &PgPool,
        req: &DailySummaryRequest,
        user: &AuthenticatedUser,
    ) -> anyhow::Result<DailySummary> {
        let shift_id = required(req.shift_id, "shift_id")?;
        let observations = required_text(&req.general_observations, "general_observations")?;
        let tasks_completed = required_text(&req.tasks_completed, "tasks_completed")?;
        let shift = ShiftService::get(pool, shift_id).await?;
        Self::ensure_shift_writer(pool, &shift, user).await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM daily_summaries WHERE shift_id = $1)")
            .bind(shift_id)
            .fetch_one(pool)
            .await?;
        if exists {
            return Err(DomainError::Conflict("This shift already has a daily summary".into()).into());
        }

        let row = sqlx::query_as::<_, DailySummary>(
            "INSERT INTO daily_summaries (
                shift_id, service_users_present, general_observations, issues_concerns,
                positive_events, tasks_completed, tasks_pending, handover_notes, created_by, updated_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
             RETURNING *",
        )
        .bind(shift_id)
        .bind(req.service_users_present.clone().unwrap_or_default())
        .bind(observations)
        .bind(req.issues_concerns.as_deref().unwrap_or(""))
        .bind(req.positive_events.as_deref().unwrap_or(""))
        .bind(tasks_completed)
        .bind(req.tasks_pending.as_deref().unwrap_or(""))
        .bind(req.handover_notes.as_deref().unwrap_or(""))
        .bind(user.user_id)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        req: &DailySummaryRequest,
        user: &AuthenticatedUser,
    ) -> anyhow::Result<DailySummary> {
        let summary = Self::get(pool, id).await?;
        let shift = ShiftService::get(pool, summary.shift_id).await?;
        Self::ensure_shift_writer(pool, &shift, user).await?;

        let row = sqlx::query_as::<_, DailySummary>(
            "UPDATE daily_summaries SET
                service_users_present = COALESCE($2, service_users_present),
                general_observations  = COALESCE($3, general_observations),
                issues_concerns       = COALESCE($4, issues_concerns),
                positive_events       = COALESCE($5, positive_events),
                tasks_completed       = COALESCE($6, tasks_completed),
                tasks_pending         = COALESCE($7, tasks_pending),
                handover_notes        = COALESCE($8, handover_notes),
                updated_by            = $9
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&req.service_users_present)
        .bind(&req.general_observations)
        .bind(&req.issues_concerns)
        .bind(&req.positive_events)
        .bind(&req.tasks_completed)
        .bind(&req.tasks_pending)
        .bind(&req.handover_notes)
        .bind(user.user_id)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }
}

// ----------------------------------------------------------- staff handovers

pub struct StaffHandoverService;

impl StaffHandoverService {
    /// Management sees every handover; staff see those given or received.
    pub async fn list(
        pool: &PgPool,
        q: &HandoverQuery,
        user: &AuthenticatedUser,
    ) -> anyhow::Result<(Vec<StaffHandover>, i64)> {
        let (limit, offset) = paginate(q.page, q.per_page);
        let own = if user.is_management() {
            None
        } else {
            Some(caller_staff(pool, user.user_id).await?.id)
        };
        let direction = q.direction.as_deref().unwrap_or("all");
        let filter = "WHERE ($1::uuid IS NULL
                             OR ($2::text IN ('all', 'received') AND handed_over_to = $1)
                             OR ($2::text IN ('all', 'given') AND handed_over_by = $1))
                        AND ($3::date IS NULL OR shift_date = $3)
                        AND ($4::bool IS NULL OR acknowledged = $4)";

        let rows = sqlx::query_as::<_, StaffHandover>(&format!(
            "SELECT * FROM staff_handovers {filter} ORDER BY shift_date DESC, created_at DESC LIMIT $5 OFFSET $6"
        ))
        .bind(own)
        .bind(direction)
        .bind(q.date)
        .bind(q.acknowledged)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM staff_handovers {filter}"))
            .bind(own)
            .bind(direction)
            .bind(q.date)
            .bind(q.acknowledged)
            .fetch_one(pool)
            .await?;
        Ok((rows, total))
    }

    pub async fn get(pool: &PgPool, id: Uuid, user: &AuthenticatedUser) -> anyhow::Result<StaffHandover> {
        let row = sqlx::query_as::<_, StaffHandover>("SELECT * FROM staff_handovers WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("Handover"))?;
        if !user.is_management() {
            let own = caller_staff_id(pool, user.user_id).await?;
            if own != Some(row.handed_over_by) && own != Some(row.handed_over_to) {
                return Err(DomainError::NotFound("Handover").into());
            }
        }
        Ok(row)
    }

    /// Creates the handover from the caller and notifies the recipient.
    pub async fn create(
        pool: &PgPool,
        req: &StaffHandoverRequest,
        user: &AuthenticatedUser,
    ) -> anyhow::Result<StaffHandover> {
        req.validate()?;
        let from = caller_staff(pool, user.user_id).await?;
        let to_id = required(req.handed_over_to, "handed_over_to")?;
        let shift_type = required_text(&req.shift_type, "shift_type")?;
        let general_notes = required_text(&req.general_notes, "general_notes")?;
        let tasks_completed = required_text(&req.tasks_completed, "tasks_completed")?;
        let priority = req.priority.as_deref().unwrap_or("medium");
        let recipient = StaffService::get(pool, to_id).await?;

        let mut tx = pool.begin().await?;
        let row = sqlx::query_as::<_, StaffHandover>(
            "INSERT INTO staff_handovers (
                handed_over_by, handed_over_to, shift_date, shift_type, service_users_covered,
                general_notes, tasks_completed, tasks_pending, urgent_issues, priority,
                medications_administered, medications_due, incidents_occurred, created_by, updated_by)
             VALUES ($1, $2, COALESCE($3, CURRENT_DATE), $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
             RETURNING *",
        )
        .bind(from.id)
        .bind(recipient.id)
        .bind(req.shift_date)
        .bind(shift_type)
        .bind(req.service_users_covered.clone().unwrap_or_default())
        .bind(general_notes)
        .bind(tasks_completed)
        .bind(req.tasks_pending.as_deref().unwrap_or(""))
        .bind(req.urgent_issues.as_deref().unwrap_or(""))
        .bind(priority)
        .bind(req.medications_administered.as_deref().unwrap_or(""))
        .bind(req.medications_due.as_deref().unwrap_or(""))
        .bind(req.incidents_occurred.as_deref().unwrap_or(""))
        .bind(user.user_id)
        .fetch_one(&mut *tx)
        .await?;

        let notification = NewNotification {
            recipient_id: recipient.user_id,
            title: format!("New handover from {}", from.full_name()),
            message: format!("{} shift handover for {}", row.shift_type, row.shift_date),
            priority: if priority == "high" { "high" } else { "medium" },
            action_url: format!("/handovers/{}", row.id),
            related_model: "staff_handover",
            related_id: row.id.to_string(),
        };
        NotificationService::create(&mut *tx, &notification).await?;
        tx.commit().await?;
        Ok(row)
    }

    /// Idempotent: a second acknowledgement keeps the first timestamp.
    pub async fn acknowledge(pool: &PgPool, id: Uuid, user: &AuthenticatedUser) -> anyhow::Result<StaffHandover> {
        let handover = sqlx::query_as::<_, StaffHandover>("SELECT * FROM staff_handovers WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("Handover"))?;
        let own = caller_staff_id(pool, user.user_id).await?;
        if !may_acknowledge(handover.handed_over_to, own, user.is_management()) {
            return Err(DomainError::Forbidden("Only the recipient can acknowledge this handover".into()).into());
        }
        if handover.acknowledged {
            return Ok(handover);
        }

        let row = sqlx::query_as::<_, StaffHandover>(
            "UPDATE staff_handovers
             SET acknowledged = TRUE, acknowledged_at = COALESCE(acknowledged_at, NOW()), updated_by = $2
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(user.user_id)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }
}

// ------------------------------------------------------ management daily notes

pub struct ManagementNoteService;

impl ManagementNoteService {
    pub async fn list(pool: &PgPool, q: &ManagementNoteQuery) -> anyhow::Result<(Vec<ManagementDailyNote>, i64)> {
        let (limit, offset) = paginate(q.page, q.per_page);
        let filter = "WHERE ($1::text IS NULL OR priority = $1)
                        AND ($2::bool IS NULL OR is_resolved = $2)
                        AND ($3::bool IS NULL OR action_required = $3)";

        let rows = sqlx::query_as::<_, ManagementDailyNote>(&format!(
            "SELECT * FROM management_daily_notes {filter} ORDER BY created_at DESC LIMIT $4 OFFSET $5"
        ))
        .bind(&q.priority)
        .bind(q.is_resolved)
        .bind(q.action_required)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM management_daily_notes {filter}"))
            .bind(&q.priority)
            .bind(q.is_resolved)
            .bind(q.action_required)
            .fetch_one(pool)
            .await?;
        Ok((rows, total))
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> anyhow::Result<ManagementDailyNote> {
        let row = sqlx::query_as::<_, ManagementDailyNote>("SELECT * FROM management_daily_notes WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("Management note"))?;
        Ok(row)
    }

    pub async fn create(pool: &PgPool, req: &ManagementNoteRequest, actor: Uuid) -> anyhow::Result<ManagementDailyNote> {
        req.validate()?;
        let title = required_text(&req.title, "title")?;
        let note = required_text(&req.note, "note")?;

        let row = sqlx::query_as::<_, ManagementDailyNote>(
            "INSERT INTO management_daily_notes (
                title, note, priority, related_department_id, related_service_user_id,
                related_staff_id, action_required, action_details, action_deadline,
                created_by, updated_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
             RETURNING *",
        )
        .bind(title)
        .bind(note)
        .bind(req.priority.as_deref().unwrap_or("medium"))
        .bind(req.related_department_id)
        .bind(req.related_service_user_id)
        .bind(req.related_staff_id)
        .bind(req.action_required.unwrap_or(false))
        .bind(req.action_details.as_deref().unwrap_or(""))
        .bind(req.action_deadline)
        .bind(actor)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        req: &ManagementNoteRequest,
        actor: Uuid,
    ) -> anyhow::Result<ManagementDailyNote> {
        req.validate()?;
        let row = sqlx::query_as::<_, ManagementDailyNote>(
            "UPDATE management_daily_notes SET
                title                   = COALESCE($2, title),
                note                    = COALESCE($3, note),
                priority                = COALESCE($4, priority),
                related_department_id   = COALESCE($5, related_department_id),
                related_service_user_id = COALESCE($6, related_service_user_id),
                related_staff_id        = COALESCE($7, related_staff_id),
                action_required         = COALESCE($8, action_required),
                action_details          = COALESCE($9, action_details),
                action_deadline         = COALESCE($10, action_deadline),
                updated_by              = $11
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&req.title)
        .bind(&req.note)
        .bind(&req.priority)
        .bind(req.related_department_id)
        .bind(req.related_service_user_id)
        .bind(req.related_staff_id)
        .bind(req.action_required)
        .bind(&req.action_details)
        .bind(req.action_deadline)
        .bind(actor)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound("Management note"))?;
        Ok(row)
    }

    pub async fn resolve(
        pool: &PgPool,
        id: Uuid,
        resolution_notes: Option<&str>,
        actor: Uuid,
    ) -> anyhow::Result<ManagementDailyNote> {
        let resolver = caller_staff_id(pool, actor).await?;
        let row = sqlx::query_as::<_, ManagementDailyNote>(
            "UPDATE management_daily_notes
             SET is_resolved = TRUE, resolved_by = $2, resolved_at = NOW(),
                 resolution_notes = COALESCE($3, resolution_notes), updated_by = $4
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(resolver)
        .bind(resolution_notes)
        .bind(actor)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound("Management note"))?;
        Ok(row)
    }
}

// ------------------------------------------------------ management handovers

pub struct ManagementHandoverService;

impl ManagementHandoverService {
    pub async fn list(pool: &PgPool, q: &HandoverQuery) -> anyhow::Result<(Vec<ManagementHandover>, i64)> {
        let (limit, offset) = paginate(q.page, q.per_page);
        let filter = "WHERE ($1::date IS NULL OR handover_date = $1)
                        AND ($2::bool IS NULL OR acknowledged = $2)";

        let rows = sqlx::query_as::<_, ManagementHandover>(&format!(
            "SELECT * FROM management_handovers {filter} ORDER BY handover_date DESC, created_at DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(q.date)
        .bind(q.acknowledged)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM management_handovers {filter}"))
            .bind(q.date)
            .bind(q.acknowledged)
            .fetch_one(pool)
            .await?;
        Ok((rows, total))
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> anyhow::Result<ManagementHandover> {
        let row = sqlx::query_as::<_, ManagementHandover>("SELECT * FROM management_handovers WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("Management handover"))?;
        Ok(row)
    }

    pub async fn create(
        pool: &PgPool,
        req: &ManagementHandoverRequest,
        actor: Uuid,
    ) -> anyhow::Result<ManagementHandover> {
        let from = caller_staff(pool, actor).await?;
        let to_id = required(req.handed_over_to, "handed_over_to")?;
        let notes = required_text(&req.notes, "notes")?;
        let recipient = StaffService::get(pool, to_id).await?;

        let row = sqlx::query_as::<_, ManagementHandover>(
            "INSERT INTO management_handovers (
                handed_over_by, handed_over_to, handover_date, notes, urgent_matters,
                follow_up_required, created_by, updated_by)
             VALUES ($1, $2, COALESCE($3, CURRENT_DATE), $4, $5, $6, $7, $7)
             RETURNING *",
        )
        .bind(from.id)
        .bind(recipient.id)
        .bind(req.handover_date)
        .bind(notes)
        .bind(req.urgent_matters.as_deref().unwrap_or(""))
        .bind(req.follow_up_required.as_deref().unwrap_or(""))
        .bind(actor)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    pub async fn acknowledge(pool: &PgPool, id: Uuid, actor: Uuid) -> anyhow::Result<ManagementHandover> {
        let row = sqlx::query_as::<_, ManagementHandover>(
            "UPDATE management_handovers
             SET acknowledged = TRUE, acknowledged_at = COALESCE(acknowledged_at, NOW()), updated_by = $2
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(actor)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound("Management handover"))?;
        Ok(row)
    }
}

// ------------------------------------------------------- governance records

pub struct GovernanceService;

impl GovernanceService {
    /// Confidential records are only listed when `include_confidential`.
    pub async fn list(
        pool: &PgPool,
        q: &GovernanceQuery,
        include_confidential: bool,
    ) -> anyhow::Result<(Vec<GovernanceRecord>, i64)> {
        let (limit, offset) = paginate(q.page, q.per_page);
        let search = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(|s| format!("%{s}%"));
        let filter = "WHERE ($1::text IS NULL OR record_type = $1)
                        AND ($2::bool IS NULL OR follow_up_required = $2)
                        AND ($3::text IS NULL OR title ILIKE $3 OR description ILIKE $3)
                        AND ($4 OR is_confidential = FALSE)";

        let rows = sqlx::query_as::<_, GovernanceRecord>(&format!(
            "SELECT * FROM governance_records {filter} ORDER BY date_recorded DESC, created_at DESC
             LIMIT $5 OFFSET $6"
        ))
        .bind(&q.record_type)
        .bind(q.follow_up_required)
        .bind(&search)
        .bind(include_confidential)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM governance_records {filter}"))
            .bind(&q.record_type)
            .bind(q.follow_up_required)
            .bind(&search)
            .bind(include_confidential)
            .fetch_one(pool)
            .await?;
        Ok((rows, total))
    }

    pub async fn get(pool: &PgPool, id: Uuid, include_confidential: bool) -> anyhow::Result<GovernanceRecord> {
        let row = sqlx::query_as::<_, GovernanceRecord>("SELECT * FROM governance_records WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .filter(|r| include_confidential || !r.is_confidential)
            .ok_or(DomainError::NotFound("Governance record"))?;
        Ok(row)
    }

    pub async fn create(pool: &PgPool, req: &GovernanceRequest, actor: Uuid) -> anyhow::Result<GovernanceRecord> {
        req.validate()?;
        let title = required_text(&req.title, "title")?;
        let record_type = required_text(&req.record_type, "record_type")?;
        let description = required_text(&req.description, "description")?;

        let row = sqlx::query_as::<_, GovernanceRecord>(
            "INSERT INTO governance_records (
                priority, title, record_type, description, date_occurred, date_recorded,
                related_department_id, related_service_user_id, related_staff_id, actions_taken,
                follow_up_required, follow_up_details, follow_up_actions, outcome, notes,
                is_confidential, document_ids, created_by, updated_by)
             VALUES ($1, $2, $3, $4, COALESCE($5, CURRENT_DATE), COALESCE($6, CURRENT_DATE),
                     $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $18)
             RETURNING *",
        )
        .bind(req.priority.as_deref().unwrap_or("medium"))
        .bind(title)
        .bind(record_type)
        .bind(description)
        .bind(req.date_occurred)
        .bind(req.date_recorded)
        .bind(req.related_department_id)
        .bind(req.related_service_user_id)
        .bind(req.related_staff_id)
        .bind(req.actions_taken.as_deref().unwrap_or(""))
        .bind(req.follow_up_required.unwrap_or(false))
        .bind(req.follow_up_details.as_deref().unwrap_or(""))
        .bind(req.follow_up_actions.as_deref().unwrap_or(""))
        .bind(req.outcome.as_deref().unwrap_or(""))
        .bind(req.notes.as_deref().unwrap_or(""))
        .bind(req.is_confidential.unwrap_or(false))
        .bind(req.document_ids.clone().unwrap_or_default())
        .bind(actor)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        req: &GovernanceRequest,
        actor: Uuid,
    ) -> anyhow::Result<GovernanceRecord> {
        req.validate()?;
        let row = sqlx::query_as::<_, GovernanceRecord>(
            "UPDATE governance_records SET
                priority                = COALESCE($2, priority),
                title                   = COALESCE($3, title),
                record_type             = COALESCE($4, record_type),
                description             = COALESCE($5, description),
                date_occurred           = COALESCE($6, date_occurred),
                date_recorded           = COALESCE($7, date_recorded),
                related_department_id   = COALESCE($8, related_department_id),
                related_service_user_id = COALESCE($9, related_service_user_id),
                related_staff_id        = COALESCE($10, related_staff_id),
                actions_taken           = COALESCE($11, actions_taken),
                follow_up_required      = COALESCE($12, follow_up_required),
                follow_up_details       = COALESCE($13, follow_up_details),
                follow_up_actions       = COALESCE($14, follow_up_actions),
                outcome                 = COALESCE($15, outcome),
                notes                   = COALESCE($16, notes),
                is_confidential         = COALESCE($17, is_confidential),
                document_ids            = COALESCE($18, document_ids),
                updated_by              = $19
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&req.priority)
        .bind(&req.title)
        .bind(&req.record_type)
        .bind(&req.description)
        .bind(req.date_occurred)
        .bind(req.date_recorded)
        .bind(req.related_department_id)
        .bind(req.related_service_user_id)
        .bind(req.related_staff_id)
        .bind(&req.actions_taken)
        .bind(req.follow_up_required)
        .bind(&req.follow_up_details)
        .bind(&req.follow_up_actions)
        .bind(&req.outcome)
        .bind(&req.notes)
        .bind(req.is_confidential)
        .bind(&req.document_ids)
        .bind(actor)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound("Governance record"))?;
        Ok(row)
    }
}
