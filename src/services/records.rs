use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::DomainError,
    models::{
        paginate,
        records::{
            default_cqc_viewable_after, required, Activity, ActivityPhoto, ActivityRequest,
            Appointment, AppointmentRequest, Incident, IncidentRequest, RecordQuery, Trip,
            TripRequest, Visitor, VisitorRequest, VitalSigns, VitalSignsRequest,
        },
    },
    services::{metrics::INCIDENTS_COUNTER, photos::{self, UploadedImage}, staff::StaffService},
};

/// Non-blank text field required on create.
fn required_text<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, DomainError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DomainError::Validation(format!("{field} is required")))
}

/// `$1` resident, `$2` exact date, `$3`..`$4` date range.
fn common_filter(resident: &str, date_col: &str) -> String {
    format!(
        "WHERE ($1::uuid IS NULL OR {resident})
           AND ($2::date IS NULL OR {date_col} = $2)
           AND ($3::date IS NULL OR {date_col} >= $3)
           AND ($4::date IS NULL OR {date_col} <= $4)"
    )
}

// ----------------------------------------------------------------- activities

pub struct ActivityService;

impl ActivityService {
    pub async fn list(pool: &PgPool, q: &RecordQuery) -> anyhow::Result<(Vec<Activity>, i64)> {
        let (limit, offset) = paginate(q.page, q.per_page);
        let filter = format!(
            "{} AND ($5::text IS NULL OR activity_type = $5) AND ($6::bool IS NULL OR is_completed = $6)",
            common_filter("service_user_id = $1", "date")
        );

        let rows = sqlx::query_as::<_, Activity>(&format!(
            "SELECT * FROM activities {filter} ORDER BY date DESC, start_time DESC LIMIT $7 OFFSET $8"
        ))
        .bind(q.service_user_id)
        .bind(q.date)
        .bind(q.start_date)
        .bind(q.end_date)
        .bind(&q.kind)
        .bind(q.is_completed)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM activities {filter}"))
            .bind(q.service_user_id)
            .bind(q.date)
            .bind(q.start_date)
            .bind(q.end_date)
            .bind(&q.kind)
            .bind(q.is_completed)
            .fetch_one(pool)
            .await?;
        Ok((rows, total))
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> anyhow::Result<Activity> {
        let row = sqlx::query_as::<_, Activity>("SELECT * FROM activities WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("Activity"))?;
        Ok(row)
    }

    pub async fn create(pool: &PgPool, req: &ActivityRequest, actor: Uuid) -> anyhow::Result<Activity> {
        req.validate()?;
        let service_user_id = required(req.service_user_id, "service_user_id")?;
        let activity_type = required_text(&req.activity_type, "activity_type")?;
        let title = required_text(&req.title, "title")?;
        let description = required_text(&req.description, "description")?;
        let start_time = required(req.start_time, "start_time")?;

        let row = sqlx::query_as::<_, Activity>(
            "INSERT INTO activities (
                service_user_id, activity_type, title, description, date, start_time, end_time,
                location, staff_involved, meal_type, food_consumed, fluid_intake, appetite_level,
                provider, notes, is_completed, created_by, updated_by)
             VALUES ($1, $2, $3, $4, COALESCE($5, CURRENT_DATE), $6, $7,
                     $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $17)
             RETURNING *",
        )
        .bind(service_user_id)
        .bind(activity_type)
        .bind(title)
        .bind(description)
        .bind(req.date)
        .bind(start_time)
        .bind(req.end_time)
        .bind(req.location.as_deref().unwrap_or(""))
        .bind(req.staff_involved.clone().unwrap_or_default())
        .bind(&req.meal_type)
        .bind(req.food_consumed.as_deref().unwrap_or(""))
        .bind(req.fluid_intake)
        .bind(req.appetite_level)
        .bind(req.provider.as_deref().unwrap_or(""))
        .bind(req.notes.as_deref().unwrap_or(""))
        .bind(req.is_completed.unwrap_or(false))
        .bind(actor)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    pub async fn update(pool: &PgPool, id: Uuid, req: &ActivityRequest, actor: Uuid) -> anyhow::Result<Activity> {
        req.validate()?;
        let row = sqlx::query_as::<_, Activity>(
            "UPDATE activities SET
                activity_type  = COALESCE($2, activity_type),
                title          = COALESCE($3, title),
                description    = COALESCE($4, description),
                date           = COALESCE($5, date),
                start_time     = COALESCE($6, start_time),
                end_time       = COALESCE($7, end_time),
                location       = COALESCE($8, location),
                staff_involved = COALESCE($9, staff_involved),
                meal_type      = COALESCE($10, meal_type),
                food_consumed  = COALESCE($11, food_consumed),
                fluid_intake   = COALESCE($12, fluid_intake),
                appetite_level = COALESCE($13, appetite_level),
                provider       = COALESCE($14, provider),
                notes          = COALESCE($15, notes),
                is_completed   = COALESCE($16, is_completed),
                updated_by     = $17
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&req.activity_type)
        .bind(&req.title)
        .bind(&req.description)
        .bind(req.date)
        .bind(req.start_time)
        .bind(req.end_time)
        .bind(&req.location)
        .bind(&req.staff_involved)
        .bind(&req.meal_type)
        .bind(&req.food_consumed)
        .bind(req.fluid_intake)
        .bind(req.appetite_level)
        .bind(&req.provider)
        .bind(&req.notes)
        .bind(req.is_completed)
        .bind(actor)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound("Activity"))?;
        Ok(row)
    }

    pub async fn mark_completed(pool: &PgPool, id: Uuid, actor: Uuid) -> anyhow::Result<Activity> {
        let row = sqlx::query_as::<_, Activity>(
            "UPDATE activities SET is_completed = TRUE, updated_by = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(actor)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound("Activity"))?;
        Ok(row)
    }

    pub async fn photos(pool: &PgPool, activity_id: Uuid) -> anyhow::Result<Vec<ActivityPhoto>> {
        let rows = sqlx::query_as::<_, ActivityPhoto>(
            "SELECT * FROM activity_photos WHERE activity_id = $1 ORDER BY uploaded_at",
        )
        .bind(activity_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// Store the image under `activities/` and attach it, with the optional
    /// `caption` field, to the activity.
    pub async fn add_photo(
        pool: &PgPool,
        media_dir: &str,
        activity_id: Uuid,
        upload: &UploadedImage,
    ) -> anyhow::Result<ActivityPhoto> {
        Self::get(pool, activity_id).await?;
        let caption: String = upload.field("caption").unwrap_or("").chars().take(200).collect();

        let path = photos::store(media_dir, "activities", upload.ext, &upload.bytes).await?;
        let inserted = sqlx::query_as::<_, ActivityPhoto>(
            "INSERT INTO activity_photos (activity_id, photo_path, caption) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(activity_id)
        .bind(&path)
        .bind(&caption)
        .fetch_one(pool)
        .await;

        match inserted {
            Ok(photo) => Ok(photo),
            Err(e) => {
                photos::remove(media_dir, &path).await;
                Err(e.into())
            }
        }
    }
}

// ------------------------------------------------------------------ incidents

pub struct IncidentService;

impl IncidentService {
    pub async fn list(pool: &PgPool, q: &RecordQuery) -> anyhow::Result<(Vec<Incident>, i64)> {
        let (limit, offset) = paginate(q.page, q.per_page);
        let filter = format!(
            "{} AND ($5::text IS NULL OR incident_type = $5)
                AND ($6::text IS NULL OR severity = $6)
                AND ($7::bool IS NULL OR follow_up_required = $7)",
            common_filter("service_user_id = $1", "date")
        );

        let rows = sqlx::query_as::<_, Incident>(&format!(
            "SELECT * FROM incidents {filter} ORDER BY date DESC, time DESC LIMIT $8 OFFSET $9"
        ))
        .bind(q.service_user_id)
        .bind(q.date)
        .bind(q.start_date)
        .bind(q.end_date)
        .bind(&q.kind)
        .bind(&q.severity)
        .bind(q.follow_up_required)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM incidents {filter}"))
            .bind(q.service_user_id)
            .bind(q.date)
            .bind(q.start_date)
            .bind(q.end_date)
            .bind(&q.kind)
            .bind(&q.severity)
            .bind(q.follow_up_required)
            .fetch_one(pool)
            .await?;
        Ok((rows, total))
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> anyhow::Result<Incident> {
        let row = sqlx::query_as::<_, Incident>("SELECT * FROM incidents WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("Incident"))?;
        Ok(row)
    }

    /// New incidents stay hidden from CQC for `cqc_delay_hours` unless the
    /// request sets its own release time.
    pub async fn create(
        pool: &PgPool,
        req: &IncidentRequest,
        actor: Uuid,
        cqc_delay_hours: i64,
    ) -> anyhow::Result<Incident> {
        req.validate()?;
        let service_user_id = required(req.service_user_id, "service_user_id")?;
        let incident_type = required_text(&req.incident_type, "incident_type")?;
        let title = required_text(&req.title, "title")?;
        let description = required_text(&req.description, "description")?;
        let location = required_text(&req.location, "location")?;
        let severity = required_text(&req.severity, "severity")?;
        let actions_taken = required_text(&req.actions_taken, "actions_taken")?;
        let viewable_after = req
            .cqc_viewable_after
            .unwrap_or_else(|| default_cqc_viewable_after(Utc::now(), cqc_delay_hours));

        let row = sqlx::query_as::<_, Incident>(
            "INSERT INTO incidents (
                service_user_id, incident_type, title, description, date, time, location,
                severity, staff_involved, witnesses, actions_taken, follow_up_required,
                follow_up_notes, reported_to_family, family_notification_details,
                antecedent, behavior, consequence, cqc_can_view, cqc_viewable_after,
                created_by, updated_by)
             VALUES ($1, $2, $3, $4, COALESCE($5, CURRENT_DATE), COALESCE($6, LOCALTIME), $7,
                     $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $21)
             RETURNING *",
        )
        .bind(service_user_id)
        .bind(incident_type)
        .bind(title)
        .bind(description)
        .bind(req.date)
        .bind(req.time)
        .bind(location)
        .bind(severity)
        .bind(req.staff_involved.clone().unwrap_or_default())
        .bind(req.witnesses.as_deref().unwrap_or(""))
        .bind(actions_taken)
        .bind(req.follow_up_required.unwrap_or(false))
        .bind(req.follow_up_notes.as_deref().unwrap_or(""))
        .bind(req.reported_to_family.unwrap_or(false))
        .bind(req.family_notification_details.as_deref().unwrap_or(""))
        .bind(req.antecedent.as_deref().unwrap_or(""))
        .bind(req.behavior.as_deref().unwrap_or(""))
        .bind(req.consequence.as_deref().unwrap_or(""))
        .bind(req.cqc_can_view.unwrap_or(true))
        .bind(viewable_after)
        .bind(actor)
        .fetch_one(pool)
        .await?;

        INCIDENTS_COUNTER.with_label_values(&[row.severity.as_str()]).inc();
        Ok(row)
    }

    pub async fn update(pool: &PgPool, id: Uuid, req: &IncidentRequest, actor: Uuid) -> anyhow::Result<Incident> {
        req.validate()?;
        let row = sqlx::query_as::<_, Incident>(
            "UPDATE incidents SET
                incident_type               = COALESCE($2, incident_type),
                title                       = COALESCE($3, title),
                description                 = COALESCE($4, description),
                date                        = COALESCE($5, date),
                time                        = COALESCE($6, time),
                location                    = COALESCE($7, location),
                severity                    = COALESCE($8, severity),
                staff_involved              = COALESCE($9, staff_involved),
                witnesses                   = COALESCE($10, witnesses),
                actions_taken               = COALESCE($11, actions_taken),
                follow_up_required          = COALESCE($12, follow_up_required),
                follow_up_notes             = COALESCE($13, follow_up_notes),
                reported_to_family          = COALESCE($14, reported_to_family),
                family_notification_details = COALESCE($15, family_notification_details),
                antecedent                  = COALESCE($16, antecedent),
                behavior                    = COALESCE($17, behavior),
                consequence                 = COALESCE($18, consequence),
                cqc_can_view                = COALESCE($19, cqc_can_view),
                cqc_viewable_after          = COALESCE($20, cqc_viewable_after),
                updated_by                  = $21
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&req.incident_type)
        .bind(&req.title)
        .bind(&req.description)
        .bind(req.date)
        .bind(req.time)
        .bind(&req.location)
        .bind(&req.severity)
        .bind(&req.staff_involved)
        .bind(&req.witnesses)
        .bind(&req.actions_taken)
        .bind(req.follow_up_required)
        .bind(&req.follow_up_notes)
        .bind(req.reported_to_family)
        .bind(&req.family_notification_details)
        .bind(&req.antecedent)
        .bind(&req.behavior)
        .bind(&req.consequence)
        .bind(req.cqc_can_view)
        .bind(req.cqc_viewable_after)
        .bind(actor)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound("Incident"))?;
        Ok(row)
    }

    pub async fn toggle_follow_up(pool: &PgPool, id: Uuid, actor: Uuid) -> anyhow::Result<Incident> {
        let row = sqlx::query_as::<_, Incident>(
            "UPDATE incidents SET follow_up_required = NOT follow_up_required, updated_by = $2
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(actor)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound("Incident"))?;
        Ok(row)
    }
}

// --------------------------------------------------------------- appointments

pub struct AppointmentService;

impl AppointmentService {
    pub async fn list(pool: &PgPool, q: &RecordQuery, today: NaiveDate) -> anyhow::Result<(Vec<Appointment>, i64)> {
        let (limit, offset) = paginate(q.page, q.per_page);
        let upcoming = q.upcoming.unwrap_or(false);
        let filter = format!(
            "{} AND ($5::text IS NULL OR appointment_type = $5)
                AND ($6::bool IS NULL OR is_completed = $6)
                AND (NOT $7 OR (date >= $8 AND is_completed = FALSE))",
            common_filter("service_user_id = $1", "date")
        );
        let order = if upcoming { "date, start_time" } else { "date DESC, start_time DESC" };

        let rows = sqlx::query_as::<_, Appointment>(&format!(
            "SELECT * FROM appointments {filter} ORDER BY {order} LIMIT $9 OFFSET $10"
        ))
        .bind(q.service_user_id)
        .bind(q.date)
        .bind(q.start_date)
        .bind(q.end_date)
        .bind(&q.kind)
        .bind(q.is_completed)
        .bind(upcoming)
        .bind(today)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM appointments {filter}"))
            .bind(q.service_user_id)
            .bind(q.date)
            .bind(q.start_date)
            .bind(q.end_date)
            .bind(&q.kind)
            .bind(q.is_completed)
            .bind(upcoming)
            .bind(today)
            .fetch_one(pool)
            .await?;
        Ok((rows, total))
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> anyhow::Result<Appointment> {
        let row = sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("Appointment"))?;
        Ok(row)
    }

    pub async fn create(pool: &PgPool, req: &AppointmentRequest, actor: Uuid) -> anyhow::Result<Appointment> {
        req.validate()?;
        let service_user_id = required(req.service_user_id, "service_user_id")?;
        let appointment_type = required_text(&req.appointment_type, "appointment_type")?;
        let title = required_text(&req.title, "title")?;
        let date = required(req.date, "date")?;
        let start_time = required(req.start_time, "start_time")?;
        let location = required_text(&req.location, "location")?;

        let row = sqlx::query_as::<_, Appointment>(
            "INSERT INTO appointments (
                service_user_id, appointment_type, title, description, date, start_time, end_time,
                location, provider, staff_accompanying, notes, transport_arranged,
                transport_details, created_by, updated_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
             RETURNING *",
        )
        .bind(service_user_id)
        .bind(appointment_type)
        .bind(title)
        .bind(req.description.as_deref().unwrap_or(""))
        .bind(date)
        .bind(start_time)
        .bind(req.end_time)
        .bind(location)
        .bind(req.provider.as_deref().unwrap_or(""))
        .bind(req.staff_accompanying.clone().unwrap_or_default())
        .bind(req.notes.as_deref().unwrap_or(""))
        .bind(req.transport_arranged.unwrap_or(false))
        .bind(req.transport_details.as_deref().unwrap_or(""))
        .bind(actor)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        req: &AppointmentRequest,
        actor: Uuid,
    ) -> anyhow::Result<Appointment> {
        req.validate()?;
        let row = sqlx::query_as::<_, Appointment>(
            "UPDATE appointments SET
                appointment_type   = COALESCE($2, appointment_type),
                title              = COALESCE($3, title),
                description        = COALESCE($4, description),
                date               = COALESCE($5, date),
                start_time         = COALESCE($6, start_time),
                end_time           = COALESCE($7, end_time),
                location           = COALESCE($8, location),
                provider           = COALESCE($9, provider),
                staff_accompanying = COALESCE($10, staff_accompanying),
                notes              = COALESCE($11, notes),
                transport_arranged = COALESCE($12, transport_arranged),
                transport_details  = COALESCE($13, transport_details),
                updated_by         = $14
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&req.appointment_type)
        .bind(&req.title)
        .bind(&req.description)
        .bind(req.date)
        .bind(req.start_time)
        .bind(req.end_time)
        .bind(&req.location)
        .bind(&req.provider)
        .bind(&req.staff_accompanying)
        .bind(&req.notes)
        .bind(req.transport_arranged)
        .bind(&req.transport_details)
        .bind(actor)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound("Appointment"))?;
        Ok(row)
    }

    pub async fn mark_completed(pool: &PgPool, id: Uuid, actor: Uuid) -> anyhow::Result<Appointment> {
        let row = sqlx::query_as::<_, Appointment>(
            "UPDATE appointments SET is_completed = TRUE, updated_by = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(actor)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound("Appointment"))?;
        Ok(row)
    }
}

// ------------------------------------------------------------------- visitors

pub struct VisitorService;

impl VisitorService {
    pub async fn list(pool: &PgPool, q: &RecordQuery) -> anyhow::Result<(Vec<Visitor>, i64)> {
        let (limit, offset) = paginate(q.page, q.per_page);
        let filter = common_filter("service_user_id = $1", "visit_date");

        let rows = sqlx::query_as::<_, Visitor>(&format!(
            "SELECT * FROM visitors {filter} ORDER BY visit_date DESC, arrival_time DESC LIMIT $5 OFFSET $6"
        ))
        .bind(q.service_user_id)
        .bind(q.date)
        .bind(q.start_date)
        .bind(q.end_date)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM visitors {filter}"))
            .bind(q.service_user_id)
            .bind(q.date)
            .bind(q.start_date)
            .bind(q.end_date)
            .fetch_one(pool)
            .await?;
        Ok((rows, total))
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> anyhow::Result<Visitor> {
        let row = sqlx::query_as::<_, Visitor>("SELECT * FROM visitors WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("Visitor"))?;
        Ok(row)
    }

    pub async fn create(pool: &PgPool, req: &VisitorRequest, actor: Uuid) -> anyhow::Result<Visitor> {
        let service_user_id = required(req.service_user_id, "service_user_id")?;
        let visitor_name = required_text(&req.visitor_name, "visitor_name")?;
        let relationship = required_text(&req.relationship, "relationship")?;

        let row = sqlx::query_as::<_, Visitor>(
            "INSERT INTO visitors (
                service_user_id, visitor_name, relationship, phone_number, visit_date,
                arrival_time, departure_time, purpose, notes, covid_screening_passed,
                created_by, updated_by)
             VALUES ($1, $2, $3, $4, COALESCE($5, CURRENT_DATE), COALESCE($6, LOCALTIME),
                     $7, $8, $9, $10, $11, $11)
             RETURNING *",
        )
        .bind(service_user_id)
        .bind(visitor_name)
        .bind(relationship)
        .bind(req.phone_number.as_deref().unwrap_or(""))
        .bind(req.visit_date)
        .bind(req.arrival_time)
        .bind(req.departure_time)
        .bind(req.purpose.as_deref().unwrap_or(""))
        .bind(req.notes.as_deref().unwrap_or(""))
        .bind(req.covid_screening_passed.unwrap_or(false))
        .bind(actor)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    pub async fn update(pool: &PgPool, id: Uuid, req: &VisitorRequest, actor: Uuid) -> anyhow::Result<Visitor> {
        let row = sqlx::query_as::<_, Visitor>(
            "UPDATE visitors SET
                visitor_name           = COALESCE($2, visitor_name),
                relationship           = COALESCE($3, relationship),
                phone_number           = COALESCE($4, phone_number),
                visit_date             = COALESCE($5, visit_date),
                arrival_time           = COALESCE($6, arrival_time),
                departure_time         = COALESCE($7, departure_time),
                purpose                = COALESCE($8, purpose),
                notes                  = COALESCE($9, notes),
                covid_screening_passed = COALESCE($10, covid_screening_passed),
                updated_by             = $11
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&req.visitor_name)
        .bind(&req.relationship)
        .bind(&req.phone_number)
        .bind(req.visit_date)
        .bind(req.arrival_time)
        .bind(req.departure_time)
        .bind(&req.purpose)
        .bind(&req.notes)
        .bind(req.covid_screening_passed)
        .bind(actor)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound("Visitor"))?;
        Ok(row)
    }
}

// ---------------------------------------------------------------------- trips

pub struct TripService;

impl TripService {
    pub async fn list(pool: &PgPool, q: &RecordQuery) -> anyhow::Result<(Vec<Trip>, i64)> {
        let (limit, offset) = paginate(q.page, q.per_page);
        let filter = common_filter("$1 = ANY(service_user_ids)", "date");

        let rows = sqlx::query_as::<_, Trip>(&format!(
            "SELECT * FROM trips {filter} ORDER BY date DESC, departure_time DESC LIMIT $5 OFFSET $6"
        ))
        .bind(q.service_user_id)
        .bind(q.date)
        .bind(q.start_date)
        .bind(q.end_date)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM trips {filter}"))
            .bind(q.service_user_id)
            .bind(q.date)
            .bind(q.start_date)
            .bind(q.end_date)
            .fetch_one(pool)
            .await?;
        Ok((rows, total))
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> anyhow::Result<Trip> {
        let row = sqlx::query_as::<_, Trip>("SELECT * FROM trips WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("Trip"))?;
        Ok(row)
    }

    pub async fn create(pool: &PgPool, req: &TripRequest, actor: Uuid) -> anyhow::Result<Trip> {
        req.validate()?;
        let residents = required(req.service_user_ids.as_ref(), "service_user_ids")?;
        let destination = required_text(&req.destination, "destination")?;
        let purpose = required_text(&req.purpose, "purpose")?;
        let date = required(req.date, "date")?;
        let departure_time = required(req.departure_time, "departure_time")?;

        let row = sqlx::query_as::<_, Trip>(
            "INSERT INTO trips (
                service_user_ids, destination, purpose, date, departure_time, return_time,
                staff_accompanying, notes, estimated_cost, actual_cost,
                risk_assessment_completed, risk_assessment_details, created_by, updated_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
             RETURNING *",
        )
        .bind(residents)
        .bind(destination)
        .bind(purpose)
        .bind(date)
        .bind(departure_time)
        .bind(req.return_time)
        .bind(req.staff_accompanying.clone().unwrap_or_default())
        .bind(req.notes.as_deref().unwrap_or(""))
        .bind(req.estimated_cost)
        .bind(req.actual_cost)
        .bind(req.risk_assessment_completed.unwrap_or(false))
        .bind(req.risk_assessment_details.as_deref().unwrap_or(""))
        .bind(actor)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    pub async fn update(pool: &PgPool, id: Uuid, req: &TripRequest, actor: Uuid) -> anyhow::Result<Trip> {
        req.validate()?;
        let row = sqlx::query_as::<_, Trip>(
            "UPDATE trips SET
                service_user_ids          = COALESCE($2, service_user_ids),
                destination               = COALESCE($3, destination),
                purpose                   = COALESCE($4, purpose),
                date                      = COALESCE($5, date),
                departure_time            = COALESCE($6, departure_time),
                return_time               = COALESCE($7, return_time),
                staff_accompanying        = COALESCE($8, staff_accompanying),
                notes                     = COALESCE($9, notes),
                estimated_cost            = COALESCE($10, estimated_cost),
                actual_cost               = COALESCE($11, actual_cost),
                risk_assessment_completed = COALESCE($12, risk_assessment_completed),
                risk_assessment_details   = COALESCE($13, risk_assessment_details),
                updated_by                = $14
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&req.service_user_ids)
        .bind(&req.destination)
        .bind(&req.purpose)
        .bind(req.date)
        .bind(req.departure_time)
        .bind(req.return_time)
        .bind(&req.staff_accompanying)
        .bind(&req.notes)
        .bind(req.estimated_cost)
        .bind(req.actual_cost)
        .bind(req.risk_assessment_completed)
        .bind(&req.risk_assessment_details)
        .bind(actor)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound("Trip"))?;
        Ok(row)
    }
}

// ---------------------------------------------------------------- vital signs

pub struct VitalSignsService;

impl VitalSignsService {
    pub async fn list(pool: &PgPool, q: &RecordQuery) -> anyhow::Result<(Vec<VitalSigns>, i64)> {
        let (limit, offset) = paginate(q.page, q.per_page);
        let filter = common_filter("service_user_id = $1", "recorded_date");

        let rows = sqlx::query_as::<_, VitalSigns>(&format!(
            "SELECT * FROM vital_signs {filter}
             ORDER BY recorded_date DESC, recorded_time DESC LIMIT $5 OFFSET $6"
        ))
        .bind(q.service_user_id)
        .bind(q.date)
        .bind(q.start_date)
        .bind(q.end_date)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM vital_signs {filter}"))
            .bind(q.service_user_id)
            .bind(q.date)
            .bind(q.start_date)
            .bind(q.end_date)
            .fetch_one(pool)
            .await?;
        Ok((rows, total))
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> anyhow::Result<VitalSigns> {
        let row = sqlx::query_as::<_, VitalSigns>("SELECT * FROM vital_signs WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("Vital signs"))?;
        Ok(row)
    }

    /// Recorded against the caller's staff record.
    pub async fn create(pool: &PgPool, req: &VitalSignsRequest, user_id: Uuid) -> anyhow::Result<VitalSigns> {
        req.validate()?;
        let service_user_id = required(req.service_user_id, "service_user_id")?;
        let staff = StaffService::find_by_user(pool, user_id)
            .await?
            .ok_or_else(|| DomainError::Forbidden("Only staff members can record vital signs".into()))?;

        let row = sqlx::query_as::<_, VitalSigns>(
            "INSERT INTO vital_signs (
                service_user_id, recorded_by, recorded_date, recorded_time, temperature, pulse,
                respiratory_rate, blood_pressure_systolic, blood_pressure_diastolic,
                oxygen_saturation, blood_glucose, pain_level, notes, created_by, updated_by)
             VALUES ($1, $2, COALESCE($3, CURRENT_DATE), COALESCE($4, LOCALTIME), $5, $6,
                     $7, $8, $9, $10, $11, $12, $13, $14, $14)
             RETURNING *",
        )
        .bind(service_user_id)
        .bind(staff.id)
        .bind(req.recorded_date)
        .bind(req.recorded_time)
        .bind(req.temperature)
        .bind(req.pulse)
        .bind(req.respiratory_rate)
        .bind(req.blood_pressure_systolic)
        .bind(req.blood_pressure_diastolic)
        .bind(req.oxygen_saturation)
        .bind(req.blood_glucose)
        .bind(req.pain_level)
        .bind(req.notes.as_deref().unwrap_or(""))
        .bind(user_id)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    pub async fn update(pool: &PgPool, id: Uuid, req: &VitalSignsRequest, actor: Uuid) -> anyhow::Result<VitalSigns> {
        req.validate()?;
        let row = sqlx::query_as::<_, VitalSigns>(
            "UPDATE vital_signs SET
                recorded_date            = COALESCE($2, recorded_date),
                recorded_time            = COALESCE($3, recorded_time),
                temperature              = COALESCE($4, temperature),
                pulse                    = COALESCE($5, pulse),
                respiratory_rate         = COALESCE($6, respiratory_rate),
                blood_pressure_systolic  = COALESCE($7, blood_pressure_systolic),
                blood_pressure_diastolic = COALESCE($8, blood_pressure_diastolic),
                oxygen_saturation        = COALESCE($9, oxygen_saturation),
                blood_glucose            = COALESCE($10, blood_glucose),
                pain_level               = COALESCE($11, pain_level),
                notes                    = COALESCE($12, notes),
                updated_by               = $13
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(req.recorded_date)
        .bind(req.recorded_time)
        .bind(req.temperature)
        .bind(req.pulse)
        .bind(req.respiratory_rate)
        .bind(req.blood_pressure_systolic)
        .bind(req.blood_pressure_diastolic)
        .bind(req.oxygen_saturation)
        .bind(req.blood_glucose)
        .bind(req.pain_level)
        .bind(&req.notes)
        .bind(actor)
        .fetch_optional(pool)
        .await?
        .ok_or(DomainError::NotFound("Vital signs"))?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_text_rejects_blank() {
        assert_eq!(required_text(&Some("  Lounge ".into()), "location").unwrap(), "Lounge");
        assert!(required_text(&Some("   ".into()), "location").is_err());
        assert!(required_text(&None, "location").is_err());
    }

    #[test]
    fn common_filter_targets_the_date_column() {
        let f = common_filter("service_user_id = $1", "visit_date");
        assert!(f.contains("visit_date = $2"));
        assert!(f.contains("visit_date >= $3"));
        assert!(f.contains("visit_date <= $4"));
    }
}
