use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::{FromRow, PgPool};

use crate::{models::records::Activity, services::medication::MedicationService};

/// Days covered by the incident report.
const INCIDENT_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Serialize, FromRow)]
struct LabelCount {
    label: String,
    count: i64,
}

#[derive(Debug, Serialize, FromRow)]
struct ShiftRow {
    staff_id: String,
    staff_name: String,
    shift_type: String,
    start_time: chrono::NaiveTime,
    end_time: chrono::NaiveTime,
    is_completed: bool,
}

pub struct ReportService;

impl ReportService {
    pub async fn daily_activities(pool: &PgPool, date: NaiveDate) -> anyhow::Result<Value> {
        let activities = sqlx::query_as::<_, Activity>(
            "SELECT * FROM activities WHERE date = $1 ORDER BY start_time",
        )
        .bind(date)
        .fetch_all(pool)
        .await?;

        let by_type = sqlx::query_as::<_, LabelCount>(
            "SELECT activity_type AS label, COUNT(*) AS count
             FROM activities WHERE date = $1
             GROUP BY activity_type ORDER BY activity_type",
        )
        .bind(date)
        .fetch_all(pool)
        .await?;

        let completed = activities.iter().filter(|a| a.is_completed).count();
        Ok(json!({
            "report": "daily_activities",
            "date": date,
            "total": activities.len(),
            "completed": completed,
            "by_type": by_type,
            "activities": activities,
        }))
    }

    pub async fn medication(pool: &PgPool, now: NaiveDateTime) -> anyhow::Result<Value> {
        let mut body = MedicationService::report(pool, now).await?;
        body["report"] = json!("medication");
        Ok(body)
    }

    pub async fn incidents(pool: &PgPool, today: NaiveDate) -> anyhow::Result<Value> {
        let since = today - Duration::days(INCIDENT_WINDOW_DAYS);

        let by_severity = sqlx::query_as::<_, LabelCount>(
            "SELECT severity AS label, COUNT(*) AS count
             FROM incidents WHERE date >= $1
             GROUP BY severity ORDER BY severity",
        )
        .bind(since)
        .fetch_all(pool)
        .await?;

        let by_type = sqlx::query_as::<_, LabelCount>(
            "SELECT incident_type AS label, COUNT(*) AS count
             FROM incidents WHERE date >= $1
             GROUP BY incident_type ORDER BY count DESC, incident_type",
        )
        .bind(since)
        .fetch_all(pool)
        .await?;

        let (total, follow_up): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE follow_up_required)
             FROM incidents WHERE date >= $1",
        )
        .bind(since)
        .fetch_one(pool)
        .await?;

        Ok(json!({
            "report": "incidents",
            "from": since,
            "to": today,
            "total": total,
            "follow_up_required": follow_up,
            "by_severity": by_severity,
            "by_type": by_type,
        }))
    }

    pub async fn staff_shifts(pool: &PgPool, date: NaiveDate) -> anyhow::Result<Value> {
        let shifts = sqlx::query_as::<_, ShiftRow>(
            "SELECT sm.staff_id,
                    u.first_name || ' ' || u.last_name AS staff_name,
                    s.shift_type, s.start_time, s.end_time, s.is_completed
             FROM staff_shifts s
             JOIN staff_members sm ON sm.id = s.staff_member_id
             JOIN users u ON u.id = sm.user_id
             WHERE s.shift_date = $1
             ORDER BY s.start_time, staff_name",
        )
        .bind(date)
        .fetch_all(pool)
        .await?;

        Ok(json!({
            "report": "staff_shifts",
            "date": date,
            "total": shifts.len(),
            "shifts": shifts,
        }))
    }
}
