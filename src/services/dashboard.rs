use chrono::{Duration, NaiveDate};
use serde_json::{json, Value};
use sqlx::{postgres::PgRow, FromRow, PgPool};
use uuid::Uuid;

use crate::{
    models::{
        medication::Medication,
        records::{Activity, Appointment, Incident, Trip, Visitor, VitalSigns},
        resident::ServiceUser,
        workflow::{DailySummary, GovernanceRecord, ManagementDailyNote, ManagementHandover, StaffHandover},
    },
    services::workflow::caller_staff,
};

/// Previous day, and the next day unless it lies in the future.
fn day_navigation(date: NaiveDate, today: NaiveDate) -> (NaiveDate, Option<NaiveDate>) {
    let next = date + Duration::days(1);
    (date - Duration::days(1), (next <= today).then_some(next))
}

/// Rows of one resident on one day; `$1` is the resident, `$2` the date.
async fn for_day<T>(pool: &PgPool, sql: &str, resident: Uuid, date: NaiveDate) -> anyhow::Result<Vec<T>>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    Ok(sqlx::query_as::<_, T>(sql).bind(resident).bind(date).fetch_all(pool).await?)
}

pub struct DashboardService;

impl DashboardService {
    pub async fn management(pool: &PgPool, today: NaiveDate) -> anyhow::Result<Value> {
        let (active_residents, active_staff, todays_activities, incidents_follow_up): (i64, i64, i64, i64) =
            sqlx::query_as(
                "SELECT
                    (SELECT COUNT(*) FROM service_users WHERE is_active = TRUE),
                    (SELECT COUNT(*) FROM staff_members WHERE is_active = TRUE),
                    (SELECT COUNT(*) FROM activities WHERE date = $1),
                    (SELECT COUNT(*) FROM incidents WHERE follow_up_required = TRUE)",
            )
            .bind(today)
            .fetch_one(pool)
            .await?;

        let action_notes = sqlx::query_as::<_, ManagementDailyNote>(
            "SELECT * FROM management_daily_notes
             WHERE action_required = TRUE AND is_resolved = FALSE
             ORDER BY action_deadline ASC NULLS LAST, created_at DESC
             LIMIT 5",
        )
        .fetch_all(pool)
        .await?;

        let handovers = sqlx::query_as::<_, ManagementHandover>(
            "SELECT * FROM management_handovers
             WHERE handover_date >= $1
             ORDER BY handover_date ASC, created_at ASC
             LIMIT 5",
        )
        .bind(today)
        .fetch_all(pool)
        .await?;

        let governance = sqlx::query_as::<_, GovernanceRecord>(
            "SELECT * FROM governance_records
             WHERE follow_up_required = TRUE
             ORDER BY date_recorded DESC
             LIMIT 5",
        )
        .fetch_all(pool)
        .await?;

        Ok(json!({
            "dashboard": "management",
            "date": today,
            "active_residents": active_residents,
            "active_staff": active_staff,
            "todays_activities": todays_activities,
            "incidents_requiring_follow_up": incidents_follow_up,
            "action_required_notes": action_notes,
            "upcoming_handovers": handovers,
            "governance_follow_ups": governance,
        }))
    }

    /// One day of records for every active resident the caller is key worker for.
    pub async fn staff(pool: &PgPool, user_id: Uuid, date: NaiveDate, today: NaiveDate) -> anyhow::Result<Value> {
        let staff = caller_staff(pool, user_id).await?;
        let residents = sqlx::query_as::<_, ServiceUser>(
            "SELECT * FROM service_users
             WHERE is_active = TRUE AND key_worker_id = $1
             ORDER BY last_name, first_name",
        )
        .bind(staff.id)
        .fetch_all(pool)
        .await?;

        let mut entries = Vec::with_capacity(residents.len());
        for resident in &residents {
            let id = resident.id;
            let activities: Vec<Activity> = for_day(
                pool,
                "SELECT * FROM activities WHERE service_user_id = $1 AND date = $2 ORDER BY start_time",
                id,
                date,
            )
            .await?;
            let incidents: Vec<Incident> = for_day(
                pool,
                "SELECT * FROM incidents WHERE service_user_id = $1 AND date = $2 ORDER BY time",
                id,
                date,
            )
            .await?;
            let visitors: Vec<Visitor> = for_day(
                pool,
                "SELECT * FROM visitors WHERE service_user_id = $1 AND visit_date = $2 ORDER BY arrival_time",
                id,
                date,
            )
            .await?;
            let trips: Vec<Trip> = for_day(
                pool,
                "SELECT * FROM trips WHERE $1 = ANY(service_user_ids) AND date = $2 ORDER BY departure_time",
                id,
                date,
            )
            .await?;
            let daily_summaries: Vec<DailySummary> = for_day(
                pool,
                "SELECT ds.* FROM daily_summaries ds JOIN staff_shifts s ON s.id = ds.shift_id
                 WHERE $1 = ANY(ds.service_users_present) AND s.shift_date = $2
                 ORDER BY s.start_time",
                id,
                date,
            )
            .await?;
            let handovers: Vec<StaffHandover> = for_day(
                pool,
                "SELECT * FROM staff_handovers WHERE $1 = ANY(service_users_covered) AND shift_date = $2
                 ORDER BY created_at",
                id,
                date,
            )
            .await?;
            let appointments: Vec<Appointment> = for_day(
                pool,
                "SELECT * FROM appointments WHERE service_user_id = $1 AND date = $2 ORDER BY start_time",
                id,
                date,
            )
            .await?;
            let vitals: Vec<VitalSigns> = for_day(
                pool,
                "SELECT * FROM vital_signs WHERE service_user_id = $1 AND recorded_date = $2 ORDER BY recorded_time",
                id,
                date,
            )
            .await?;
            let medications = sqlx::query_as::<_, Medication>(
                "SELECT * FROM medications WHERE service_user_id = $1 AND is_active = TRUE ORDER BY name",
            )
            .bind(id)
            .fetch_all(pool)
            .await?;

            entries.push(json!({
                "service_user": resident,
                "activities": activities,
                "medications": medications,
                "incidents": incidents,
                "visitors": visitors,
                "trips": trips,
                "daily_summaries": daily_summaries,
                "handovers": handovers,
                "appointments": appointments,
                "vital_signs": vitals,
            }));
        }

        let (previous_date, next_date) = day_navigation(date, today);
        let mut body = json!({
            "dashboard": "staff",
            "staff_member": { "id": staff.id, "name": staff.full_name() },
            "date": date,
            "previous_date": previous_date,
            "residents": entries,
        });
        if let Some(next) = next_date {
            body["next_date"] = json!(next);
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn next_day_is_hidden_when_viewing_today() {
        let today = d(2025, 6, 10);
        assert_eq!(day_navigation(today, today), (d(2025, 6, 9), None));
    }

    #[test]
    fn next_day_is_offered_for_past_dates() {
        let today = d(2025, 6, 10);
        assert_eq!(day_navigation(d(2025, 6, 1), today), (d(2025, 5, 31), Some(d(2025, 6, 2))));
    }
}
