use std::collections::HashMap;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use serde_json::{json, Value};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    error::DomainError,
    models::{
        medication::{
            check_witness, validate_schedule, AdministerRequest, AdministrationQuery, AdministrationRow,
            AdministrationStatus, CreateMedicationRequest, ExportQuery, Medication,
            MedicationAdministration, MedicationQuery, TimePeriod, UpdateMedicationRequest,
            FREQUENCIES, MEDICATION_TYPES,
        },
        paginate,
        records::check_choice,
    },
    services::{auth::AuthService, metrics::ADMINISTRATIONS_COUNTER, staff::StaffService},
};

const ADMINISTRATION_SELECT: &str = "
    SELECT ma.id, ma.medication_id, m.name AS medication_name, m.service_user_id,
           su.first_name || ' ' || su.last_name AS service_user_name,
           ma.administered_by, au.first_name || ' ' || au.last_name AS administered_by_name,
           ma.witness_id, wu.first_name || ' ' || wu.last_name AS witness_name,
           ma.administered_date, ma.administered_time, ma.scheduled_time,
           ma.dose_administered, ma.status, ma.notes, ma.refusal_reason
    FROM medication_administrations ma
    JOIN medications m ON m.id = ma.medication_id
    JOIN service_users su ON su.id = m.service_user_id
    JOIN staff_members ast ON ast.id = ma.administered_by
    JOIN users au ON au.id = ast.user_id
    LEFT JOIN staff_members wst ON wst.id = ma.witness_id
    LEFT JOIN users wu ON wu.id = wst.user_id";

/// Minutes ahead that count as "due soon" in the medication report.
const DUE_SOON_MINUTES: i64 = 60;

const LOW_STOCK_REPORT_LIMIT: usize = 20;

/// Local wall-clock time to the stored UTC instant. Skipped local times
/// (DST gaps) have no instant and yield None.
fn local_to_utc(local: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

async fn store_next_due(
    tx: &mut Transaction<'_, Postgres>,
    med: &Medication,
    now: NaiveDateTime,
) -> anyhow::Result<Medication> {
    let next = med.next_due_time(now).and_then(local_to_utc);
    let row = sqlx::query_as::<_, Medication>(
        "UPDATE medications SET next_due_time = $2 WHERE id = $1 RETURNING *",
    )
    .bind(med.id)
    .bind(next)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row)
}

/// Given administrations per date for one medication between two dates.
async fn given_per_day(
    pool: &PgPool,
    medication_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> anyhow::Result<HashMap<NaiveDate, i64>> {
    let rows: Vec<(NaiveDate, i64)> = sqlx::query_as(
        "SELECT administered_date, COUNT(*) FROM medication_administrations
         WHERE medication_id = $1 AND status = 'given'
           AND administered_date BETWEEN $2 AND $3
         GROUP BY administered_date",
    )
    .bind(medication_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}

/// The witness must be another active staff member who re-enters their password.
async fn verify_witness(
    tx: &mut Transaction<'_, Postgres>,
    administered_by: Uuid,
    witness_id: Uuid,
    password: Option<&str>,
) -> anyhow::Result<()> {
    let witness: Option<(bool, String)> = sqlx::query_as(
        "SELECT sm.is_active AND u.is_active, u.password_hash
         FROM staff_members sm JOIN users u ON u.id = sm.user_id
         WHERE sm.id = $1",
    )
    .bind(witness_id)
    .fetch_optional(&mut **tx)
    .await?;

    let password = check_witness(administered_by, witness_id, witness.as_ref().map(|w| w.0), password)?;
    let hash = witness.map(|w| w.1).unwrap_or_default();
    if !AuthService::verify_password(password, &hash) {
        return Err(DomainError::InvalidWitness("Invalid witness password.".into()).into());
    }
    Ok(())
}

pub struct MedicationService;

impl MedicationService {
    pub async fn list(
        pool: &PgPool,
        q: &MedicationQuery,
        low_stock_threshold: i32,
    ) -> anyhow::Result<(Vec<Medication>, i64)> {
        let (limit, offset) = paginate(q.page, q.per_page);
        let search = q.search.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(|s| format!("%{s}%"));
        let low_stock = q.low_stock.unwrap_or(false);
        let filter = "WHERE ($1::uuid IS NULL OR service_user_id = $1)
                        AND ($2::text IS NULL OR medication_type = $2)
                        AND ($3::bool IS NULL OR is_controlled_drug = $3)
                        AND ($4::bool IS NULL OR is_active = $4)
                        AND (NOT $5 OR current_balance <= $6)
                        AND ($7::text IS NULL OR name ILIKE $7)";

        let rows = sqlx::query_as::<_, Medication>(&format!(
            "SELECT * FROM medications {filter} ORDER BY name LIMIT $8 OFFSET $9"
        ))
        .bind(q.service_user_id)
        .bind(&q.medication_type)
        .bind(q.is_controlled_drug)
        .bind(q.is_active)
        .bind(low_stock)
        .bind(low_stock_threshold)
        .bind(&search)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM medications {filter}"))
            .bind(q.service_user_id)
            .bind(&q.medication_type)
            .bind(q.is_controlled_drug)
            .bind(q.is_active)
            .bind(low_stock)
            .bind(low_stock_threshold)
            .bind(&search)
            .fetch_one(pool)
            .await?;
        Ok((rows, total))
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> anyhow::Result<Medication> {
        let row = sqlx::query_as::<_, Medication>("SELECT * FROM medications WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("Medication"))?;
        Ok(row)
    }

    pub async fn create(
        pool: &PgPool,
        req: &CreateMedicationRequest,
        actor: Uuid,
        now: NaiveDateTime,
    ) -> anyhow::Result<Medication> {
        req.validate()?;
        let mut tx = pool.begin().await?;

        let med = sqlx::query_as::<_, Medication>(
            "INSERT INTO medications (
                service_user_id, name, medication_type, dosage, frequency,
                administer_morning, morning_time, morning_dosage,
                administer_afternoon, afternoon_time, afternoon_dosage,
                administer_evening, evening_time, evening_dosage,
                administer_night, night_time, night_dosage,
                administer_prn, prn_instructions, prn_max_daily, route,
                start_date, end_date, prescribed_by, reason, is_controlled_drug,
                total_quantity, current_balance, instructions,
                requires_refrigeration, special_handling, created_by, updated_by)
             VALUES ($1, $2, $3, $4, $5,
                     $6, COALESCE($7, '08:00'::time), $8,
                     $9, COALESCE($10, '13:00'::time), $11,
                     $12, COALESCE($13, '18:00'::time), $14,
                     $15, COALESCE($16, '22:00'::time), $17,
                     $18, $19, $20, $21,
                     $22, $23, $24, $25, $26,
                     $27, $27, $28,
                     $29, $30, $31, $31)
             RETURNING *",
        )
        .bind(req.service_user_id)
        .bind(req.name.trim())
        .bind(&req.medication_type)
        .bind(req.dosage.trim())
        .bind(req.frequency.as_deref().unwrap_or("once_daily"))
        .bind(req.administer_morning)
        .bind(req.morning_time)
        .bind(req.period_dosage(req.administer_morning, &req.morning_dosage))
        .bind(req.administer_afternoon)
        .bind(req.afternoon_time)
        .bind(req.period_dosage(req.administer_afternoon, &req.afternoon_dosage))
        .bind(req.administer_evening)
        .bind(req.evening_time)
        .bind(req.period_dosage(req.administer_evening, &req.evening_dosage))
        .bind(req.administer_night)
        .bind(req.night_time)
        .bind(req.period_dosage(req.administer_night, &req.night_dosage))
        .bind(req.administer_prn)
        .bind(req.prn_instructions.as_deref().unwrap_or(""))
        .bind(req.prn_max_daily.unwrap_or(0))
        .bind(req.route.as_deref().unwrap_or(""))
        .bind(req.start_date)
        .bind(req.end_date)
        .bind(req.prescribed_by.trim())
        .bind(req.reason.as_deref().unwrap_or(""))
        .bind(req.is_controlled_drug)
        .bind(req.total_quantity)
        .bind(req.instructions.as_deref().unwrap_or(""))
        .bind(req.requires_refrigeration)
        .bind(req.special_handling.as_deref().unwrap_or(""))
        .bind(actor)
        .fetch_one(&mut *tx)
        .await?;

        let med = store_next_due(&mut tx, &med, now).await?;
        tx.commit().await?;
        Ok(med)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        req: &UpdateMedicationRequest,
        actor: Uuid,
        now: NaiveDateTime,
    ) -> anyhow::Result<Medication> {
        if let Some(kind) = req.medication_type.as_deref() {
            check_choice(kind, MEDICATION_TYPES, "medication_type")?;
        }
        if let Some(freq) = req.frequency.as_deref() {
            check_choice(freq, FREQUENCIES, "frequency")?;
        }

        let mut tx = pool.begin().await?;
        let med = sqlx::query_as::<_, Medication>(
            "UPDATE medications SET
                name                   = COALESCE($2, name),
                medication_type        = COALESCE($3, medication_type),
                dosage                 = COALESCE($4, dosage),
                frequency              = COALESCE($5, frequency),
                administer_morning     = COALESCE($6, administer_morning),
                morning_time           = COALESCE($7, morning_time),
                morning_dosage         = COALESCE($8, morning_dosage),
                administer_afternoon   = COALESCE($9, administer_afternoon),
                afternoon_time         = COALESCE($10, afternoon_time),
                afternoon_dosage       = COALESCE($11, afternoon_dosage),
                administer_evening     = COALESCE($12, administer_evening),
                evening_time           = COALESCE($13, evening_time),
                evening_dosage         = COALESCE($14, evening_dosage),
                administer_night       = COALESCE($15, administer_night),
                night_time             = COALESCE($16, night_time),
                night_dosage           = COALESCE($17, night_dosage),
                administer_prn         = COALESCE($18, administer_prn),
                prn_instructions       = COALESCE($19, prn_instructions),
                prn_max_daily          = COALESCE($20, prn_max_daily),
                route                  = COALESCE($21, route),
                start_date             = COALESCE($22, start_date),
                end_date               = CASE WHEN $31 THEN $23 ELSE end_date END,
                prescribed_by          = COALESCE($24, prescribed_by),
                reason                 = COALESCE($25, reason),
                is_controlled_drug     = COALESCE($26, is_controlled_drug),
                instructions           = COALESCE($27, instructions),
                requires_refrigeration = COALESCE($28, requires_refrigeration),
                special_handling       = COALESCE($29, special_handling),
                updated_by             = $30
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&req.name)
        .bind(&req.medication_type)
        .bind(&req.dosage)
        .bind(&req.frequency)
        .bind(req.administer_morning)
        .bind(req.morning_time)
        .bind(&req.morning_dosage)
        .bind(req.administer_afternoon)
        .bind(req.afternoon_time)
        .bind(&req.afternoon_dosage)
        .bind(req.administer_evening)
        .bind(req.evening_time)
        .bind(&req.evening_dosage)
        .bind(req.administer_night)
        .bind(req.night_time)
        .bind(&req.night_dosage)
        .bind(req.administer_prn)
        .bind(&req.prn_instructions)
        .bind(req.prn_max_daily)
        .bind(&req.route)
        .bind(req.start_date)
        .bind(req.end_date.flatten())
        .bind(&req.prescribed_by)
        .bind(&req.reason)
        .bind(req.is_controlled_drug)
        .bind(&req.instructions)
        .bind(req.requires_refrigeration)
        .bind(&req.special_handling)
        .bind(actor)
        .bind(req.end_date.is_some())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DomainError::NotFound("Medication"))?;

        // The merged row must still describe a valid schedule; dropping the
        // transaction rolls the update back.
        validate_schedule(
            [
                med.administer_morning,
                med.administer_afternoon,
                med.administer_evening,
                med.administer_night,
            ],
            med.administer_prn,
            med.prn_max_daily,
        )?;
        if matches!(med.end_date, Some(end) if end < med.start_date) {
            return Err(DomainError::Validation("end_date is before start_date".into()).into());
        }

        let med = store_next_due(&mut tx, &med, now).await?;
        tx.commit().await?;
        Ok(med)
    }

    pub async fn toggle_active(
        pool: &PgPool,
        id: Uuid,
        actor: Uuid,
        now: NaiveDateTime,
    ) -> anyhow::Result<Medication> {
        let mut tx = pool.begin().await?;
        let med = sqlx::query_as::<_, Medication>(
            "UPDATE medications SET is_active = NOT is_active, updated_by = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(actor)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DomainError::NotFound("Medication"))?;
        let med = store_next_due(&mut tx, &med, now).await?;
        tx.commit().await?;
        Ok(med)
    }

    /// Record one administration against the locked medication row.
    pub async fn administer(
        pool: &PgPool,
        medication_id: Uuid,
        user_id: Uuid,
        req: &AdministerRequest,
        now: NaiveDateTime,
    ) -> anyhow::Result<MedicationAdministration> {
        if !req.confirm {
            return Err(DomainError::Validation(
                "Please confirm that the medication has been administered.".into(),
            )
            .into());
        }
        if req.dose_administered < 0 {
            return Err(DomainError::Validation("Dose administered cannot be negative".into()).into());
        }
        let staff = StaffService::find_by_user(pool, user_id)
            .await?
            .filter(|s| s.is_active)
            .ok_or_else(|| {
                DomainError::Forbidden("Only active staff members can record administrations".into())
            })?;
        let status = req.status.unwrap_or(AdministrationStatus::Given);

        let mut tx = pool.begin().await?;
        let med = sqlx::query_as::<_, Medication>("SELECT * FROM medications WHERE id = $1 FOR UPDATE")
            .bind(medication_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DomainError::NotFound("Medication"))?;

        med.check_administration(status, req.dose_administered, req.witness_id.is_some())?;
        if let Some(witness_id) = req.witness_id {
            verify_witness(&mut tx, staff.id, witness_id, req.witness_password.as_deref()).await?;
        }

        let record = sqlx::query_as::<_, MedicationAdministration>(
            "INSERT INTO medication_administrations (
                medication_id, administered_by, administered_date, administered_time,
                scheduled_time, dose_administered, status, witness_id, notes, refusal_reason,
                created_by, updated_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
             RETURNING *",
        )
        .bind(med.id)
        .bind(staff.id)
        .bind(req.administered_date.unwrap_or(now.date()))
        .bind(req.administered_time.unwrap_or(now.time()))
        .bind(req.scheduled_time)
        .bind(req.dose_administered)
        .bind(status.to_string())
        .bind(req.witness_id)
        .bind(req.notes.as_deref().unwrap_or(""))
        .bind(req.refusal_reason.as_deref().unwrap_or(""))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if status == AdministrationStatus::Given {
            let next = med.next_due_time(now).and_then(local_to_utc);
            sqlx::query(
                "UPDATE medications
                 SET current_balance = current_balance - $2, last_administered = NOW(),
                     next_due_time = $3, updated_by = $4
                 WHERE id = $1",
            )
            .bind(med.id)
            .bind(req.dose_administered)
            .bind(next)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        ADMINISTRATIONS_COUNTER.with_label_values(&[&status.to_string()]).inc();
        Ok(record)
    }

    pub async fn detail(pool: &PgPool, id: Uuid, now: NaiveDateTime) -> anyhow::Result<Value> {
        let med = Self::get(pool, id).await?;
        let today = now.date();
        let week_start = today - Duration::days(6);

        let recent = sqlx::query_as::<_, AdministrationRow>(&format!(
            "{ADMINISTRATION_SELECT} WHERE ma.medication_id = $1
             ORDER BY ma.administered_date DESC, ma.administered_time DESC LIMIT 10"
        ))
        .bind(id)
        .fetch_all(pool)
        .await?;

        let (today_count, week_count, total_count): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*) FILTER (WHERE administered_date = $2),
                    COUNT(*) FILTER (WHERE administered_date >= $3),
                    COUNT(*)
             FROM medication_administrations WHERE medication_id = $1 AND status = 'given'",
        )
        .bind(id)
        .bind(today)
        .bind(week_start)
        .fetch_one(pool)
        .await?;

        let given = given_per_day(pool, id, week_start, today).await?;
        let missed = med.missed_doses(week_start, today, now, &given);

        Ok(json!({
            "medication": med,
            "time_periods": med.time_periods(),
            "status": med.status(now, today_count),
            "next_due_time": med.next_due_time(now),
            "recent_administrations": recent,
            "stats": {
                "today": today_count,
                "last_7_days": week_count,
                "total": total_count,
                "missed_last_7_days": missed,
            },
        }))
    }

    /// Active residents' medications grouped by administration period.
    pub async fn dashboard(pool: &PgPool, now: NaiveDateTime) -> anyhow::Result<Value> {
        let today = now.date();
        let current = TimePeriod::current(now.hour());

        let residents: Vec<(Uuid, String, String, String)> = sqlx::query_as(
            "SELECT su.id, su.first_name, su.last_name, su.room_number FROM service_users su
             WHERE su.is_active = TRUE
               AND EXISTS (SELECT 1 FROM medications m WHERE m.service_user_id = su.id AND m.is_active = TRUE)
             ORDER BY su.last_name, su.first_name",
        )
        .fetch_all(pool)
        .await?;

        let meds = sqlx::query_as::<_, Medication>(
            "SELECT m.* FROM medications m JOIN service_users su ON su.id = m.service_user_id
             WHERE m.is_active = TRUE AND su.is_active = TRUE ORDER BY m.name",
        )
        .fetch_all(pool)
        .await?;

        let given_today: HashMap<Uuid, i64> = sqlx::query_as::<_, (Uuid, i64)>(
            "SELECT medication_id, COUNT(*) FROM medication_administrations
             WHERE administered_date = $1 AND status = 'given' GROUP BY medication_id",
        )
        .bind(today)
        .fetch_all(pool)
        .await?
        .into_iter()
        .collect();

        let mut by_resident: HashMap<Uuid, Vec<Medication>> = HashMap::new();
        for med in meds {
            by_resident.entry(med.service_user_id).or_default().push(med);
        }

        let entries: Vec<Value> = residents
            .into_iter()
            .map(|(id, first, last, room)| {
                let meds = by_resident.remove(&id).unwrap_or_default();
                let mut periods = serde_json::Map::new();
                for period in TimePeriod::TIMED.iter().chain(std::iter::once(&TimePeriod::Prn)) {
                    let scheduled: Vec<Value> = meds
                        .iter()
                        .filter(|m| m.is_scheduled_in(*period))
                        .filter_map(|m| {
                            let dose = m.time_periods().into_iter().find(|d| d.period == *period)?;
                            let given = given_today.get(&m.id).copied().unwrap_or(0);
                            Some(json!({
                                "id": m.id,
                                "name": m.name,
                                "dosage": dose.dosage,
                                "time": dose.time,
                                "route": m.route,
                                "is_controlled_drug": m.is_controlled_drug,
                                "current_balance": m.current_balance,
                                "status": m.status(now, given),
                            }))
                        })
                        .collect();
                    periods.insert(period.to_string(), Value::Array(scheduled));
                }
                json!({
                    "service_user": {
                        "id": id,
                        "name": format!("{first} {last}"),
                        "room_number": room,
                    },
                    "periods": periods,
                })
            })
            .collect();

        Ok(json!({
            "current_period": current,
            "date": today,
            "residents": entries,
        }))
    }

    pub async fn list_administrations(
        pool: &PgPool,
        q: &AdministrationQuery,
    ) -> anyhow::Result<(Vec<AdministrationRow>, i64)> {
        let (limit, offset) = paginate(q.page, q.per_page);
        let filter = "WHERE ($1::uuid IS NULL OR m.service_user_id = $1)
                        AND ($2::uuid IS NULL OR ma.medication_id = $2)
                        AND ($3::date IS NULL OR ma.administered_date = $3)";

        let rows = sqlx::query_as::<_, AdministrationRow>(&format!(
            "{ADMINISTRATION_SELECT} {filter}
             ORDER BY ma.administered_date DESC, ma.administered_time DESC LIMIT $4 OFFSET $5"
        ))
        .bind(q.service_user_id)
        .bind(q.medication_id)
        .bind(q.date)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM medication_administrations ma
             JOIN medications m ON m.id = ma.medication_id {filter}"
        ))
        .bind(q.service_user_id)
        .bind(q.medication_id)
        .bind(q.date)
        .fetch_one(pool)
        .await?;
        Ok((rows, total))
    }

    pub async fn get_administration(pool: &PgPool, id: Uuid) -> anyhow::Result<AdministrationRow> {
        let row = sqlx::query_as::<_, AdministrationRow>(&format!("{ADMINISTRATION_SELECT} WHERE ma.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("Administration"))?;
        Ok(row)
    }

    /// Administrations between two dates inclusive, as CSV.
    pub async fn export_csv(pool: &PgPool, q: &ExportQuery) -> anyhow::Result<Vec<u8>> {
        if q.end_date < q.start_date {
            return Err(DomainError::Validation("end_date is before start_date".into()).into());
        }
        let rows = sqlx::query_as::<_, AdministrationRow>(&format!(
            "{ADMINISTRATION_SELECT}
             WHERE ma.administered_date BETWEEN $1 AND $2
               AND ($3::uuid IS NULL OR m.service_user_id = $3)
             ORDER BY ma.administered_date, ma.administered_time"
        ))
        .bind(q.start_date)
        .bind(q.end_date)
        .bind(q.service_user_id)
        .fetch_all(pool)
        .await?;

        administrations_csv(&rows)
    }

    /// Stock and due-soon figures, computed from the live schedule at `now`.
    pub async fn report(pool: &PgPool, now: NaiveDateTime) -> anyhow::Result<Value> {
        let active = sqlx::query_as::<_, Medication>(
            "SELECT * FROM medications WHERE is_active = TRUE ORDER BY current_balance, name",
        )
        .fetch_all(pool)
        .await?;

        let due_soon = active.iter().filter(|m| m.is_due_within(now, DUE_SOON_MINUTES)).count();
        let low_stock: Vec<&Medication> = active.iter().filter(|m| m.is_below_quarter()).collect();

        Ok(json!({
            "active_medications": active.len(),
            "low_stock_count": low_stock.len(),
            "due_soon_count": due_soon,
            "low_stock": low_stock.iter().take(LOW_STOCK_REPORT_LIMIT).collect::<Vec<_>>(),
        }))
    }
}

fn administrations_csv(rows: &[AdministrationRow]) -> anyhow::Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record([
        "Date",
        "Time",
        "Scheduled",
        "Service User",
        "Medication",
        "Dose",
        "Status",
        "Administered By",
        "Witness",
        "Notes",
        "Refusal Reason",
    ])?;
    for r in rows {
        wtr.write_record([
            r.administered_date.to_string(),
            r.administered_time.format("%H:%M").to_string(),
            r.scheduled_time.map(|t| t.format("%H:%M").to_string()).unwrap_or_default(),
            r.service_user_name.clone(),
            r.medication_name.clone(),
            r.dose_administered.to_string(),
            r.status.clone(),
            r.administered_by_name.clone(),
            r.witness_name.clone().unwrap_or_default(),
            r.notes.clone(),
            r.refusal_reason.clone(),
        ])?;
    }
    wtr.into_inner().map_err(|e| anyhow::anyhow!("CSV flush failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    #[test]
    fn csv_has_header_and_one_line_per_row() {
        let row = AdministrationRow {
            id: Uuid::new_v4(),
            medication_id: Uuid::new_v4(),
            medication_name: "Paracetamol".into(),
            service_user_id: Uuid::new_v4(),
            service_user_name: "Ada Lovelace".into(),
            administered_by: Uuid::new_v4(),
            administered_by_name: "Sam Carer".into(),
            witness_id: None,
            witness_name: None,
            administered_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            administered_time: NaiveTime::from_hms_opt(8, 5, 0).unwrap(),
            scheduled_time: NaiveTime::from_hms_opt(8, 0, 0),
            dose_administered: 2,
            status: "given".into(),
            notes: "Taken with water, no issues".into(),
            refusal_reason: String::new(),
        };
        let out = String::from_utf8(administrations_csv(&[row]).unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Date,Time,Scheduled"));
        assert_eq!(
            lines[1],
            "2024-05-01,08:05,08:00,Ada Lovelace,Paracetamol,2,given,Sam Carer,,\"Taken with water, no issues\","
        );
    }

    #[test]
    fn local_time_converts_to_utc_instant() {
        let local = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let utc = local_to_utc(local).unwrap();
        assert_eq!(utc.with_timezone(&Local).naive_local(), local);
    }
}
