use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::DomainError,
    models::notification::{SystemSetting, UpdateSettingRequest},
};

pub struct SettingsService;

impl SettingsService {
    pub async fn list(pool: &PgPool) -> anyhow::Result<Vec<SystemSetting>> {
        let rows = sqlx::query_as::<_, SystemSetting>("SELECT * FROM system_settings ORDER BY key")
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    pub async fn get(pool: &PgPool, key: &str) -> anyhow::Result<SystemSetting> {
        let row = sqlx::query_as::<_, SystemSetting>("SELECT * FROM system_settings WHERE key = $1")
            .bind(key)
            .fetch_optional(pool)
            .await?
            .ok_or(DomainError::NotFound("Setting"))?;
        Ok(row)
    }

    /// Sets `key`, creating it on first write.
    pub async fn upsert(
        pool: &PgPool,
        key: &str,
        req: &UpdateSettingRequest,
        actor: Uuid,
    ) -> anyhow::Result<SystemSetting> {
        let key = key.trim();
        if key.is_empty() || key.len() > 100 {
            return Err(DomainError::Validation("Setting key must be 1-100 characters".into()).into());
        }
        let row = sqlx::query_as::<_, SystemSetting>(
            "INSERT INTO system_settings (key, value, description, is_active, created_by, updated_by)
             VALUES ($1, $2, COALESCE($3, ''), COALESCE($4, TRUE), $5, $5)
             ON CONFLICT (key) DO UPDATE SET
                value       = EXCLUDED.value,
                description = COALESCE($3, system_settings.description),
                is_active   = COALESCE($4, system_settings.is_active),
                updated_by  = $5
             RETURNING *",
        )
        .bind(key)
        .bind(&req.value)
        .bind(&req.description)
        .bind(req.is_active)
        .bind(actor)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }
}
