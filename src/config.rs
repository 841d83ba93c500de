use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    pub jwt_expiry_seconds: u64,
    pub jwt_refresh_expiry_days: u64,
    /// 64 hex chars, fed through HKDF before use.
    pub encryption_master_key: String,
    pub media_dir: String,
    pub host: String,
    pub port: u16,
    pub app_base_url: String,
    pub cqc_default_delay_hours: i64,
    pub rate_limit_window_secs: u64,
    pub rate_limit_max_requests: u64,
    pub low_stock_threshold: i32,
    // SMTP (optional)
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let encryption_master_key = required("ENCRYPTION_MASTER_KEY")?;
        if encryption_master_key.len() != 64 || hex::decode(&encryption_master_key).is_err() {
            anyhow::bail!("ENCRYPTION_MASTER_KEY must be 64 hex characters");
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
            jwt_secret: required("JWT_SECRET")?,
            jwt_refresh_secret: required("JWT_REFRESH_SECRET")?,
            jwt_expiry_seconds: parsed("JWT_EXPIRY_SECONDS", "900")?,
            jwt_refresh_expiry_days: parsed("JWT_REFRESH_EXPIRY_DAYS", "30")?,
            encryption_master_key,
            media_dir: env::var("MEDIA_DIR").unwrap_or_else(|_| "/data/media".into()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parsed("PORT", "8080")?,
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost".into()),
            cqc_default_delay_hours: parsed("CQC_DEFAULT_DELAY_HOURS", "48")?,
            rate_limit_window_secs: parsed("RATE_LIMIT_WINDOW_SECS", "60")?,
            rate_limit_max_requests: parsed("RATE_LIMIT_MAX_REQUESTS", "100")?,
            low_stock_threshold: parsed("LOW_STOCK_THRESHOLD", "5")?,
            smtp_host: env::var("SMTP_HOST").ok().filter(|s| !s.is_empty()),
            smtp_port: env::var("SMTP_PORT").ok().and_then(|v| v.parse().ok()),
            smtp_username: env::var("SMTP_USERNAME").ok().filter(|s| !s.is_empty()),
            smtp_password: env::var("SMTP_PASSWORD").ok().filter(|s| !s.is_empty()),
            smtp_from: env::var("SMTP_FROM").ok().filter(|s| !s.is_empty()),
        })
    }
}

/// `key` parsed as `T`, falling back to `default` when unset.
fn parsed<T>(key: &str, default: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(key).unwrap_or_else(|_| default.into());
    raw.parse().map_err(|e| anyhow::anyhow!("Invalid value for {key}: {e}"))
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Missing required env var: {key}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset_and_bad_values_are_reported() {
        let port: u16 = parsed("CAREHOME_TEST_UNSET_PORT", "8080").unwrap();
        assert_eq!(port, 8080);

        let err = parsed::<u16>("CAREHOME_TEST_UNSET_PORT", "eighty").unwrap_err();
        assert!(err.to_string().contains("CAREHOME_TEST_UNSET_PORT"));
    }
}
