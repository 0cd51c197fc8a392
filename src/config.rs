use anyhow::{Context, Result, anyhow};
use chrono::NaiveTime;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,
    pub reset_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Project attachments bucket
    pub storage_root: String,
    pub max_upload_bytes: usize,

    /// Base URL of the web client, used to build password reset links.
    pub app_base_url: String,

    /// Check-ins after this time of day are recorded as `late`.
    pub late_after: Option<NaiveTime>,

    pub log_dir: String,
    pub run_migrations: bool,
}

fn required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| anyhow!("{key} must be set"))
}

fn or_default<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let late_after = match env::var("LATE_AFTER") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                NaiveTime::parse_from_str(raw.trim(), "%H:%M")
                    .with_context(|| format!("LATE_AFTER must be HH:MM, got {raw}"))?,
            ),
            _ => None,
        };

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: or_default("ACCESS_TOKEN_TTL", 900)?, // 15 min
            refresh_token_ttl: or_default("REFRESH_TOKEN_TTL", 604_800)?, // 7 days
            reset_token_ttl: or_default("RESET_TOKEN_TTL", 3_600)?,

            rate_login_per_min: or_default("RATE_LOGIN_PER_MIN", 60)?,
            rate_register_per_min: or_default("RATE_REGISTER_PER_MIN", 30)?,
            rate_refresh_per_min: or_default("RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: or_default("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            storage_root: env::var("STORAGE_ROOT")
                .unwrap_or_else(|_| "storage/project-files".to_string()),
            max_upload_bytes: or_default("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,

            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            late_after,

            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            run_migrations: or_default("RUN_MIGRATIONS", false)?,
        })
    }
}

#[cfg(test)]
impl Config {
    /// Config for handler tests; never touches the environment.
    pub fn for_tests() -> Self {
        Self {
            database_url: "mysql://localhost/hr_portal_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            access_token_ttl: 900,
            refresh_token_ttl: 604_800,
            reset_token_ttl: 3_600,
            rate_login_per_min: 60,
            rate_register_per_min: 30,
            rate_refresh_per_min: 30,
            rate_protected_per_min: 1000,
            api_prefix: "/api".to_string(),
            storage_root: "storage/test".to_string(),
            max_upload_bytes: 1024,
            app_base_url: "http://localhost:8080".to_string(),
            late_after: None,
            log_dir: "logs".to_string(),
            run_migrations: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_optional_value_falls_back_to_default() {
        let ttl: usize = or_default("HR_PORTAL_SURELY_UNSET_TTL", 42).unwrap();
        assert_eq!(ttl, 42);
    }

    #[test]
    fn missing_required_value_names_the_variable() {
        let err = required("HR_PORTAL_SURELY_UNSET_SECRET").unwrap_err();
        assert!(err.to_string().contains("HR_PORTAL_SURELY_UNSET_SECRET"));
    }
}
