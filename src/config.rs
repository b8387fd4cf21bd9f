use std::env;
use std::time::Duration;

/// Durable storage (S3-compatible) settings. Enabled only when both key
/// halves are present; the backup engine degrades gracefully without it.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub bucket: String,
}

/// SMTP settings for owner-facing email. Absent config degrades the sender
/// to log-only delivery.
#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub storage: Option<StorageConfig>,
    pub smtp: Option<SmtpConfig>,
    pub virustotal_api_key: Option<String>,
    pub job_attempts: u32,
    pub job_backoff: Duration,
    pub backup_retention_days: i64,
    pub monitor_worker_concurrency: usize,
    pub backup_worker_concurrency: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let database_url = get("DATABASE_URL").ok_or("DATABASE_URL must be set".to_string())?;

        let storage = match (get("S3_ACCESS_KEY_ID"), get("S3_SECRET_ACCESS_KEY")) {
            (Some(access_key_id), Some(secret_access_key)) => Some(StorageConfig {
                access_key_id,
                secret_access_key,
                region: get("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                endpoint: get("S3_ENDPOINT"),
                bucket: get("S3_BUCKET")
                    .ok_or("S3_BUCKET must be set when S3 credentials are present".to_string())?,
            }),
            _ => None,
        };

        let smtp = match (get("SMTP_HOST"), get("SMTP_USER"), get("SMTP_PASSWORD")) {
            (Some(host), Some(username), Some(password)) => Some(SmtpConfig {
                host,
                port: parse_or("SMTP_PORT", &get, 587)?,
                username,
                password,
                from_address: get("SMTP_FROM")
                    .unwrap_or_else(|| "noreply@siteguard.app".to_string()),
            }),
            _ => None,
        };

        Ok(AppConfig {
            database_url,
            storage,
            smtp,
            virustotal_api_key: get("VIRUSTOTAL_API_KEY"),
            job_attempts: parse_or("JOB_ATTEMPTS", &get, 3)?,
            job_backoff: Duration::from_millis(parse_or("JOB_BACKOFF_MS", &get, 5000)?),
            backup_retention_days: parse_or("BACKUP_RETENTION_DAYS", &get, 30)?,
            monitor_worker_concurrency: parse_or("MONITOR_WORKER_CONCURRENCY", &get, 5)?,
            backup_worker_concurrency: parse_or("BACKUP_WORKER_CONCURRENCY", &get, 2)?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &str,
    get: &impl Fn(&str) -> Option<String>,
    default: T,
) -> Result<T, String> {
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| format!("{key} is not a valid value: {raw}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |key| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = AppConfig::from_lookup(lookup(&[(
            "DATABASE_URL",
            "postgres://localhost/siteguard",
        )]))
        .unwrap();

        assert!(cfg.storage.is_none());
        assert!(cfg.smtp.is_none());
        assert_eq!(cfg.job_attempts, 3);
        assert_eq!(cfg.job_backoff, Duration::from_millis(5000));
        assert_eq!(cfg.backup_retention_days, 30);
        assert_eq!(cfg.monitor_worker_concurrency, 5);
        assert_eq!(cfg.backup_worker_concurrency, 2);
    }

    #[test]
    fn missing_database_url_is_an_error() {
        assert!(AppConfig::from_lookup(lookup(&[])).is_err());
    }

    #[test]
    fn storage_requires_bucket() {
        let err = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/siteguard"),
            ("S3_ACCESS_KEY_ID", "key"),
            ("S3_SECRET_ACCESS_KEY", "secret"),
        ]))
        .unwrap_err();
        assert!(err.contains("S3_BUCKET"));
    }

    #[test]
    fn storage_config_is_parsed() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/siteguard"),
            ("S3_ACCESS_KEY_ID", "key"),
            ("S3_SECRET_ACCESS_KEY", "secret"),
            ("S3_BUCKET", "siteguard-backups"),
            ("S3_ENDPOINT", "http://minio:9000"),
            ("BACKUP_RETENTION_DAYS", "7"),
        ]))
        .unwrap();

        let storage = cfg.storage.unwrap();
        assert_eq!(storage.region, "us-east-1");
        assert_eq!(storage.endpoint.as_deref(), Some("http://minio:9000"));
        assert_eq!(cfg.backup_retention_days, 7);
    }
}
