use autosnap_common::retention::DEFAULT_RETENTION_DAYS;
use autosnap_common::{AutosnapError, RetentionPolicy, DEFAULT_NAME_PREFIX};
use autosnap_providers::metadata::DEFAULT_IMDS_ENDPOINT;
use std::path::PathBuf;
use std::str::FromStr;

use crate::snapshot_job::{JobConfig, DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MIN_PAGE_SIZE};

pub const DEFAULT_PROVIDER: &str = "ec2";

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub job: JobConfig,
    /// Exit non-zero when the run fails. Off by default: a failed run is
    /// reported through the error log line only.
    pub fail_on_error: bool,
    pub provider: String,
    pub region: Option<String>,
    pub imds_endpoint: String,
    /// Skips the metadata service when set.
    pub instance_id: Option<String>,
    pub mock_fixture: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Full,
    Compact,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match std::env::var("AUTOSNAP_LOG_FORMAT") {
            Ok(v) if v.trim().eq_ignore_ascii_case("compact") => LogFormat::Compact,
            _ => LogFormat::Full,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, AutosnapError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AutosnapError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let retention_days = match get("AUTOSNAP_RETENTION_DAYS") {
            Some(raw) => parse_number::<u32>("AUTOSNAP_RETENTION_DAYS", &raw)?,
            None => DEFAULT_RETENTION_DAYS,
        };
        let name_prefix =
            get("AUTOSNAP_NAME_PREFIX").unwrap_or_else(|| DEFAULT_NAME_PREFIX.to_string());
        let retention = RetentionPolicy::new(retention_days, name_prefix)?;

        let page_size = match get("AUTOSNAP_PAGE_SIZE") {
            Some(raw) => parse_number::<i32>("AUTOSNAP_PAGE_SIZE", &raw)?,
            None => DEFAULT_PAGE_SIZE,
        }
        .clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);

        let max_pages = match get("AUTOSNAP_MAX_PAGES") {
            Some(raw) => parse_number::<u32>("AUTOSNAP_MAX_PAGES", &raw)?,
            None => DEFAULT_MAX_PAGES,
        };
        if max_pages == 0 {
            return Err(AutosnapError::Config(
                "AUTOSNAP_MAX_PAGES must be greater than zero".to_string(),
            ));
        }

        let dry_run = match get("AUTOSNAP_DRY_RUN") {
            Some(raw) => parse_bool("AUTOSNAP_DRY_RUN", &raw)?,
            None => false,
        };
        let fail_on_error = match get("AUTOSNAP_FAIL_ON_ERROR") {
            Some(raw) => parse_bool("AUTOSNAP_FAIL_ON_ERROR", &raw)?,
            None => false,
        };

        Ok(Self {
            job: JobConfig {
                retention,
                page_size,
                max_pages,
                dry_run,
            },
            fail_on_error,
            provider: get("PROVIDER")
                .map(|p| p.to_ascii_lowercase())
                .unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
            region: get("AUTOSNAP_REGION").or_else(|| get("AWS_REGION")),
            imds_endpoint: get("AUTOSNAP_IMDS_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_IMDS_ENDPOINT.to_string()),
            instance_id: get("AUTOSNAP_INSTANCE_ID"),
            mock_fixture: get("AUTOSNAP_MOCK_FIXTURE").map(PathBuf::from),
        })
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T, AutosnapError> {
    raw.parse::<T>()
        .map_err(|_| AutosnapError::Config(format!("{} must be a non-negative integer, got '{}'", key, raw)))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, AutosnapError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AutosnapError::Config(format!(
            "{} must be a boolean, got '{}'",
            key, raw
        ))),
    }
}
