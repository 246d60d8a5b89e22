//! Configuration constants and validation functions for the harvester.

use std::sync::LazyLock;
use std::time::Duration;

use chrono::NaiveDate;
use regex::Regex;
use reqwest::Url;

use crate::error::{HarvesterError, Result};

/// Default OAI-PMH endpoint of the arXiv archive.
pub const DEFAULT_HOST: &str = "https://export.arxiv.org/oai2";

/// Default metadata format requested from the archive.
pub const DEFAULT_METADATA_PREFIX: &str = "oai_dc";

/// OAI-PMH verb used for every request.
pub const LIST_RECORDS_VERB: &str = "ListRecords";

/// Default HTTP timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default delay between two page requests in seconds.
///
/// arXiv answers with `503 Retry-After` when hammered, so pages are spaced out.
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 5;

/// Maximum length of the set and metadata format settings.
pub const MAX_SETTING_LENGTH: usize = 65;

/// Date pattern: YYYY-MM-DD.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"));

/// Parse a date in YYYY-MM-DD format.
///
/// Rejects dates in the future since the archive has no records for them.
///
/// # Examples
/// ```
/// use pfr_harvester::config::parse_date;
///
/// let date = parse_date("2024-01-15").unwrap();
/// assert_eq!(date.to_string(), "2024-01-15");
/// assert!(parse_date("2024-13-01").is_err());
/// ```
pub fn parse_date(date_str: &str) -> Result<NaiveDate> {
    if !DATE_PATTERN.is_match(date_str) {
        return Err(HarvesterError::InvalidDate(date_str.to_string()));
    }

    let parsed_date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|_| HarvesterError::InvalidDate(date_str.to_string()))?;

    let today = chrono::Local::now().date_naive();
    if parsed_date > today {
        return Err(HarvesterError::InvalidDate(format!(
            "{date_str} is in the future (today is {today})"
        )));
    }

    Ok(parsed_date)
}

/// Validate date format (YYYY-MM-DD).
///
/// # Examples
/// ```
/// use pfr_harvester::config::validate_date;
///
/// assert!(validate_date("2024-01-01").is_ok());
/// assert!(validate_date("invalid").is_err());
/// ```
pub fn validate_date(date_str: &str) -> Result<()> {
    parse_date(date_str).map(|_| ())
}

/// Parse and validate the archive endpoint.
pub fn parse_host(host: &str) -> Result<Url> {
    let url = Url::parse(host.trim())
        .map_err(|e| HarvesterError::Config(format!("ARX_HOST '{host}' is not a valid URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(HarvesterError::Config(format!(
            "ARX_HOST '{host}' must use http or https"
        )));
    }
    Ok(url)
}

/// Settings of a harvest, validated once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestConfig {
    /// OAI-PMH endpoint.
    pub host: Url,

    /// Catalog subset, e.g. `cs`.
    pub set: String,

    /// Delay applied by callers between two page requests.
    pub check_interval: Duration,

    /// Timeout of a single request.
    pub timeout: Duration,

    /// Metadata format, e.g. `oai_dc`.
    pub metadata_prefix: String,

    /// Start date used when no checkpoint exists.
    pub start_date: NaiveDate,

    /// Maximum number of records per run; zero or negative means unlimited.
    pub limit: i64,
}

impl HarvestConfig {
    /// Create a configuration with defaults for everything but set and start date.
    pub fn new(set: impl Into<String>, start_date: NaiveDate) -> Result<Self> {
        let config = Self {
            host: parse_host(DEFAULT_HOST)?,
            set: set.into(),
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            metadata_prefix: DEFAULT_METADATA_PREFIX.to_string(),
            start_date,
            limit: 0,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration from `ARX_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = parse_host(&lookup("ARX_HOST").unwrap_or_else(|| DEFAULT_HOST.into()))?;

        let set = lookup("ARX_SET").ok_or_else(|| HarvesterError::Config("ARX_SET not set".into()))?;

        let check_interval_secs = parse_positive(&lookup, "ARX_CHECK_TIME_S", DEFAULT_CHECK_INTERVAL_SECS)?;
        let timeout_secs = parse_positive(&lookup, "ARX_TIMEOUT", DEFAULT_TIMEOUT_SECS)?;

        let metadata_prefix =
            lookup("ARX_FORMAT").unwrap_or_else(|| DEFAULT_METADATA_PREFIX.into());

        let start_date = lookup("ARX_START_DATE")
            .ok_or_else(|| HarvesterError::Config("ARX_START_DATE not set".into()))
            .and_then(|v| parse_date(v.trim()))?;

        let limit = match lookup("ARX_LIMIT") {
            Some(v) => v.trim().parse::<i64>().map_err(|_| {
                HarvesterError::Config(format!("ARX_LIMIT '{v}' is not an integer"))
            })?,
            None => 0,
        };

        let config = Self {
            host,
            set,
            check_interval: Duration::from_secs(check_interval_secs),
            timeout: Duration::from_secs(timeout_secs),
            metadata_prefix,
            start_date,
            limit,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the length and range constraints of every setting.
    pub fn validate(&self) -> Result<()> {
        check_setting("ARX_SET", &self.set)?;
        check_setting("ARX_FORMAT", &self.metadata_prefix)?;
        if self.timeout.is_zero() {
            return Err(HarvesterError::Config("ARX_TIMEOUT must be positive".into()));
        }
        Ok(())
    }

    /// The record limit, if one applies.
    #[must_use]
    pub fn record_limit(&self) -> Option<usize> {
        usize::try_from(self.limit).ok().filter(|l| *l > 0)
    }

    /// Override the record limit.
    #[must_use]
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Override the endpoint.
    #[must_use]
    pub fn with_host(mut self, host: Url) -> Self {
        self.host = host;
        self
    }

    /// Override the delay between pages.
    #[must_use]
    pub fn with_check_interval(mut self, check_interval: Duration) -> Self {
        self.check_interval = check_interval;
        self
    }
}

fn parse_positive<F>(lookup: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(HarvesterError::Config(format!(
            "{key} must be a positive integer, got '{raw}'"
        ))),
    }
}

fn check_setting(key: &str, value: &str) -> Result<()> {
    let len = value.chars().count();
    if len == 0 || len > MAX_SETTING_LENGTH {
        return Err(HarvesterError::Config(format!(
            "{key} must be between 1 and {MAX_SETTING_LENGTH} characters"
        )));
    }
    Ok(())
}
