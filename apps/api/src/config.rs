use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::llm_client::openai::DEFAULT_API_URL;
use crate::llm_client::{RateLimitConfig, RetryPolicy};
use crate::screening::extraction::DEFAULT_MAX_ENTRY_BYTES;
use crate::screening::grouping::{GroupingPolicy, Thresholds};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const BYTES_PER_MB: usize = 1024 * 1024;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_api_url: String,
    pub model_criteria: String,
    pub model_match: String,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryPolicy,
    pub max_resume_chars: usize,
    pub max_jd_chars: usize,
    pub grouping: GroupingPolicy,
    pub max_upload_bytes: usize,
    /// Inflated size cap for one archive entry or DOCX body.
    pub max_entry_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            max_requests_per_window: env_or("OPENAI_MAX_RPM", defaults.max_requests_per_window)?,
            base_delay: env_secs("OPENAI_BASE_DELAY", defaults.base_delay)?,
            min_delay: env_secs("OPENAI_MIN_DELAY", defaults.min_delay)?,
            max_delay: env_secs("OPENAI_MAX_DELAY", defaults.max_delay)?,
            ..defaults
        };
        if rate_limit.min_delay > rate_limit.max_delay {
            bail!("OPENAI_MIN_DELAY must not exceed OPENAI_MAX_DELAY");
        }

        let retry_defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_retries: env_or("OPENAI_MAX_RETRIES", retry_defaults.max_retries)?,
            backoff_base: env_secs("OPENAI_BACKOFF_BASE", retry_defaults.backoff_base)?,
            max_backoff: env_secs("OPENAI_MAX_BACKOFF", retry_defaults.max_backoff)?,
        };

        let grouping = GroupingPolicy::new(
            env_thresholds("STRICT_THRESHOLDS", Thresholds::STRICT)?,
            env_thresholds("RELAXED_THRESHOLDS", Thresholds::RELAXED)?,
        )
        .context("Invalid grouping thresholds")?;

        let max_upload_mb: usize = env_or("MAX_UPLOAD_MB", 50)?;
        let max_entry_mb: usize = env_or("MAX_ENTRY_MB", DEFAULT_MAX_ENTRY_BYTES / BYTES_PER_MB)?;

        Ok(Config {
            openai_api_key: require_env("OPENAI_API_KEY")?,
            openai_api_url: env_or("OPENAI_API_URL", DEFAULT_API_URL.to_string())?,
            model_criteria: env_or("OPENAI_MODEL_CRITERIA", DEFAULT_MODEL.to_string())?,
            model_match: env_or("OPENAI_MODEL_MATCH", DEFAULT_MODEL.to_string())?,
            rate_limit,
            retry,
            max_resume_chars: env_or("OPENAI_MAX_RESUME_CHARS", 20_000)?,
            max_jd_chars: env_or("OPENAI_MAX_JD_CHARS", 20_000)?,
            grouping,
            max_upload_bytes: max_upload_mb.saturating_mul(BYTES_PER_MB),
            max_entry_bytes: max_entry_mb.saturating_mul(BYTES_PER_MB),
            port: env_or("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info".to_string())?,
        })
    }

    /// Defaults with a dummy key, for router tests.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            openai_api_key: "test-key".to_string(),
            openai_api_url: DEFAULT_API_URL.to_string(),
            model_criteria: DEFAULT_MODEL.to_string(),
            model_match: DEFAULT_MODEL.to_string(),
            rate_limit: RateLimitConfig::default(),
            retry: RetryPolicy::default(),
            max_resume_chars: 20_000,
            max_jd_chars: 20_000,
            grouping: GroupingPolicy::default(),
            max_upload_bytes: 50 * BYTES_PER_MB,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
            port: 8080,
            rust_log: "info".to_string(),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => parse_value(key, &raw),
        _ => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{key} has invalid value '{raw}': {e}"))
}

/// Seconds, fractional allowed.
fn env_secs(key: &str, default: Duration) -> Result<Duration> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => parse_secs(key, &raw),
        _ => Ok(default),
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration> {
    let secs: f64 = parse_value(key, raw)?;
    if !secs.is_finite() || secs < 0.0 {
        bail!("{key} must be a non-negative number of seconds, got '{raw}'");
    }
    Ok(Duration::from_secs_f64(secs))
}

/// `"upper,lower"`, e.g. `"0.85,0.60"`.
fn env_thresholds(key: &str, default: Thresholds) -> Result<Thresholds> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => parse_thresholds(key, &raw),
        _ => Ok(default),
    }
}

fn parse_thresholds(key: &str, raw: &str) -> Result<Thresholds> {
    let Some((strong, potential)) = raw.split_once(',') else {
        bail!("{key} must be two comma-separated numbers, got '{raw}'");
    };
    Ok(Thresholds {
        strong: parse_value(key, strong)?,
        potential: parse_value(key, potential)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_thresholds() {
        let t = parse_thresholds("STRICT_THRESHOLDS", " 0.9 , 0.7 ").unwrap();
        assert_eq!(t, Thresholds { strong: 0.9, potential: 0.7 });
        assert!(parse_thresholds("STRICT_THRESHOLDS", "0.9").is_err());
        assert!(parse_thresholds("STRICT_THRESHOLDS", "high,low").is_err());
    }

    #[test]
    fn test_parse_secs() {
        assert_eq!(parse_secs("K", "1.5").unwrap(), Duration::from_millis(1500));
        assert!(parse_secs("K", "-1").is_err());
        assert!(parse_secs("K", "soon").is_err());
    }

    #[test]
    fn test_parse_value_names_the_variable() {
        let err = parse_value::<u16>("PORT", "eighty").unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
