//! Configuration types.
//!
//! [`PipelineConfig`] holds the values the core consumes; [`AppConfig`] adds
//! the process-level settings and is loaded once from the environment at
//! startup. Every value is validated there, so a bad limit is a startup
//! failure rather than a runtime one.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::mail::collector::BootstrapPolicy;
use crate::mail::fetcher::{DEFAULT_CONCURRENCY, FetchMode};
use crate::mail::gmail::DEFAULT_API_BASE;
use crate::pipeline::filter::DEFAULT_BODY_WINDOW;
use crate::pipeline::patterns;
use crate::retry::RetryConfig;

/// Values consumed by one pipeline cycle.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Marker key for the mailbox stream.
    pub pointer_key: String,
    /// Listing query.
    pub query: String,
    /// Most ids collected per cycle.
    pub batch_limit: usize,
    /// Most messages fetched per cycle.
    pub max_batch_size: usize,
    /// Character cap for message heads.
    pub head_max_chars: usize,
    /// Body characters searched when the head has no entity match.
    pub body_window: usize,
    pub fetch_mode: FetchMode,
    pub bootstrap: BootstrapPolicy,
    pub noise_markers: Vec<String>,
    pub positive_phrases: Vec<String>,
    pub negative_phrases: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pointer_key: "gmail:last_processed_id".to_string(),
            query: "-in:spam -in:trash".to_string(),
            batch_limit: 200,
            max_batch_size: 325,
            head_max_chars: 2000,
            body_window: DEFAULT_BODY_WINDOW,
            fetch_mode: FetchMode::default(),
            bootstrap: BootstrapPolicy::default(),
            noise_markers: patterns::default_noise(),
            positive_phrases: patterns::default_positive(),
            negative_phrases: patterns::default_negative(),
        }
    }
}

/// Outbound call budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_calls: usize,
    pub window: Duration,
    /// `None` waits as long as needed for a slot.
    pub acquire_timeout: Option<Duration>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: 100,
            window: Duration::from_secs(60),
            acquire_timeout: None,
        }
    }
}

/// Full process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub access_token: SecretString,
    pub api_base: String,
    pub pipeline: PipelineConfig,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub database_path: PathBuf,
    /// One entity name per line, imported at startup.
    pub entities_file: Option<PathBuf>,
    /// Row position given to the first imported entity.
    pub start_row: i64,
    pub scheduler_enabled: bool,
    pub scheduler_interval: Duration,
    pub health_check_enabled: bool,
    pub health_check_port: u16,
    pub log_file: Option<PathBuf>,
}

impl AppConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);

        let access_token = env
            .string("GMAIL_ACCESS_TOKEN")
            .ok_or_else(|| ConfigError::MissingEnvVar("GMAIL_ACCESS_TOKEN".into()))?;

        let pointer_key = env
            .string("GMAIL_POINTER_KEY")
            .unwrap_or_else(|| "gmail:last_processed_id".to_string());

        let concurrency = env.ranged("FETCH_CONCURRENCY", DEFAULT_CONCURRENCY, 1, 100)?;
        let fetch_mode = match env.string("FETCH_MODE") {
            Some(mode) => FetchMode::parse(&mode, concurrency)?,
            None => FetchMode::Concurrent {
                max_concurrent: concurrency,
            },
        };

        let bootstrap = env.parsed("BOOTSTRAP_POLICY", BootstrapPolicy::default())?;

        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            pointer_key,
            query: env
                .raw("GMAIL_QUERY")
                .unwrap_or(defaults.query),
            batch_limit: env.ranged("GMAIL_BATCH_LIMIT", 200, 1, 500)?,
            max_batch_size: env.ranged("GMAIL_MAX_BATCH_SIZE", 325, 1, 500)?,
            head_max_chars: env.ranged("GMAIL_HEAD_MAX_CHARS", 2000, 1, usize::MAX)?,
            body_window: env.ranged("BODY_WINDOW_CHARS", DEFAULT_BODY_WINDOW, 1, usize::MAX)?,
            fetch_mode,
            bootstrap,
            ..defaults
        };

        let timeout_secs: Option<u64> = match env.string("GMAIL_RATE_LIMIT_TIMEOUT_SECS") {
            Some(v) => Some(parse_value("GMAIL_RATE_LIMIT_TIMEOUT_SECS", &v)?),
            None => None,
        };
        let rate_limit = RateLimitConfig {
            max_calls: env.ranged("GMAIL_RATE_LIMIT_PER_MINUTE", 100, 1, 1000)?,
            window: Duration::from_secs(env.ranged("GMAIL_RATE_LIMIT_WINDOW_SECS", 60, 1, 3600)?),
            acquire_timeout: timeout_secs.map(Duration::from_secs),
        };

        let retry = RetryConfig {
            max_retries: env.ranged("RETRY_MAX_ATTEMPTS", 3, 0, 10)?,
            ..RetryConfig::default()
        };

        let entities_file = env.string("ENTITIES_FILE").map(PathBuf::from);
        if let Some(path) = &entities_file
            && !path.is_file()
        {
            return Err(ConfigError::InvalidValue {
                key: "ENTITIES_FILE".into(),
                message: format!("{} does not exist", path.display()),
            });
        }

        Ok(Self {
            access_token: SecretString::from(access_token),
            api_base: env
                .string("GMAIL_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            pipeline,
            rate_limit,
            retry,
            database_path: env
                .string("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/mail-verdict.db")),
            entities_file,
            start_row: env.ranged("START_ROW", 2, 1, i64::MAX)?,
            scheduler_enabled: env.flag("SCHEDULER_ENABLED", false)?,
            scheduler_interval: Duration::from_secs(env.ranged(
                "SCHEDULER_INTERVAL",
                300,
                60,
                86_400,
            )?),
            health_check_enabled: env.flag("HEALTH_CHECK_ENABLED", true)?,
            health_check_port: env.ranged("HEALTH_CHECK_PORT", 8080, 1024, 65535)?,
            log_file: env.string("LOG_FILE").map(PathBuf::from),
        })
    }
}

/// Typed accessors over a lookup function.
struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Value as set, including empty strings.
    fn raw(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    /// Trimmed value; unset and blank are both `None`.
    fn string(&self, key: &str) -> Option<String> {
        self.raw(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.string(key) {
            Some(v) => parse_value(key, &v),
            None => Ok(default),
        }
    }

    fn ranged<T>(&self, key: &str, default: T, min: T, max: T) -> Result<T, ConfigError>
    where
        T: FromStr + PartialOrd + std::fmt::Display + Copy,
        T::Err: std::fmt::Display,
    {
        let value = self.parsed(key, default)?;
        if value < min || value > max {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{value} is outside {min}..={max}"),
            });
        }
        Ok(value)
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.string(key).map(|v| v.to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) => match v.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("expected a boolean, got {v:?}"),
                }),
            },
        }
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{value:?}: {e}"),
    })
}
