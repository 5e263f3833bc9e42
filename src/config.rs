//! Configuration types.
//!
//! Every struct is built from environment variables by `from_env()`, which
//! delegates to `from_vars()` so tests can feed a plain map instead of
//! mutating the process environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::pipeline::dedup::DEFAULT_DEDUP_WINDOW_HOURS;
use crate::pipeline::policy::PolicyConfig;
use crate::scheduler::Schedule;

/// Default Twitter v2 API base URL.
pub const DEFAULT_TWITTER_API_BASE: &str = "https://api.twitter.com";

/// Default minutes between runs.
pub const DEFAULT_INTERVAL_MINUTES: u64 = 30;

/// Whether a filler post ends the candidate scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillerMode {
    /// Post the filler and keep scanning; only a reply ends the run.
    #[default]
    Continue,
    /// Any posted filler ends the run, like a reply.
    Stop,
}

impl FromStr for FillerMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" => Ok(Self::Continue),
            "stop" => Ok(Self::Stop),
            other => Err(ConfigError::InvalidValue {
                key: "ORTOGRA_FILLER_MODE".into(),
                message: format!("expected 'continue' or 'stop', got '{other}'"),
            }),
        }
    }
}

/// Decision-engine configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Our own handle; statuses mentioning it are never answered.
    pub bot_handle: String,
    /// Skip every post call. Engagements are still recorded as dry runs.
    pub debug: bool,
    /// Rolling dedup window.
    pub dedup_window: chrono::Duration,
    pub filler_mode: FillerMode,
    pub policy: PolicyConfig,
    /// Replace the built-in rules with this JSON file.
    pub rules_path: Option<PathBuf>,
    /// Fixed RNG seed, for reproducible runs.
    pub seed: Option<u64>,
}

impl BotConfig {
    pub fn new(bot_handle: &str) -> Self {
        Self {
            bot_handle: bot_handle.into(),
            debug: true,
            dedup_window: chrono::Duration::hours(DEFAULT_DEDUP_WINDOW_HOURS),
            filler_mode: FillerMode::default(),
            policy: PolicyConfig::default(),
            rules_path: None,
            seed: None,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bot_handle = var("ORTOGRA_BOT_HANDLE")
            .map(|h| h.trim().trim_start_matches('@').to_string())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("ORTOGRA_BOT_HANDLE".into()))?;

        let defaults = PolicyConfig::default();
        let window_hours: i64 =
            parse_var(&var, "ORTOGRA_DEDUP_WINDOW_HOURS", DEFAULT_DEDUP_WINDOW_HOURS)?;
        if window_hours <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "ORTOGRA_DEDUP_WINDOW_HOURS".into(),
                message: "must be positive".into(),
            });
        }

        Ok(Self {
            bot_handle,
            debug: bool_var(&var, "ORTOGRA_DEBUG", true)?,
            dedup_window: chrono::Duration::hours(window_hours),
            filler_mode: match var("ORTOGRA_FILLER_MODE") {
                Some(raw) => raw.parse()?,
                None => FillerMode::default(),
            },
            policy: PolicyConfig {
                reply_probability: parse_var(
                    &var,
                    "ORTOGRA_REPLY_PROBABILITY",
                    defaults.reply_probability,
                )?,
                rule_filler_probability: parse_var(
                    &var,
                    "ORTOGRA_RULE_FILLER_PROBABILITY",
                    defaults.rule_filler_probability,
                )?,
                silence_probability: parse_var(
                    &var,
                    "ORTOGRA_SILENCE_PROBABILITY",
                    defaults.silence_probability,
                )?,
                fillers_enabled: bool_var(&var, "ORTOGRA_FILLERS", defaults.fillers_enabled)?,
            },
            rules_path: var("ORTOGRA_RULES_PATH").map(PathBuf::from),
            seed: var("ORTOGRA_SEED")
                .map(|s| {
                    s.trim().parse().map_err(|e| ConfigError::InvalidValue {
                        key: "ORTOGRA_SEED".into(),
                        message: format!("{e}"),
                    })
                })
                .transpose()?,
        })
    }
}

/// Twitter v2 credentials and search settings.
#[derive(Debug, Clone)]
pub struct TwitterConfig {
    pub api_base: String,
    /// App-only bearer token, used for search.
    pub bearer_token: SecretString,
    /// User-context access token, used for posting. App-only bearer tokens
    /// are rejected by `POST /2/tweets`.
    pub user_token: SecretString,
    /// Statuses per search, 10..=100.
    pub max_results: u32,
}

impl TwitterConfig {
    /// `posting` is false in debug mode, where the user token may fall back
    /// to the bearer token since nothing is ever posted.
    pub fn from_env(posting: bool) -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok(), posting)
    }

    pub fn from_vars(
        var: impl Fn(&str) -> Option<String>,
        posting: bool,
    ) -> Result<Self, ConfigError> {
        let bearer = var("TWITTER_BEARER_TOKEN")
            .ok_or_else(|| ConfigError::MissingEnvVar("TWITTER_BEARER_TOKEN".into()))?;
        let user = match var("TWITTER_USER_TOKEN") {
            Some(token) => token,
            None if posting => {
                return Err(ConfigError::MissingEnvVar("TWITTER_USER_TOKEN".into()));
            }
            None => bearer.clone(),
        };

        let max_results: u32 = parse_var(&var, "TWITTER_MAX_RESULTS", 15)?;
        if !(10..=100).contains(&max_results) {
            return Err(ConfigError::InvalidValue {
                key: "TWITTER_MAX_RESULTS".into(),
                message: format!("{max_results} outside 10..=100"),
            });
        }

        Ok(Self {
            api_base: var("TWITTER_API_BASE")
                .unwrap_or_else(|| DEFAULT_TWITTER_API_BASE.to_string()),
            bearer_token: SecretString::from(bearer),
            user_token: SecretString::from(user),
            max_results,
        })
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            api_base: DEFAULT_TWITTER_API_BASE.into(),
            bearer_token: SecretString::from("test-bearer"),
            user_token: SecretString::from("test-user"),
            max_results: 15,
        }
    }
}

/// History store location.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_path: PathBuf,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            db_path: var("ORTOGRA_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/ortograbot.db")),
        }
    }
}

/// When runs happen.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub schedule: Schedule,
    /// Run a single invocation and exit (for external schedulers).
    pub run_once: bool,
}

impl ScheduleConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let schedule = match var("ORTOGRA_CRON") {
            Some(expr) => Schedule::cron(&expr)?,
            None => {
                let minutes: u64 =
                    parse_var(&var, "ORTOGRA_INTERVAL_MINUTES", DEFAULT_INTERVAL_MINUTES)?;
                let secs = minutes
                    .checked_mul(60)
                    .filter(|&secs| secs > 0)
                    .ok_or_else(|| ConfigError::InvalidValue {
                        key: "ORTOGRA_INTERVAL_MINUTES".into(),
                        message: format!("{minutes} is out of range"),
                    })?;
                Schedule::Interval(Duration::from_secs(secs))
            }
        };

        Ok(Self {
            schedule,
            run_once: bool_var(&var, "ORTOGRA_RUN_ONCE", false)?,
        })
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn parse_var<T>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
            key: key.into(),
            message: format!("'{raw}': {e}"),
        }),
        None => Ok(default),
    }
}

fn bool_var(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match var(key) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::InvalidValue {
                key: key.into(),
                message: format!("'{other}' is not a boolean"),
            }),
        },
        None => Ok(default),
    }
}
