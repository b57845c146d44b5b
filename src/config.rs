use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Environment variables read by [`Config::apply_env`]. Where a setting has
/// several names, the first one set wins; the later names are what older
/// deployments' `.env` files use.
pub const ENV_INTERVAL_MINUTES: &[&str] = &["CHECK_INTERVAL_MINUTES"];
pub const ENV_MAX_MESSAGES: &[&str] = &["MAX_MESSAGES_PER_CHECK", "MAX_EMAILS_PER_CHECK"];
pub const ENV_RUN_MODE: &[&str] = &["RUN_MODE", "MODE"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// One sweep, then exit.
    #[default]
    Single,
    /// Sweep on a fixed interval until stopped.
    Continuous,
}

impl FromStr for RunMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single" => Ok(RunMode::Single),
            "continuous" => Ok(RunMode::Continuous),
            other => Err(ConfigError::Invalid(format!(
                "unknown run mode '{other}' (expected single or continuous)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub interval_minutes: u64,
    pub max_messages_per_sweep: usize,
    pub mode: RunMode,
    /// Added to the interval after a sweep that could not reach the source.
    pub failure_backoff_seconds: u64,
    pub database_path: String,
    pub spool_dir: String,
    pub extra_trusted_domains: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            interval_minutes: 5,
            max_messages_per_sweep: 10,
            mode: RunMode::Single,
            failure_backoff_seconds: 60,
            database_path: "data/messages.db".to_string(),
            spool_dir: "data/inbox".to_string(),
            extra_trusted_domains: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Overrides from a key lookup; blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |keys: &[&'static str]| {
            keys.iter().find_map(|key| {
                lookup(*key)
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| (*key, v))
            })
        };

        if let Some((key, value)) = get(ENV_INTERVAL_MINUTES) {
            self.interval_minutes = parse_number(key, &value)?;
        }
        if let Some((key, value)) = get(ENV_MAX_MESSAGES) {
            self.max_messages_per_sweep = parse_number(key, &value)?;
        }
        if let Some((_, value)) = get(ENV_RUN_MODE) {
            self.mode = value.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "interval_minutes must be positive".to_string(),
            ));
        }
        if self.max_messages_per_sweep == 0 {
            return Err(ConfigError::Invalid(
                "max_messages_per_sweep must be positive".to_string(),
            ));
        }
        if self.database_path.trim().is_empty() {
            return Err(ConfigError::Invalid("database_path is empty".to_string()));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    pub fn failure_backoff(&self) -> Duration {
        Duration::from_secs(self.failure_backoff_seconds)
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{key} must be a non-negative integer, got '{value}'")))
}
