//! Configuration management for the sync agent.

use crate::reminders::SchedulerConfig;
use crate::service::ServiceSettings;
use pensebete_engine::DedupePolicy;
use reqwest::Url;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Agent configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the remote store service
    pub remote_url: Url,
    /// Owner identity sent with every remote request
    pub user_id: String,
    /// Directory holding the durable client state
    pub data_dir: PathBuf,
    /// Period of the reminder check
    pub reminder_interval: Duration,
    /// How far ahead a reminder counts as due soon
    pub reminder_horizon: Duration,
    /// Period of the dedupe cache compaction
    pub cleanup_interval: Duration,
    pub dedupe: DedupePolicy,
    /// Period of the background drain retry; `None` disables it
    pub sync_retry_interval: Option<Duration>,
    /// Period of the reachability probe; `None` disables it
    pub probe_interval: Option<Duration>,
    /// Timeout applied to each remote request
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let remote_url = lookup("PENSEBETE_REMOTE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("PENSEBETE_REMOTE_URL"))?;
        let remote_url = match Url::parse(remote_url.trim()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            _ => {
                return Err(ConfigError::Invalid {
                    key: "PENSEBETE_REMOTE_URL",
                    value: remote_url,
                })
            }
        };

        let user_id = lookup("PENSEBETE_USER_ID")
            .filter(|id| !id.trim().is_empty())
            .ok_or(ConfigError::Missing("PENSEBETE_USER_ID"))?;

        let data_dir = lookup("PENSEBETE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./pensebete-data"));

        let reminder_interval = positive_secs(&lookup, "PENSEBETE_REMINDER_INTERVAL_SECS", 60)?;
        let reminder_horizon = positive_secs(&lookup, "PENSEBETE_REMINDER_HORIZON_SECS", 3600)?;
        let cleanup_interval = positive_secs(&lookup, "PENSEBETE_CLEANUP_INTERVAL_SECS", 86_400)?;

        let dedupe = DedupePolicy {
            max_entries: number(&lookup, "PENSEBETE_DEDUPE_MAX", 100)? as usize,
            retain_entries: number(&lookup, "PENSEBETE_DEDUPE_RETAIN", 50)? as usize,
        };
        if dedupe.retain_entries > dedupe.max_entries {
            return Err(ConfigError::Invalid {
                key: "PENSEBETE_DEDUPE_RETAIN",
                value: dedupe.retain_entries.to_string(),
            });
        }

        let sync_retry_interval = optional_secs(&lookup, "PENSEBETE_SYNC_RETRY_SECS", 300)?;
        let probe_interval = optional_secs(&lookup, "PENSEBETE_PROBE_INTERVAL_SECS", 15)?;
        let request_timeout = positive_secs(&lookup, "PENSEBETE_REQUEST_TIMEOUT_SECS", 10)?;

        Ok(Self {
            remote_url,
            user_id,
            data_dir,
            reminder_interval,
            reminder_horizon,
            cleanup_interval,
            dedupe,
            sync_retry_interval,
            probe_interval,
            request_timeout,
        })
    }

    /// Settings for [`crate::SyncService`].
    ///
    /// With a probe configured the agent starts offline and lets the first
    /// probe decide.
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            scheduler: SchedulerConfig {
                tick_interval: self.reminder_interval,
                horizon: self.reminder_horizon,
                cleanup_interval: self.cleanup_interval,
                dedupe: self.dedupe,
            },
            retry_interval: self.sync_retry_interval,
            probe_interval: self.probe_interval,
            initially_online: self.probe_interval.is_none(),
        }
    }
}

fn number<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn positive_secs<F>(lookup: &F, key: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match number(lookup, key, default)? {
        0 => Err(ConfigError::Invalid {
            key,
            value: "0".to_string(),
        }),
        secs => Ok(Duration::from_secs(secs)),
    }
}

/// Zero turns the feature off.
fn optional_secs<F>(
    lookup: &F,
    key: &'static str,
    default: u64,
) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = number(lookup, key, default)?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("Invalid {key} value: {value:?}")]
    Invalid { key: &'static str, value: String },
}
