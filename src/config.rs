use crate::services::retry::{Backoff, RetryPolicy};
use anyhow::{Context, Result};
use std::{env, path::PathBuf, str::FromStr, time::Duration};

/// Application configuration loaded and validated once at startup
///
/// Every value comes from an environment variable with a default. The loaded
/// configuration is handed to the components explicitly; there is no global
/// instance.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// HTTP binding configuration
    pub api: ApiConfig,

    /// Host command execution
    pub command: CommandConfig,

    /// Network manager orchestration
    pub network: NetworkConfig,

    /// Time synchronization daemon
    pub timesync: TimeSyncConfig,
}

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct CommandConfig {
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct NetworkConfig {
    pub nmcli_path: String,
    /// Delay after enabling a link and before verifying an applied profile.
    pub settle_delay: Duration,
    /// Upper bound for the wifi radio to report enabled.
    pub radio_enable_timeout: Duration,
    /// Delay between triggering a rescan and reading scan results.
    pub scan_wait: Duration,
    pub ping_timeout_secs: u32,
    pub verify_retry: RetryPolicy,
    pub hotspot_profile_name: String,
}

#[derive(Clone, Debug)]
pub struct TimeSyncConfig {
    pub conf_path: PathBuf,
    /// Where config backups go, next to `conf_path` if unset.
    pub backup_dir: Option<PathBuf>,
    pub clock_file: PathBuf,
    pub ping_timeout_secs: u32,
}

/// Lookup of a single configuration value, the process environment in production.
pub trait ConfigSource: Fn(&str) -> Option<String> {}

impl<F> ConfigSource for F where F: Fn(&str) -> Option<String> {}

fn parse_or<T>(source: &impl ConfigSource, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match source(key) {
        Some(value) => value
            .trim()
            .parse()
            .context(format!("failed to parse {key}: invalid format")),
        None => Ok(default),
    }
}

fn string_or(source: &impl ConfigSource, key: &str, default: &str) -> String {
    source(key).unwrap_or_else(|| default.to_string())
}

impl AppConfig {
    /// Load the configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::load_from(&|key: &str| env::var(key).ok())
    }

    /// Load the configuration from an arbitrary source
    pub fn load_from(source: &impl ConfigSource) -> Result<Self> {
        Ok(Self {
            api: ApiConfig::load(source)?,
            command: CommandConfig::load(source)?,
            network: NetworkConfig::load(source)?,
            timesync: TimeSyncConfig::load(source)?,
        })
    }
}

impl ApiConfig {
    fn load(source: &impl ConfigSource) -> Result<Self> {
        Ok(Self {
            bind_address: string_or(source, "API_BIND_ADDRESS", "0.0.0.0"),
            port: parse_or(source, "API_PORT", 1977)?,
        })
    }
}

impl CommandConfig {
    fn load(source: &impl ConfigSource) -> Result<Self> {
        let timeout_secs: u64 = parse_or(source, "COMMAND_TIMEOUT_SECS", 30)?;
        anyhow::ensure!(
            timeout_secs > 0,
            "failed to parse COMMAND_TIMEOUT_SECS: must be greater than 0"
        );

        Ok(Self {
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl NetworkConfig {
    fn load(source: &impl ConfigSource) -> Result<Self> {
        let max_attempts: u32 = parse_or(source, "VERIFY_MAX_ATTEMPTS", 3)?;
        anyhow::ensure!(
            max_attempts > 0,
            "failed to parse VERIFY_MAX_ATTEMPTS: must be greater than 0"
        );

        let backoff_step = Duration::from_millis(parse_or(source, "VERIFY_BACKOFF_MS", 2000)?);
        let backoff = if parse_or(source, "VERIFY_BACKOFF_LINEAR", true)? {
            Backoff::Linear(backoff_step)
        } else {
            Backoff::Fixed(backoff_step)
        };

        Ok(Self {
            nmcli_path: string_or(source, "NMCLI_PATH", "nmcli"),
            settle_delay: Duration::from_millis(parse_or(source, "SETTLE_DELAY_MS", 3000)?),
            radio_enable_timeout: Duration::from_millis(parse_or(
                source,
                "RADIO_ENABLE_TIMEOUT_MS",
                10000,
            )?),
            scan_wait: Duration::from_millis(parse_or(source, "SCAN_WAIT_MS", 2000)?),
            ping_timeout_secs: parse_or(source, "PING_TIMEOUT_SECS", 2)?,
            verify_retry: RetryPolicy::new(max_attempts, backoff),
            hotspot_profile_name: string_or(source, "HOTSPOT_PROFILE_NAME", "Hotspot"),
        })
    }

    /// Configuration without any delays, for tests driving a fake executor.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            nmcli_path: "nmcli".to_string(),
            settle_delay: Duration::ZERO,
            radio_enable_timeout: Duration::ZERO,
            scan_wait: Duration::ZERO,
            ping_timeout_secs: 1,
            verify_retry: RetryPolicy::immediate(max_attempts),
            hotspot_profile_name: "Hotspot".to_string(),
        }
    }
}

impl TimeSyncConfig {
    fn load(source: &impl ConfigSource) -> Result<Self> {
        Ok(Self {
            conf_path: string_or(source, "TIMESYNCD_CONF_PATH", "/etc/systemd/timesyncd.conf")
                .into(),
            backup_dir: source("TIMESYNCD_BACKUP_DIR").map(PathBuf::from),
            clock_file: string_or(
                source,
                "TIMESYNC_CLOCK_FILE",
                "/var/lib/systemd/timesync/clock",
            )
            .into(),
            ping_timeout_secs: parse_or(source, "PING_TIMEOUT_SECS", 2)?,
        })
    }
}
