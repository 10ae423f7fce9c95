use crate::{
    argv,
    command_executor::CommandExecutor,
    config::TimeSyncConfig,
    error::{NetworkError, NetworkResult},
    services::{inventory::InterfaceInventory, probe, timesyncd},
    types::{
        AdminState, ConnectivityResult, ConnectivityStatus, InterfaceKind, NtpConfig, NtpStatus,
        ProbeResult, TimesyncDiagnostics,
    },
};
use anyhow::Context;
use log::{debug, info};
use std::sync::Arc;

const TIMESYNCD_UNIT: &str = "systemd-timesyncd";

fn validate_token(field: &str, value: &str) -> NetworkResult<()> {
    if value.starts_with('-') || value.chars().any(|c| c.is_whitespace() || c == '#') {
        return Err(NetworkError::Validation(format!("invalid {field}: {value}")));
    }
    Ok(())
}

/// A host to probe: non-empty, a single token, not an option.
pub fn validate_host(host: &str) -> NetworkResult<()> {
    if host.is_empty() {
        return Err(NetworkError::Validation("host must not be empty".to_string()));
    }
    validate_token("host", host)
}

/// Timezone, ntp server declarations and the connectivity diagnostic.
pub struct TimeSyncManager<E> {
    executor: Arc<E>,
    inventory: InterfaceInventory<E>,
    config: TimeSyncConfig,
}

impl<E> TimeSyncManager<E>
where
    E: CommandExecutor,
{
    pub fn new(executor: Arc<E>, inventory: InterfaceInventory<E>, config: TimeSyncConfig) -> Self {
        Self {
            executor,
            inventory,
            config,
        }
    }

    pub fn validate(config: &NtpConfig) -> NetworkResult<()> {
        validate_token("primaryServer", config.primary_server.trim())?;
        validate_token("fallbackServer", config.fallback_server.trim())?;

        if let Some(timezone) = &config.timezone {
            if timezone.is_empty() {
                return Err(NetworkError::Validation(
                    "timezone must not be empty".to_string(),
                ));
            }
            validate_token("timezone", timezone)?;
        }

        Ok(())
    }

    /// Apply the timezone, then either write the server declarations and start
    /// synchronization, or stop synchronization.
    ///
    /// Disabling leaves the config file untouched.
    pub async fn configure(&self, config: &NtpConfig) -> NetworkResult<NtpStatus> {
        Self::validate(config)?;

        info!("configure time sync: {config:?}");

        if let Some(timezone) = &config.timezone {
            self.run(argv!["timedatectl", "set-timezone", timezone], "set timezone")
                .await?;
        }

        if config.enabled {
            let path = self.config.conf_path.as_path();
            let content = timesyncd::read_config(path)?;
            timesyncd::backup(path, self.config.backup_dir.as_deref())?;
            timesyncd::write_config(path, &timesyncd::rewrite_declarations(&content, config))?;

            self.run(argv!["timedatectl", "set-ntp", "true"], "enable time sync")
                .await?;
            self.run(
                argv!["systemctl", "restart", TIMESYNCD_UNIT],
                "restart time sync daemon",
            )
            .await?;
        } else {
            info!("disabling time sync, server declarations stay as they are");
            self.run(argv!["timedatectl", "set-ntp", "false"], "disable time sync")
                .await?;
        }

        self.get_status().await
    }

    pub async fn get_status(&self) -> NetworkResult<NtpStatus> {
        let output = self
            .executor
            .execute(&argv!["timedatectl", "show"])
            .await
            .context("failed to query time sync state")?;
        let properties = timesyncd::parse_properties(&output.stdout);

        let content = timesyncd::read_config(&self.config.conf_path)?;
        let declarations = timesyncd::parse_declarations(&content);

        let active_server = match self.diagnostics().await {
            Some(diagnostics) => diagnostics.server,
            None => None,
        };

        let (primary_server, primary_server_commented) = declarations
            .primary
            .map_or((None, false), |d| (Some(d.server), d.commented));
        let (fallback_server, fallback_server_commented) = declarations
            .fallback
            .map_or((None, false), |d| (Some(d.server), d.commented));

        Ok(NtpStatus {
            enabled: timesyncd::is_yes(properties.get("NTP")),
            synchronized: timesyncd::is_yes(properties.get("NTPSynchronized")),
            timezone: properties.get("Timezone").cloned(),
            current_time: properties.get("TimeUSec").cloned(),
            primary_server,
            primary_server_commented,
            fallback_server,
            fallback_server_commented,
            active_server,
        })
    }

    /// Ordered gates: link, reachability, synchronization. The first failing
    /// gate decides the classification and nothing after it is probed.
    pub async fn check_connectivity(&self, host: &str) -> NetworkResult<ConnectivityResult> {
        validate_host(host)?;

        let mut result = ConnectivityResult {
            status: ConnectivityStatus::NetworkError,
            interface: None,
            link_state: None,
            primary: ProbeResult {
                host: host.to_string(),
                ping_reachable: false,
                timesync: None,
            },
        };

        let mut ethernet: Vec<_> = self
            .inventory
            .device_statuses()
            .await?
            .into_iter()
            .filter(|status| status.kind == Some(InterfaceKind::Ethernet))
            .collect();
        ethernet.sort_by_key(|status| status.state != AdminState::Connected);

        let Some(link) = ethernet.into_iter().next() else {
            info!("connectivity {host}: no ethernet interface");
            return Ok(result);
        };

        result.interface = Some(link.name.clone());
        result.link_state = Some(link.state);

        if link.state != AdminState::Connected {
            info!("connectivity {host}: {} is {}", link.name, link.state);
            return Ok(result);
        }

        result.primary.ping_reachable =
            probe::ping(self.executor.as_ref(), host, self.config.ping_timeout_secs).await;
        if !result.primary.ping_reachable {
            result.status = ConnectivityStatus::NtpUnreachable;
            info!("connectivity {host}: unreachable");
            return Ok(result);
        }

        let diagnostics = self.diagnostics().await;
        result.status = match &diagnostics {
            Some(d) if d.offset.is_some() && d.stratum.is_some() => ConnectivityStatus::Success,
            _ => ConnectivityStatus::NtpSyncFailed,
        };
        result.primary.timesync = diagnostics;

        info!("connectivity {host}: {:?}", result.status);

        Ok(result)
    }

    /// Live session summary of the daemon, `None` if it cannot be queried.
    async fn diagnostics(&self) -> Option<TimesyncDiagnostics> {
        let output = match self
            .executor
            .execute(&argv!["timedatectl", "timesync-status"])
            .await
        {
            Ok(output) => output,
            Err(e) => {
                debug!("failed to query timesync status: {e}");
                return None;
            }
        };

        let mut diagnostics = timesyncd::parse_timesync_status(&output.stdout);
        diagnostics.last_sync = self.last_sync().await;
        Some(diagnostics)
    }

    async fn last_sync(&self) -> Option<u64> {
        let clock_file = self.config.clock_file.to_string_lossy();
        match self
            .executor
            .execute(&argv!["stat", "-c", "%Y", clock_file])
            .await
        {
            Ok(output) => output.stdout.trim().parse().ok(),
            Err(e) => {
                debug!("failed to read last sync time: {e}");
                None
            }
        }
    }

    async fn run(&self, argv: Vec<String>, action: &str) -> NetworkResult<()> {
        self.executor
            .execute(&argv)
            .await
            .map_err(|e| NetworkError::apply(action, e))?;
        Ok(())
    }
}
