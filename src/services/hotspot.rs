use crate::{
    command_executor::CommandExecutor,
    error::{NetworkError, NetworkResult},
    services::{
        inventory::InterfaceInventory,
        nmcli::{self, Nmcli},
        radio::WifiRadio,
        retry::RetryPolicy,
        wifi::{self, WifiProfile},
    },
    types::{HotspotConfig, HotspotStatus, InterfaceKind, WifiSecurity},
};
use log::{debug, info, warn};
use std::sync::Arc;

const STATUS_FIELDS: [&str; 6] = [
    "802-11-wireless.ssid",
    "802-11-wireless.channel",
    "802-11-wireless.hidden",
    "802-11-wireless-security.key-mgmt",
    "802-11-wireless-security.proto",
    "connection.interface-name",
];
const PSK_FIELD: &str = "802-11-wireless-security.psk";
/// Channels above this one are in the 5 GHz band.
const MAX_BG_CHANNEL: u32 = 14;

/// Access point role of a wifi radio.
///
/// Hotspot profiles are recognized by their wireless mode, never by name.
pub struct HotspotManager<E> {
    executor: Arc<E>,
    nmcli: Nmcli,
    inventory: InterfaceInventory<E>,
    radio: Arc<WifiRadio<E>>,
    retry: RetryPolicy,
    default_profile_name: String,
}

impl<E> HotspotManager<E>
where
    E: CommandExecutor,
{
    pub fn new(
        executor: Arc<E>,
        nmcli: Nmcli,
        inventory: InterfaceInventory<E>,
        radio: Arc<WifiRadio<E>>,
        retry: RetryPolicy,
        default_profile_name: String,
    ) -> Self {
        Self {
            executor,
            nmcli,
            inventory,
            radio,
            retry,
            default_profile_name,
        }
    }

    pub fn validate(config: &HotspotConfig) -> NetworkResult<()> {
        if !config.enabled {
            return Ok(());
        }

        if !config.security.is_passphrase_based() {
            return Err(NetworkError::Validation(format!(
                "{:?} security is not supported for hotspots",
                config.security
            )));
        }

        if config.password.is_empty() {
            return Err(NetworkError::Validation(
                "password is required to enable a hotspot".to_string(),
            ));
        }

        if config.profile_name.as_deref().is_some_and(str::is_empty) {
            return Err(NetworkError::Validation(
                "profileName must not be empty".to_string(),
            ));
        }

        wifi::validate_credentials(&config.ssid, &config.password, config.security)
    }

    pub async fn get_status(&self) -> NetworkResult<HotspotStatus> {
        let Some(profile) = self.current_profile().await? else {
            debug!("no hotspot profile");
            return Ok(HotspotStatus::default());
        };

        let name = profile.entry.name.clone();

        if !profile.entry.active {
            return Ok(HotspotStatus {
                profile_name: Some(name),
                ssid: profile.ssid,
                ..Default::default()
            });
        }

        let fields = match self
            .executor
            .execute(&self.nmcli.connection_fields(&name, &STATUS_FIELDS))
            .await
        {
            Ok(output) => nmcli::parse_fields(&output.stdout),
            Err(e) => {
                warn!("failed to read settings of {name}: {e}");
                Default::default()
            }
        };
        let field = |key| nmcli::field(&fields, key);

        let security = WifiSecurity::from_key_mgmt(
            field("802-11-wireless-security.key-mgmt").unwrap_or_default(),
            field("802-11-wireless-security.proto"),
        );

        let password = if security == WifiSecurity::None {
            None
        } else {
            self.password(&name).await
        };

        Ok(HotspotStatus {
            enabled: true,
            interface: profile
                .entry
                .device
                .clone()
                .or_else(|| field("connection.interface-name").map(str::to_string)),
            ssid: field("802-11-wireless.ssid")
                .map(str::to_string)
                .or(profile.ssid),
            security: Some(security),
            password,
            channel: field("802-11-wireless.channel")
                .and_then(|channel| channel.parse().ok())
                .filter(|channel| *channel != 0),
            hidden: field("802-11-wireless.hidden") == Some("yes"),
            profile_name: Some(name),
        })
    }

    /// Create or update the hotspot, or tear every hotspot profile down.
    pub async fn configure(
        &self,
        config: &HotspotConfig,
        interface: Option<&str>,
    ) -> NetworkResult<HotspotStatus> {
        Self::validate(config)?;

        if config.enabled {
            let interface = interface
                .ok_or_else(|| NetworkError::Precondition("no wifi interface found".to_string()))?;
            self.enable(config, interface).await?;
            self.get_status().await
        } else {
            self.disable().await?;
            Ok(HotspotStatus::default())
        }
    }

    /// Wifi interface to run the hotspot on: the requested one, else the first one.
    pub async fn resolve_interface(&self, requested: Option<&str>) -> NetworkResult<Option<String>> {
        let mut wifi = self
            .inventory
            .device_statuses()
            .await?
            .into_iter()
            .filter(|status| status.kind == Some(InterfaceKind::Wifi))
            .map(|status| status.name);

        match requested {
            Some(name) => wifi
                .find(|candidate| candidate == name)
                .map(Some)
                .ok_or_else(|| {
                    NetworkError::Precondition(format!("wifi interface {name} not found"))
                }),
            None => Ok(wifi.next()),
        }
    }

    async fn enable(&self, config: &HotspotConfig, interface: &str) -> NetworkResult<()> {
        let name = config
            .profile_name
            .clone()
            .unwrap_or_else(|| self.default_profile_name.clone());

        info!("enabling hotspot {name} on {interface}");

        self.radio.ensure_enabled().await?;

        let settings = self.settings(config, interface);
        let existing = wifi::wifi_profiles(self.executor.as_ref(), &self.nmcli, false)
            .await?
            .into_iter()
            .find(|profile| profile.entry.name == name);

        match existing {
            Some(profile) => {
                if profile.entry.active {
                    if let Err(e) = self
                        .executor
                        .execute(&self.nmcli.connection_down(&name))
                        .await
                    {
                        debug!("deactivate {name}: {e}");
                    }
                }

                self.executor
                    .execute(&self.nmcli.connection_modify(&name, &settings))
                    .await
                    .map_err(|e| NetworkError::apply(format!("update hotspot {name}"), e))?;
            }
            None => {
                self.executor
                    .execute(&self.nmcli.connection_add("wifi", interface, &name, &settings))
                    .await
                    .map_err(|e| NetworkError::apply(format!("create hotspot {name}"), e))?;
            }
        }

        let argv = self.nmcli.connection_up(&name);
        let (_, attempts) = self
            .retry
            .run(
                &format!("activate hotspot {name}"),
                |_| self.executor.execute(&argv),
                |_| async {},
            )
            .await
            .map_err(|exhausted| {
                NetworkError::apply(format!("activate hotspot {name}"), exhausted.last_error)
            })?;

        info!("hotspot {name} active after {attempts} attempt(s)");

        Ok(())
    }

    async fn disable(&self) -> NetworkResult<()> {
        let hotspots: Vec<WifiProfile> =
            wifi::wifi_profiles(self.executor.as_ref(), &self.nmcli, false)
                .await?
                .into_iter()
                .filter(|profile| profile.is_ap)
                .collect();

        if hotspots.is_empty() {
            info!("no hotspot to disable");
            return Ok(());
        }

        for profile in hotspots {
            let name = profile.entry.name;

            if profile.entry.active {
                if let Err(e) = self
                    .executor
                    .execute(&self.nmcli.connection_down(&name))
                    .await
                {
                    warn!("deactivate {name}: {e}");
                }
            }

            self.executor
                .execute(&self.nmcli.connection_delete(&name))
                .await
                .map_err(|e| NetworkError::apply(format!("delete hotspot {name}"), e))?;

            info!("removed hotspot {name}");
        }

        Ok(())
    }

    fn settings(&self, config: &HotspotConfig, interface: &str) -> Vec<(&'static str, String)> {
        let band = match config.channel {
            Some(channel) if channel > MAX_BG_CHANNEL => "a",
            _ => "bg",
        };

        let mut settings = vec![
            ("connection.interface-name", interface.to_string()),
            ("802-11-wireless.ssid", config.ssid.clone()),
            ("802-11-wireless.mode", "ap".to_string()),
            ("802-11-wireless.band", band.to_string()),
            (
                "802-11-wireless.channel",
                config.channel.unwrap_or(0).to_string(),
            ),
            (
                "802-11-wireless.hidden",
                if config.hidden { "yes" } else { "no" }.to_string(),
            ),
            ("ipv4.method", "shared".to_string()),
        ];
        settings.extend(wifi::security_settings(config.security, &config.password));
        settings
    }

    /// The active hotspot, else the default-named one, else any.
    async fn current_profile(&self) -> NetworkResult<Option<WifiProfile>> {
        let mut hotspots: Vec<WifiProfile> =
            wifi::wifi_profiles(self.executor.as_ref(), &self.nmcli, false)
                .await?
                .into_iter()
                .filter(|profile| profile.is_ap)
                .collect();

        let index = hotspots
            .iter()
            .position(|profile| profile.entry.active)
            .or_else(|| {
                hotspots
                    .iter()
                    .position(|profile| profile.entry.name == self.default_profile_name)
            });

        Ok(match index {
            Some(index) => Some(hotspots.swap_remove(index)),
            None => hotspots.into_iter().next(),
        })
    }

    async fn password(&self, name: &str) -> Option<String> {
        match self
            .executor
            .execute(&self.nmcli.connection_secret(name, PSK_FIELD))
            .await
        {
            Ok(output) => nmcli::parse_values(&output.stdout).into_iter().next(),
            Err(e) => {
                debug!("failed to read credential of {name}: {e}");
                None
            }
        }
    }
}
