//! WiFi client role
//!
//! Joining always starts from a fresh profile: stale client profiles for the same
//! ssid are removed first, so re-joining with changed credentials behaves like
//! the first join. Access point profiles are never touched here.

use crate::{
    command_executor::CommandExecutor,
    error::{NetworkError, NetworkResult},
    services::{
        inventory::InterfaceInventory,
        nmcli::{self, ConnectionEntry, Nmcli},
        radio::WifiRadio,
        verification::LinkVerifier,
    },
    types::{InterfaceKind, WifiConnectResponse, WifiJoinRequest, WifiNetwork, WifiSecurity},
};
use anyhow::Context;
use log::{debug, info, warn};
use serde_valid::Validate;
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;

const MAX_SSID_BYTES: usize = 32;
const PASSPHRASE_CHARS: std::ops::RangeInclusive<usize> = 8..=63;
const MODE_AP: &str = "ap";

/// Reject malformed ssid/credential combinations before anything is executed.
pub fn validate_credentials(
    ssid: &str,
    password: &str,
    security: WifiSecurity,
) -> NetworkResult<()> {
    if ssid.is_empty() || ssid.len() > MAX_SSID_BYTES {
        return Err(NetworkError::Validation(format!(
            "ssid must be 1 to {MAX_SSID_BYTES} bytes"
        )));
    }

    if security == WifiSecurity::None {
        return Ok(());
    }

    if password.is_empty() {
        return Err(NetworkError::Validation(
            "password is required for secured networks".to_string(),
        ));
    }

    if security.is_passphrase_based() && !PASSPHRASE_CHARS.contains(&password.chars().count()) {
        return Err(NetworkError::Validation(format!(
            "passphrase must be {} to {} characters",
            PASSPHRASE_CHARS.start(),
            PASSPHRASE_CHARS.end()
        )));
    }

    Ok(())
}

/// Security settings of a wifi profile.
pub fn security_settings(security: WifiSecurity, password: &str) -> Vec<(&'static str, String)> {
    match security {
        WifiSecurity::None => vec![],
        WifiSecurity::Wep => vec![
            ("wifi-sec.key-mgmt", "none".to_string()),
            ("wifi-sec.wep-key0", password.to_string()),
        ],
        passphrase => vec![
            (
                "wifi-sec.key-mgmt",
                passphrase.key_mgmt().unwrap_or("wpa-psk").to_string(),
            ),
            ("wifi-sec.psk", password.to_string()),
        ],
    }
}

/// Stored wifi profile with the settings that determine its role.
#[derive(Clone, Debug, PartialEq)]
pub struct WifiProfile {
    pub entry: ConnectionEntry,
    pub ssid: Option<String>,
    pub is_ap: bool,
}

/// Wifi profiles of the host. Profiles whose settings cannot be read are skipped.
pub async fn wifi_profiles<E>(
    executor: &E,
    nmcli: &Nmcli,
    active_only: bool,
) -> NetworkResult<Vec<WifiProfile>>
where
    E: CommandExecutor,
{
    let argv = if active_only {
        nmcli.active_connections()
    } else {
        nmcli.connections()
    };
    let output = executor
        .execute(&argv)
        .await
        .context("failed to list profiles")?;

    let mut profiles = Vec::new();

    for entry in nmcli::parse_connections(&output.stdout)
        .into_iter()
        .filter(ConnectionEntry::is_wifi)
    {
        let argv =
            nmcli.connection_fields(&entry.name, &["802-11-wireless.ssid", "802-11-wireless.mode"]);
        match executor.execute(&argv).await {
            Ok(output) => {
                let fields = nmcli::parse_fields(&output.stdout);
                profiles.push(WifiProfile {
                    ssid: nmcli::field(&fields, "802-11-wireless.ssid").map(str::to_string),
                    is_ap: nmcli::field(&fields, "802-11-wireless.mode") == Some(MODE_AP),
                    entry,
                });
            }
            Err(e) => debug!("failed to read wifi settings of {}: {e}", entry.name),
        }
    }

    Ok(profiles)
}

pub struct WifiConnector<E> {
    executor: Arc<E>,
    nmcli: Nmcli,
    inventory: InterfaceInventory<E>,
    radio: Arc<WifiRadio<E>>,
    verifier: Arc<LinkVerifier<E>>,
    scan_wait: Duration,
}

impl<E> WifiConnector<E>
where
    E: CommandExecutor,
{
    pub fn new(
        executor: Arc<E>,
        nmcli: Nmcli,
        inventory: InterfaceInventory<E>,
        radio: Arc<WifiRadio<E>>,
        verifier: Arc<LinkVerifier<E>>,
        scan_wait: Duration,
    ) -> Self {
        Self {
            executor,
            nmcli,
            inventory,
            radio,
            verifier,
            scan_wait,
        }
    }

    pub fn validate(request: &WifiJoinRequest) -> NetworkResult<()> {
        request
            .validate()
            .map_err(|e| NetworkError::Validation(e.to_string()))?;
        validate_credentials(&request.ssid, &request.password, request.security)
    }

    /// The requested wifi interface, else the first one of the host.
    pub async fn resolve_interface(&self, requested: Option<&str>) -> NetworkResult<String> {
        let wifi = self
            .inventory
            .device_statuses()
            .await?
            .into_iter()
            .filter(|status| status.kind == Some(InterfaceKind::Wifi));

        let mut wifi = wifi.map(|status| status.name);

        match requested {
            Some(name) => wifi.find(|candidate| candidate == name).ok_or_else(|| {
                NetworkError::Precondition(format!("wifi interface {name} not found"))
            }),
            None => wifi
                .next()
                .ok_or_else(|| NetworkError::Precondition("no wifi interface found".to_string())),
        }
    }

    /// Join `request.ssid` on `interface` and verify the link came up.
    pub async fn connect(
        &self,
        request: &WifiJoinRequest,
        interface: &str,
    ) -> NetworkResult<WifiConnectResponse> {
        Self::validate(request)?;

        let ssid = request.ssid.as_str();
        info!(
            "connect {interface} to {ssid} ({:?}, hidden: {})",
            request.security, request.hidden
        );

        self.radio.ensure_enabled().await?;
        self.remove_stale_profiles(ssid).await?;

        if !request.hidden && !self.is_visible(interface, ssid).await {
            info!("{ssid} is not visible, trying anyway");
        }

        let profile = ssid.to_string();
        let mut settings = vec![
            ("802-11-wireless.ssid", ssid.to_string()),
            (
                "802-11-wireless.hidden",
                if request.hidden { "yes" } else { "no" }.to_string(),
            ),
        ];
        settings.extend(security_settings(request.security, &request.password));

        self.executor
            .execute(&self.nmcli.connection_add("wifi", interface, &profile, &settings))
            .await
            .map_err(|e| NetworkError::apply(format!("create wifi profile {profile}"), e))?;

        self.executor
            .execute(&self.nmcli.connection_up(&profile))
            .await
            .map_err(|e| NetworkError::apply(format!("activate wifi profile {profile}"), e))?;

        let up = self.verifier.verify_up(interface, &profile, None).await?;

        info!("connected {interface} to {ssid}");

        Ok(WifiConnectResponse {
            connected: true,
            ssid: ssid.to_string(),
            interface: interface.to_string(),
            profile,
            ipv4: up.ipv4,
            attempts: up.attempts,
        })
    }

    /// Deactivate the active client profile. Nothing active is a no-op.
    /// The active client profile, hotspots excluded.
    pub async fn active_client(&self) -> NetworkResult<Option<WifiProfile>> {
        Ok(wifi_profiles(self.executor.as_ref(), &self.nmcli, true)
            .await?
            .into_iter()
            .find(|profile| !profile.is_ap))
    }

    pub async fn disconnect(&self, profile: &WifiProfile) -> NetworkResult<()> {
        let name = profile.entry.name.as_str();

        self.executor
            .execute(&self.nmcli.connection_down(name))
            .await
            .map_err(|e| NetworkError::apply(format!("deactivate {name}"), e))?;

        info!("disconnected from {}", profile.ssid.as_deref().unwrap_or(name));

        Ok(())
    }

    /// Visible networks on `interface`, strongest first.
    pub async fn scan(&self, interface: &str) -> NetworkResult<Vec<WifiNetwork>> {
        self.rescan(interface).await;

        let output = self
            .executor
            .execute(&self.nmcli.wifi_list(interface))
            .await
            .context(format!("failed to list wifi networks on {interface}"))?;

        Ok(nmcli::parse_wifi_list(&output.stdout))
    }

    async fn remove_stale_profiles(&self, ssid: &str) -> NetworkResult<()> {
        for profile in wifi_profiles(self.executor.as_ref(), &self.nmcli, false).await? {
            if profile.is_ap {
                if profile.entry.name == ssid {
                    return Err(NetworkError::Precondition(format!(
                        "profile name {ssid} is taken by a hotspot"
                    )));
                }
                continue;
            }
            if profile.ssid.as_deref() != Some(ssid) {
                continue;
            }

            let name = profile.entry.name;
            info!("removing stale profile {name}");
            self.executor
                .execute(&self.nmcli.connection_delete(&name))
                .await
                .map_err(|e| NetworkError::apply(format!("delete profile {name}"), e))?;
        }

        Ok(())
    }

    async fn rescan(&self, interface: &str) {
        if let Err(e) = self
            .executor
            .execute(&self.nmcli.wifi_rescan(interface))
            .await
        {
            warn!("rescan on {interface} failed: {e}");
        }

        sleep(self.scan_wait).await;
    }

    async fn is_visible(&self, interface: &str, ssid: &str) -> bool {
        self.rescan(interface).await;

        match self
            .executor
            .execute(&self.nmcli.wifi_list(interface))
            .await
        {
            Ok(output) => nmcli::parse_wifi_list(&output.stdout)
                .iter()
                .any(|network| network.ssid == ssid),
            Err(e) => {
                debug!("failed to list wifi networks: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        command_executor::{CommandOutput, ExecError, MockCommandExecutor},
        services::retry::RetryPolicy,
    };
    use std::sync::Mutex;

    fn connector(executor: MockCommandExecutor) -> WifiConnector<MockCommandExecutor> {
        let executor = Arc::new(executor);
        let nmcli = Nmcli::new("nmcli");
        let inventory = InterfaceInventory::new(executor.clone(), nmcli.clone());
        let radio = WifiRadio::new(executor.clone(), nmcli.clone(), Duration::ZERO);
        let verifier = LinkVerifier::new(
            executor.clone(),
            nmcli.clone(),
            inventory.clone(),
            Duration::ZERO,
            1,
            RetryPolicy::immediate(2),
        );
        WifiConnector::new(
            executor,
            nmcli,
            inventory,
            Arc::new(radio),
            Arc::new(verifier),
            Duration::ZERO,
        )
    }

    fn join(ssid: &str, password: &str, security: WifiSecurity) -> WifiJoinRequest {
        WifiJoinRequest {
            ssid: ssid.to_string(),
            password: password.to_string(),
            security,
            hidden: false,
            interface: None,
        }
    }

    mod validation {
        use super::*;

        fn validate(ssid: &str, password: &str, security: WifiSecurity) -> NetworkResult<()> {
            WifiConnector::<MockCommandExecutor>::validate(&join(ssid, password, security))
        }

        #[test]
        fn rejects_bad_credentials() {
            assert!(validate("", "", WifiSecurity::None).is_err());
            assert!(validate(&"x".repeat(33), "", WifiSecurity::None).is_err());
            assert!(validate("home", "", WifiSecurity::Wpa2).is_err());
            assert!(validate("home", "short", WifiSecurity::Wpa2).is_err());
            assert!(validate("home", &"p".repeat(64), WifiSecurity::Wpa3).is_err());
        }

        #[test]
        fn accepts_open_and_wep_networks() {
            assert!(validate("cafe", "", WifiSecurity::None).is_ok());
            assert!(validate("legacy", "0123456789", WifiSecurity::Wep).is_ok());
            assert!(validate("home", "secret-passphrase", WifiSecurity::Wpa2).is_ok());
        }

        #[test]
        fn security_settings_per_level() {
            assert!(security_settings(WifiSecurity::None, "").is_empty());
            assert_eq!(
                security_settings(WifiSecurity::Wpa3, "passphrase"),
                vec![
                    ("wifi-sec.key-mgmt", "sae".to_string()),
                    ("wifi-sec.psk", "passphrase".to_string())
                ]
            );
        }

        #[tokio::test]
        async fn invalid_request_issues_no_command() {
            let mut executor = MockCommandExecutor::new();
            executor.expect_execute().never();

            let err = connector(executor)
                .connect(&join("home", "short", WifiSecurity::Wpa2), "wlan0")
                .await
                .unwrap_err();

            assert!(matches!(err, NetworkError::Validation(_)));
        }
    }

    mod connect {
        use super::*;

        #[tokio::test]
        async fn replaces_stale_client_profile_and_verifies() {
            let commands = Arc::new(Mutex::new(Vec::new()));
            let recorded = commands.clone();
            let mut executor = MockCommandExecutor::new();
            executor.expect_execute().returning(move |argv| {
                let command = argv.join(" ");
                recorded.lock().unwrap().push(command.clone());
                let stdout = match command.as_str() {
                    "nmcli radio wifi" => "enabled\n",
                    "nmcli -t -f NAME,TYPE,DEVICE,ACTIVE connection show" => {
                        "home:802-11-wireless::no\nHotspot:802-11-wireless::no\n"
                    }
                    "nmcli -t -f 802-11-wireless.ssid,802-11-wireless.mode connection show id home" => {
                        "802-11-wireless.ssid:home\n802-11-wireless.mode:infrastructure\n"
                    }
                    "nmcli -t -f 802-11-wireless.ssid,802-11-wireless.mode connection show id Hotspot" => {
                        "802-11-wireless.ssid:home\n802-11-wireless.mode:ap\n"
                    }
                    "nmcli -t -f IN-USE,SSID,SIGNAL,SECURITY device wifi list ifname wlan0" => {
                        " :home:70:WPA2\n"
                    }
                    "nmcli -t -f DEVICE,TYPE,STATE,CONNECTION device status" => {
                        "wlan0:wifi:connected:home\n"
                    }
                    "nmcli -g IP4.ADDRESS device show wlan0" => "192.168.1.50/24\n",
                    "nmcli -g IP4.GATEWAY device show wlan0" => "",
                    c if c.starts_with("nmcli connection")
                        || c.starts_with("nmcli device wifi rescan") =>
                    {
                        ""
                    }
                    _ => {
                        let err = ExecError::new(argv, Some(2), "unexpected");
                        return Box::pin(async move { Err(err) });
                    }
                };
                Box::pin(async move { Ok(CommandOutput::stdout(stdout)) })
            });

            let response = connector(executor)
                .connect(&join("home", "secret-passphrase", WifiSecurity::Wpa2), "wlan0")
                .await
                .unwrap();

            assert!(response.connected);
            assert_eq!(response.ipv4.as_deref(), Some("192.168.1.50"));

            let commands = commands.lock().unwrap();
            assert!(commands.contains(&"nmcli connection delete id home".to_string()));
            assert!(!commands.iter().any(|c| c == "nmcli connection delete id Hotspot"));
            assert!(commands.contains(
                &"nmcli connection add type wifi ifname wlan0 con-name home 802-11-wireless.ssid home 802-11-wireless.hidden no wifi-sec.key-mgmt wpa-psk wifi-sec.psk secret-passphrase"
                    .to_string()
            ));
        }
    }

    mod keyword_ssid {
        use super::*;

        fn host(hotspot_name: &'static str, commands: Arc<Mutex<Vec<String>>>) -> MockCommandExecutor {
            let mut executor = MockCommandExecutor::new();
            executor.expect_execute().returning(move |argv| {
                let command = argv.join(" ");
                commands.lock().unwrap().push(command.clone());
                let stdout = match command.as_str() {
                    "nmcli radio wifi" => "enabled\n".to_string(),
                    "nmcli -t -f NAME,TYPE,DEVICE,ACTIVE connection show" => {
                        format!("{hotspot_name}:802-11-wireless::no\n")
                    }
                    c if c.ends_with(&format!("connection show id {hotspot_name}")) => {
                        "802-11-wireless.ssid:omnect\n802-11-wireless.mode:ap\n".to_string()
                    }
                    "nmcli -t -f DEVICE,TYPE,STATE,CONNECTION device status" => {
                        "wlan0:wifi:connected:ifname\n".to_string()
                    }
                    "nmcli -g IP4.ADDRESS device show wlan0" => "192.168.1.50/24\n".to_string(),
                    c if c.starts_with("nmcli connection")
                        || c.starts_with("nmcli device wifi")
                        || c.starts_with("nmcli -g IP4.GATEWAY") =>
                    {
                        String::new()
                    }
                    _ => {
                        let err = ExecError::new(argv, Some(2), "unexpected");
                        return Box::pin(async move { Err(err) });
                    }
                };
                Box::pin(async move { Ok(CommandOutput::stdout(stdout)) })
            });
            executor
        }

        #[tokio::test]
        async fn profile_named_like_an_nmcli_keyword_is_addressed_by_id() {
            let commands = Arc::new(Mutex::new(Vec::new()));
            let executor = host("Hotspot", commands.clone());

            let response = connector(executor)
                .connect(&join("ifname", "secret-passphrase", WifiSecurity::Wpa2), "wlan0")
                .await
                .unwrap();

            assert_eq!(response.profile, "ifname");
            let commands = commands.lock().unwrap();
            assert!(commands.contains(&"nmcli connection up id ifname".to_string()));
            assert!(!commands.iter().any(|c| c == "nmcli connection up ifname"));
        }

        #[tokio::test]
        async fn ssid_colliding_with_hotspot_profile_is_rejected() {
            let commands = Arc::new(Mutex::new(Vec::new()));
            let executor = host("Hotspot", commands.clone());

            let err = connector(executor)
                .connect(&join("Hotspot", "secret-passphrase", WifiSecurity::Wpa2), "wlan0")
                .await
                .unwrap_err();

            assert!(matches!(err, NetworkError::Precondition(_)), "{err}");
            let commands = commands.lock().unwrap();
            assert!(!commands.iter().any(|c| c.contains("connection add")));
            assert!(!commands.iter().any(|c| c.contains("connection delete")));
        }
    }

    mod disconnect {
        use super::*;

        #[tokio::test]
        async fn nothing_active_is_a_noop() {
            let mut executor = MockCommandExecutor::new();
            executor
                .expect_execute()
                .withf(|argv| argv.join(" ").ends_with("connection show --active"))
                .times(1)
                .returning(|_| {
                    Box::pin(async { Ok(CommandOutput::stdout("eth0:802-3-ethernet:eth0:yes\n")) })
                });

            assert!(connector(executor).active_client().await.unwrap().is_none());
        }

        #[tokio::test]
        async fn deactivates_client_but_not_hotspot() {
            let mut executor = MockCommandExecutor::new();
            executor.expect_execute().returning(|argv| {
                let result = match argv.join(" ").as_str() {
                    "nmcli -t -f NAME,TYPE,DEVICE,ACTIVE connection show --active" => Ok(
                        CommandOutput::stdout("Hotspot:802-11-wireless:wlan1:yes\nhome:802-11-wireless:wlan0:yes\n"),
                    ),
                    "nmcli -t -f 802-11-wireless.ssid,802-11-wireless.mode connection show id Hotspot" => {
                        Ok(CommandOutput::stdout("802-11-wireless.ssid:omnect\n802-11-wireless.mode:ap\n"))
                    }
                    "nmcli -t -f 802-11-wireless.ssid,802-11-wireless.mode connection show id home" => {
                        Ok(CommandOutput::stdout("802-11-wireless.ssid:home\n802-11-wireless.mode:infrastructure\n"))
                    }
                    "nmcli connection down id home" => Ok(CommandOutput::default()),
                    _ => Err(ExecError::new(argv, Some(2), "unexpected")),
                };
                Box::pin(async move { result })
            });

            let connector = connector(executor);
            let profile = connector
                .active_client()
                .await
                .unwrap()
                .expect("should find the client profile");

            assert_eq!(profile.entry.name, "home");
            assert_eq!(profile.entry.device.as_deref(), Some("wlan0"));
            connector.disconnect(&profile).await.unwrap();
        }
    }

    #[tokio::test]
    async fn scan_lists_networks_even_if_rescan_fails() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute().returning(|argv| {
            let result = match argv.join(" ").as_str() {
                "nmcli device wifi rescan ifname wlan0" => {
                    Err(ExecError::new(argv, Some(1), "scanning not allowed"))
                }
                "nmcli -t -f IN-USE,SSID,SIGNAL,SECURITY device wifi list ifname wlan0" => Ok(
                    CommandOutput::stdout("*:home:70:WPA2\n :cafe:40:\n :home:30:WPA2\n : :20:WPA2\n"),
                ),
                _ => Err(ExecError::new(argv, Some(2), "unexpected")),
            };
            Box::pin(async move { result })
        });

        let networks = connector(executor).scan("wlan0").await.unwrap();

        assert_eq!(networks.len(), 2);
        assert_eq!(networks[0].ssid, "home");
        assert!(networks[0].in_use);
        assert_eq!(networks[1].ssid, "cafe");
    }
}
