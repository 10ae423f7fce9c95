//! Request and response values exchanged with callers of the orchestrator
//!
//! None of these are persisted. Authoritative state lives in the host network
//! stack and is re-read on every call.

use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use std::fmt;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    Ethernet,
    Wifi,
    Bridge,
    Loopback,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminState {
    Connected,
    Disconnected,
    Unavailable,
    Unmanaged,
}

impl fmt::Display for AdminState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            AdminState::Connected => "connected",
            AdminState::Disconnected => "disconnected",
            AdminState::Unavailable => "unavailable",
            AdminState::Unmanaged => "unmanaged",
        };
        f.write_str(state)
    }
}

/// Live view of one network interface.
///
/// Optional attributes are `None` when they could not be observed during this
/// inventory call, which does not imply they are unset on the host.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceDescriptor {
    pub name: String,
    pub kind: InterfaceKind,
    pub admin_state: AdminState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bound_profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_mask: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns: Option<Vec<String>>,
}

#[derive(Clone, Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfigRequest {
    #[validate(min_length = 1)]
    pub interface: String,
    pub dhcp: bool,
    #[serde(default)]
    pub ipv4: Option<String>,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub subnet_mask: Option<String>,
    #[serde(default)]
    pub nameservers: Vec<String>,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressingMethod {
    Dhcp,
    Static,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfigResponse {
    pub configured: bool,
    pub method: AddressingMethod,
    pub interface: String,
    pub profile: String,
    pub ipv4: Option<String>,
    pub attempts: u32,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WifiSecurity {
    None,
    Wep,
    Wpa,
    #[default]
    Wpa2,
    Wpa3,
}

impl WifiSecurity {
    /// Value of `802-11-wireless-security.key-mgmt`, `None` for open networks.
    pub fn key_mgmt(self) -> Option<&'static str> {
        match self {
            WifiSecurity::None => None,
            WifiSecurity::Wep => Some("none"),
            WifiSecurity::Wpa | WifiSecurity::Wpa2 => Some("wpa-psk"),
            WifiSecurity::Wpa3 => Some("sae"),
        }
    }

    /// Passphrase based security requires 8 to 63 characters.
    pub fn is_passphrase_based(self) -> bool {
        matches!(
            self,
            WifiSecurity::Wpa | WifiSecurity::Wpa2 | WifiSecurity::Wpa3
        )
    }

    /// Map a stored key-mgmt value (and wpa protocol list) back to a security level.
    pub fn from_key_mgmt(key_mgmt: &str, proto: Option<&str>) -> Self {
        match key_mgmt {
            "sae" => WifiSecurity::Wpa3,
            "wpa-psk" if proto.is_some_and(|p| p.split(',').all(|p| p.trim() == "wpa")) => {
                WifiSecurity::Wpa
            }
            "wpa-psk" => WifiSecurity::Wpa2,
            "none" | "ieee8021x" => WifiSecurity::Wep,
            _ => WifiSecurity::None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WifiJoinRequest {
    #[validate(min_length = 1)]
    pub ssid: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub security: WifiSecurity,
    #[serde(default)]
    pub hidden: bool,
    /// Wifi interface to join with, the first wifi interface if absent.
    #[serde(default)]
    pub interface: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WifiConnectResponse {
    pub connected: bool,
    pub ssid: String,
    pub interface: String,
    pub profile: String,
    pub ipv4: Option<String>,
    pub attempts: u32,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WifiDisconnectResponse {
    pub disconnected: bool,
    /// Deactivated client profile, `None` if nothing was active.
    pub profile: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WifiNetwork {
    pub ssid: String,
    pub signal: u8,
    pub security: String,
    pub in_use: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotConfig {
    pub enabled: bool,
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default)]
    pub ssid: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub profile_name: Option<String>,
    #[serde(default)]
    pub security: WifiSecurity,
    #[serde(default)]
    pub channel: Option<u32>,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotStatus {
    pub enabled: bool,
    pub profile_name: Option<String>,
    pub interface: Option<String>,
    pub ssid: Option<String>,
    pub security: Option<WifiSecurity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub channel: Option<u32>,
    pub hidden: bool,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NtpConfig {
    pub enabled: bool,
    #[serde(default)]
    pub primary_server: String,
    #[serde(default)]
    pub primary_commented: bool,
    #[serde(default)]
    pub fallback_server: String,
    #[serde(default)]
    pub fallback_commented: bool,
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NtpStatus {
    /// Whether the host actually synchronizes, independent of the declared servers.
    pub enabled: bool,
    pub synchronized: bool,
    pub timezone: Option<String>,
    pub current_time: Option<String>,
    pub primary_server: Option<String>,
    pub primary_server_commented: bool,
    pub fallback_server: Option<String>,
    pub fallback_server_commented: bool,
    /// Server the daemon currently talks to, if it reported one.
    pub active_server: Option<String>,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityStatus {
    Success,
    NetworkError,
    NtpUnreachable,
    NtpSyncFailed,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimesyncDiagnostics {
    pub server: Option<String>,
    pub stratum: Option<u8>,
    pub offset: Option<String>,
    pub poll_interval: Option<String>,
    pub last_sync: Option<u64>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub host: String,
    pub ping_reachable: bool,
    pub timesync: Option<TimesyncDiagnostics>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityResult {
    pub status: ConnectivityStatus,
    pub interface: Option<String>,
    pub link_state: Option<AdminState>,
    pub primary: ProbeResult,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileMethod {
    Dhcp,
    Static,
    Disabled,
    Other,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileConfig {
    pub name: String,
    pub method: ProfileMethod,
    pub addresses: Vec<String>,
    pub gateway: Option<String>,
    pub dns: Vec<String>,
}
