//! NetworkManager command line adapter
//!
//! Builds `nmcli` argv arrays and converts its terse output into the typed data
//! model. The output format of the tool is an integration boundary; everything
//! that depends on its exact shape lives here and is tested against captured
//! output.

use crate::{
    command_executor::ExecError,
    types::{AdminState, InterfaceKind, ProfileConfig, ProfileMethod, WifiNetwork},
};
use std::{collections::HashMap, net::Ipv4Addr};

/// nmcli exit status for "connection, device, or access point does not exist".
const EXIT_NOT_FOUND: i32 = 10;

pub const TYPE_WIFI: &str = "802-11-wireless";
pub const TYPE_ETHERNET: &str = "802-3-ethernet";

#[derive(Clone, Debug)]
pub struct Nmcli {
    program: String,
}

impl Nmcli {
    pub fn new(program: impl Into<String>) -> Self {
        Nmcli {
            program: program.into(),
        }
    }

    pub fn argv<I, S>(&self, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        std::iter::once(self.program.clone())
            .chain(args.into_iter().map(|arg| arg.to_string()))
            .collect()
    }

    pub fn device_status(&self) -> Vec<String> {
        self.argv(["-t", "-f", "DEVICE,TYPE,STATE,CONNECTION", "device", "status"])
    }

    /// Single property of a device, printed as bare value(s).
    pub fn device_property(&self, device: &str, property: &str) -> Vec<String> {
        self.argv(["-g", property, "device", "show", device])
    }

    pub fn set_managed(&self, device: &str) -> Vec<String> {
        self.argv(["device", "set", device, "managed", "yes"])
    }

    pub fn device_connect(&self, device: &str) -> Vec<String> {
        self.argv(["device", "connect", device])
    }

    pub fn connections(&self) -> Vec<String> {
        self.argv([
            "-t",
            "-f",
            "NAME,TYPE,DEVICE,ACTIVE",
            "connection",
            "show",
        ])
    }

    pub fn active_connections(&self) -> Vec<String> {
        self.argv([
            "-t",
            "-f",
            "NAME,TYPE,DEVICE,ACTIVE",
            "connection",
            "show",
            "--active",
        ])
    }

    /// Selected settings of one profile as `key:value` lines.
    pub fn connection_fields(&self, profile: &str, fields: &[&str]) -> Vec<String> {
        self.argv(["-t", "-f", fields.join(",").as_str(), "connection", "show", "id", profile])
    }

    /// Selected settings of one profile as bare values, one line per field.
    pub fn connection_values(&self, profile: &str, fields: &[&str]) -> Vec<String> {
        self.argv(["-g", fields.join(",").as_str(), "connection", "show", "id", profile])
    }

    pub fn connection_secret(&self, profile: &str, field: &str) -> Vec<String> {
        self.argv(["-s", "-g", field, "connection", "show", "id", profile])
    }

    pub fn connection_up(&self, profile: &str) -> Vec<String> {
        self.argv(["connection", "up", "id", profile])
    }

    pub fn connection_down(&self, profile: &str) -> Vec<String> {
        self.argv(["connection", "down", "id", profile])
    }

    pub fn connection_delete(&self, profile: &str) -> Vec<String> {
        self.argv(["connection", "delete", "id", profile])
    }

    /// `nmcli connection modify id <profile> <setting> <value> ...`
    pub fn connection_modify(&self, profile: &str, settings: &[(&str, String)]) -> Vec<String> {
        let mut argv = self.argv(["connection", "modify", "id", profile]);
        for (key, value) in settings {
            argv.push(key.to_string());
            argv.push(value.clone());
        }
        argv
    }

    /// `nmcli connection add type <kind> ifname <device> con-name <profile> <setting> <value> ...`
    pub fn connection_add(
        &self,
        kind: &str,
        device: &str,
        profile: &str,
        settings: &[(&str, String)],
    ) -> Vec<String> {
        let mut argv = self.argv([
            "connection",
            "add",
            "type",
            kind,
            "ifname",
            device,
            "con-name",
            profile,
        ]);
        for (key, value) in settings {
            argv.push(key.to_string());
            argv.push(value.clone());
        }
        argv
    }

    pub fn radio_wifi(&self) -> Vec<String> {
        self.argv(["radio", "wifi"])
    }

    pub fn radio_wifi_on(&self) -> Vec<String> {
        self.argv(["radio", "wifi", "on"])
    }

    pub fn wifi_rescan(&self, device: &str) -> Vec<String> {
        self.argv(["device", "wifi", "rescan", "ifname", device])
    }

    pub fn wifi_list(&self, device: &str) -> Vec<String> {
        self.argv([
            "-t",
            "-f",
            "IN-USE,SSID,SIGNAL,SECURITY",
            "device",
            "wifi",
            "list",
            "ifname",
            device,
        ])
    }

    pub fn general_running(&self) -> Vec<String> {
        self.argv(["-t", "-f", "RUNNING", "general"])
    }
}

/// `true` if nmcli failed because the named profile or device does not exist.
pub fn is_not_found(err: &ExecError) -> bool {
    err.exit_code == Some(EXIT_NOT_FOUND)
}

/// Split one terse line at unescaped colons and unescape every field.
pub fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);

    fields
}

/// Remove terse escaping from a single value.
pub fn unescape(value: &str) -> String {
    split_terse(value).join(":")
}

/// Empty and `--` both mean "not set" in nmcli output.
fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty() && value != "--").then(|| value.to_string())
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeviceStatus {
    pub name: String,
    pub kind: Option<InterfaceKind>,
    pub state: AdminState,
    pub connection: Option<String>,
}

pub fn parse_kind(kind: &str) -> Option<InterfaceKind> {
    match kind {
        "ethernet" => Some(InterfaceKind::Ethernet),
        "wifi" => Some(InterfaceKind::Wifi),
        "bridge" => Some(InterfaceKind::Bridge),
        "loopback" => Some(InterfaceKind::Loopback),
        _ => None,
    }
}

/// Transitional states ("connecting (getting IP configuration)", "deactivating")
/// count as disconnected, "connected (externally)" as connected.
pub fn parse_admin_state(state: &str) -> AdminState {
    let state = state.trim();
    if state.starts_with("connected") {
        AdminState::Connected
    } else if state.starts_with("unavailable") {
        AdminState::Unavailable
    } else if state.starts_with("unmanaged") {
        AdminState::Unmanaged
    } else {
        AdminState::Disconnected
    }
}

pub fn parse_device_status(stdout: &str) -> Vec<DeviceStatus> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let fields = split_terse(line);
            let [name, kind, state, connection] = fields.as_slice() else {
                return None;
            };
            Some(DeviceStatus {
                name: name.clone(),
                kind: parse_kind(kind),
                state: parse_admin_state(state),
                connection: non_empty(connection),
            })
        })
        .collect()
}

/// Values printed by `-g <single field>`: one per line or joined by ` | `.
pub fn parse_values(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .flat_map(|line| line.split(" | "))
        .filter_map(|value| non_empty(&unescape(value)))
        .collect()
}

/// Lines printed by `-g <field>,<field>...`, one per requested field.
fn parse_value_lines(stdout: &str, count: usize) -> Vec<String> {
    let mut lines: Vec<String> = stdout.lines().map(unescape).collect();
    lines.resize(count, String::new());
    lines
}

/// `key:value` lines printed by `-t -f ... connection show <profile>`.
pub fn parse_fields(stdout: &str) -> HashMap<String, String> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut fields = split_terse(line).into_iter();
            let key = fields.next()?;
            let value = fields.collect::<Vec<_>>().join(":");
            non_empty(&key).map(|key| (key, value.trim().to_string()))
        })
        .collect()
}

pub fn field<'a>(fields: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    fields
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.is_empty() && *value != "--")
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionEntry {
    pub name: String,
    pub kind: String,
    pub device: Option<String>,
    pub active: bool,
}

impl ConnectionEntry {
    pub fn is_wifi(&self) -> bool {
        self.kind == TYPE_WIFI || self.kind == "wifi"
    }
}

pub fn parse_connections(stdout: &str) -> Vec<ConnectionEntry> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let fields = split_terse(line);
            let [name, kind, device, active] = fields.as_slice() else {
                return None;
            };
            Some(ConnectionEntry {
                name: name.clone(),
                kind: kind.clone(),
                device: non_empty(device),
                active: active == "yes",
            })
        })
        .collect()
}

/// Visible networks, strongest entry per ssid, hidden (empty ssid) ones dropped.
pub fn parse_wifi_list(stdout: &str) -> Vec<WifiNetwork> {
    let mut networks: Vec<WifiNetwork> = Vec::new();

    for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
        let fields = split_terse(line);
        let [in_use, ssid, signal, security] = fields.as_slice() else {
            continue;
        };
        let Some(ssid) = non_empty(ssid) else {
            continue;
        };
        let network = WifiNetwork {
            ssid,
            signal: signal.trim().parse().unwrap_or(0),
            security: security.trim().to_string(),
            in_use: in_use.trim() == "*",
        };

        match networks.iter_mut().find(|n| n.ssid == network.ssid) {
            Some(existing) => {
                let in_use = existing.in_use || network.in_use;
                if network.signal > existing.signal {
                    *existing = network;
                }
                existing.in_use = in_use;
            }
            None => networks.push(network),
        }
    }

    networks.sort_by(|a, b| b.signal.cmp(&a.signal));
    networks
}

/// Split `192.168.0.10/24` into address and prefix length.
pub fn split_cidr(cidr: &str) -> Option<(Ipv4Addr, u8)> {
    let (addr, prefix) = cidr.trim().split_once('/')?;
    let prefix: u8 = prefix.parse().ok()?;
    (prefix <= 32).then_some(())?;
    Some((addr.parse().ok()?, prefix))
}

pub fn prefix_to_mask(prefix: u8) -> Ipv4Addr {
    let bits = match prefix {
        0 => 0,
        p if p >= 32 => u32::MAX,
        p => u32::MAX << (32 - u32::from(p)),
    };
    Ipv4Addr::from(bits)
}

/// Prefix length of a dotted mask, `None` for non-contiguous masks.
pub fn mask_to_prefix(mask: &str) -> Option<u8> {
    let bits = u32::from(mask.trim().parse::<Ipv4Addr>().ok()?);
    let prefix = bits.leading_ones();
    (bits.checked_shl(prefix).unwrap_or(0) == 0).then_some(prefix as u8)
}

/// Display view of a profile's stored ipv4 settings.
///
/// `stdout` is the output of
/// `nmcli -g ipv4.method,ipv4.addresses,ipv4.gateway,ipv4.dns connection show <profile>`.
pub fn parse_profile_config(name: &str, stdout: &str) -> ProfileConfig {
    let lines = parse_value_lines(stdout, 4);
    let list = |value: &str| -> Vec<String> {
        value
            .split([',', '|'])
            .filter_map(non_empty)
            .collect()
    };

    let method = match lines[0].trim() {
        "auto" => ProfileMethod::Dhcp,
        "manual" => ProfileMethod::Static,
        "disabled" => ProfileMethod::Disabled,
        _ => ProfileMethod::Other,
    };

    ProfileConfig {
        name: name.to_string(),
        method,
        addresses: list(&lines[1]),
        gateway: non_empty(&lines[2]),
        dns: list(&lines[3]),
    }
}
