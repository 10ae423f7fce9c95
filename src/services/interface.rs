use crate::{
    command_executor::CommandExecutor,
    error::{NetworkError, NetworkResult},
    services::{
        inventory::InterfaceInventory,
        nmcli::{self, DeviceStatus, Nmcli},
        verification::LinkVerifier,
    },
    types::{AddressingMethod, AdminState, InterfaceKind, NetworkConfigRequest, NetworkConfigResponse},
};
use anyhow::Context;
use log::{debug, info, warn};
use serde_valid::Validate;
use std::{net::Ipv4Addr, sync::Arc, time::Duration};
use tokio::time::sleep;

// ============================================================================
// State machine
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigureState {
    Unconfigured,
    Validating,
    Applying,
    VerifyingUp,
    Verified,
    Failed,
}

impl ConfigureState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConfigureState::Verified | ConfigureState::Failed)
    }
}

/// Logs every transition of one configure run.
struct Transitions<'a> {
    interface: &'a str,
    state: ConfigureState,
}

impl<'a> Transitions<'a> {
    fn new(interface: &'a str) -> Self {
        Transitions {
            interface,
            state: ConfigureState::Unconfigured,
        }
    }

    fn enter(&mut self, next: ConfigureState) {
        debug_assert!(
            !self.state.is_terminal(),
            "{}: no transition out of {:?}",
            self.interface,
            self.state
        );
        debug!("{}: {:?} -> {:?}", self.interface, self.state, next);
        self.state = next;
    }
}

// ============================================================================
// Addressing plan
// ============================================================================

/// Validated addressing derived from a [`NetworkConfigRequest`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddressPlan {
    Dhcp,
    Static {
        address: Ipv4Addr,
        prefix: u8,
        gateway: Ipv4Addr,
        nameservers: Vec<Ipv4Addr>,
    },
}

fn parse_ipv4(field: &str, value: Option<&str>) -> NetworkResult<Ipv4Addr> {
    let value = value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| NetworkError::Validation(format!("{field} is required for static addressing")))?;

    value
        .parse()
        .map_err(|_| NetworkError::Validation(format!("{field} is not a valid ipv4 address: {value}")))
}

impl AddressPlan {
    pub fn from_request(request: &NetworkConfigRequest) -> NetworkResult<Self> {
        request
            .validate()
            .map_err(|e| NetworkError::Validation(e.to_string()))?;

        if request.dhcp {
            return Ok(AddressPlan::Dhcp);
        }

        let address = parse_ipv4("ipv4", request.ipv4.as_deref())?;
        let gateway = parse_ipv4("gateway", request.gateway.as_deref())?;

        let prefix = match request.subnet_mask.as_deref().map(str::trim) {
            None | Some("") => 32,
            Some(mask) => nmcli::mask_to_prefix(mask).ok_or_else(|| {
                NetworkError::Validation(format!("subnetMask is not a valid mask: {mask}"))
            })?,
        };

        let nameservers = request
            .nameservers
            .iter()
            .map(|server| parse_ipv4("nameserver", Some(server.as_str())))
            .collect::<NetworkResult<Vec<_>>>()?;

        Ok(AddressPlan::Static {
            address,
            prefix,
            gateway,
            nameservers,
        })
    }

    pub fn method(&self) -> AddressingMethod {
        match self {
            AddressPlan::Dhcp => AddressingMethod::Dhcp,
            AddressPlan::Static { .. } => AddressingMethod::Static,
        }
    }

    /// ipv4 settings written with a single `connection modify`.
    ///
    /// Switching to dhcp clears every static field, so applying the same plan
    /// twice leaves the profile in the same state.
    pub fn settings(&self) -> Vec<(&'static str, String)> {
        match self {
            AddressPlan::Dhcp => vec![
                ("ipv4.method", "auto".to_string()),
                ("ipv4.addresses", String::new()),
                ("ipv4.gateway", String::new()),
                ("ipv4.dns", String::new()),
            ],
            AddressPlan::Static {
                address,
                prefix,
                gateway,
                nameservers,
            } => vec![
                ("ipv4.method", "manual".to_string()),
                ("ipv4.addresses", format!("{address}/{prefix}")),
                ("ipv4.gateway", gateway.to_string()),
                (
                    "ipv4.dns",
                    nameservers
                        .iter()
                        .map(Ipv4Addr::to_string)
                        .collect::<Vec<_>>()
                        .join(","),
                ),
            ],
        }
    }

    fn gateway(&self) -> Option<String> {
        match self {
            AddressPlan::Dhcp => None,
            AddressPlan::Static { gateway, .. } => Some(gateway.to_string()),
        }
    }
}

// ============================================================================
// Configurator
// ============================================================================

/// Applies dhcp or static ipv4 addressing to one interface.
pub struct InterfaceConfigurator<E> {
    executor: Arc<E>,
    nmcli: Nmcli,
    inventory: InterfaceInventory<E>,
    verifier: Arc<LinkVerifier<E>>,
    settle_delay: Duration,
}

impl<E> InterfaceConfigurator<E>
where
    E: CommandExecutor,
{
    pub fn new(
        executor: Arc<E>,
        nmcli: Nmcli,
        inventory: InterfaceInventory<E>,
        verifier: Arc<LinkVerifier<E>>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            executor,
            nmcli,
            inventory,
            verifier,
            settle_delay,
        }
    }

    /// Validate, apply and verify `request`.
    ///
    /// Validation and precondition failures happen before any mutation. A
    /// successful apply that never settles fails with
    /// [`NetworkError::PostValidation`].
    pub async fn configure(
        &self,
        request: &NetworkConfigRequest,
    ) -> NetworkResult<NetworkConfigResponse> {
        info!("configure interface: {request:?}");

        let mut transitions = Transitions::new(&request.interface);
        transitions.enter(ConfigureState::Validating);

        let result = self.run(request, &mut transitions).await;

        match &result {
            Ok(response) => {
                transitions.enter(ConfigureState::Verified);
                info!(
                    "configured {} ({:?}) after {} attempt(s)",
                    response.interface, response.method, response.attempts
                );
            }
            Err(e) => {
                transitions.enter(ConfigureState::Failed);
                warn!("failed to configure {}: {e}", request.interface);
            }
        }

        result
    }

    async fn run(
        &self,
        request: &NetworkConfigRequest,
        transitions: &mut Transitions<'_>,
    ) -> NetworkResult<NetworkConfigResponse> {
        let plan = AddressPlan::from_request(request)?;
        let interface = request.interface.as_str();
        let profile = self.prepare(interface).await?;

        transitions.enter(ConfigureState::Applying);
        self.apply(&profile, &plan).await?;

        transitions.enter(ConfigureState::VerifyingUp);
        let gateway = plan.gateway();
        let up = self
            .verifier
            .verify_up(interface, &profile, gateway.as_deref())
            .await?;

        Ok(NetworkConfigResponse {
            configured: true,
            method: plan.method(),
            interface: interface.to_string(),
            profile,
            ipv4: up.ipv4,
            attempts: up.attempts,
        })
    }

    /// Preconditions; returns the profile to apply to.
    async fn prepare(&self, interface: &str) -> NetworkResult<String> {
        let mut status = self
            .inventory
            .device_status(interface)
            .await?
            .ok_or_else(|| NetworkError::Precondition(format!("interface {interface} not found")))?;

        if status.kind == Some(InterfaceKind::Ethernet) && !self.inventory.carrier(interface).await?
        {
            return Err(NetworkError::Precondition(format!(
                "no physical link on {interface}"
            )));
        }

        if matches!(status.state, AdminState::Unmanaged | AdminState::Unavailable) {
            status = self.enable(status).await?;
        }

        match self.bound_profile(&status).await? {
            Some(profile) => Ok(profile),
            None => self.create_profile(&status).await,
        }
    }

    async fn enable(&self, status: DeviceStatus) -> NetworkResult<DeviceStatus> {
        let interface = status.name.as_str();
        info!("enabling {interface} ({})", status.state);

        if status.state == AdminState::Unmanaged {
            self.executor
                .execute(&self.nmcli.set_managed(interface))
                .await
                .map_err(|e| NetworkError::apply(format!("manage {interface}"), e))?;
        }

        if let Err(e) = self
            .executor
            .execute(&self.nmcli.device_connect(interface))
            .await
        {
            debug!("connect {interface}: {e}");
        }

        sleep(self.settle_delay).await;

        let status = self
            .inventory
            .device_status(interface)
            .await?
            .ok_or_else(|| NetworkError::Precondition(format!("interface {interface} disappeared")))?;

        match status.state {
            AdminState::Unmanaged | AdminState::Unavailable => Err(NetworkError::Precondition(
                format!("{interface} is still {} after enabling", status.state),
            )),
            AdminState::Disconnected => {
                warn!("{interface} is enabled but still disconnected");
                Ok(status)
            }
            AdminState::Connected => Ok(status),
        }
    }

    /// The device's current profile, else a saved profile bound to it by name.
    async fn bound_profile(&self, status: &DeviceStatus) -> NetworkResult<Option<String>> {
        if let Some(profile) = &status.connection {
            return Ok(Some(profile.clone()));
        }

        let output = self
            .executor
            .execute(&self.nmcli.connections())
            .await
            .context("failed to list profiles")?;

        for entry in nmcli::parse_connections(&output.stdout) {
            let matching_kind = match status.kind {
                Some(InterfaceKind::Wifi) => entry.is_wifi(),
                _ => entry.kind == nmcli::TYPE_ETHERNET || entry.kind == "ethernet",
            };
            if !matching_kind {
                continue;
            }
            if entry.device.as_deref() == Some(status.name.as_str()) {
                return Ok(Some(entry.name));
            }

            let argv = self
                .nmcli
                .connection_fields(&entry.name, &["connection.interface-name"]);
            match self.executor.execute(&argv).await {
                Ok(output) => {
                    let fields = nmcli::parse_fields(&output.stdout);
                    if nmcli::field(&fields, "connection.interface-name")
                        == Some(status.name.as_str())
                    {
                        return Ok(Some(entry.name));
                    }
                }
                Err(e) => debug!("failed to read binding of {}: {e}", entry.name),
            }
        }

        Ok(None)
    }

    async fn create_profile(&self, status: &DeviceStatus) -> NetworkResult<String> {
        let interface = status.name.as_str();

        if status.kind != Some(InterfaceKind::Ethernet) {
            return Err(NetworkError::Precondition(format!(
                "no profile bound to {interface}"
            )));
        }

        info!("creating profile for {interface}");

        self.executor
            .execute(&self.nmcli.connection_add("ethernet", interface, interface, &[]))
            .await
            .map_err(|e| NetworkError::apply(format!("create profile for {interface}"), e))?;

        self.executor
            .execute(&self.nmcli.connection_up(interface))
            .await
            .map_err(|e| NetworkError::apply(format!("activate profile {interface}"), e))?;

        Ok(interface.to_string())
    }

    async fn apply(&self, profile: &str, plan: &AddressPlan) -> NetworkResult<()> {
        debug!("applying {:?} to {profile}", plan.method());

        self.executor
            .execute(&self.nmcli.connection_modify(profile, &plan.settings()))
            .await
            .map_err(|e| NetworkError::apply(format!("modify profile {profile}"), e))?;

        self.executor
            .execute(&self.nmcli.connection_up(profile))
            .await
            .map_err(|e| NetworkError::apply(format!("activate profile {profile}"), e))?;

        Ok(())
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

    fn request(dhcp: bool) -> NetworkConfigRequest {
        NetworkConfigRequest {
            interface: "eth0".to_string(),
            dhcp,
            ipv4: Some("192.168.0.120".to_string()),
            gateway: Some("192.168.0.1".to_string()),
            subnet_mask: Some("255.255.255.0".to_string()),
            nameservers: vec!["1.1.1.1".to_string()],
        }
    }

    fn configurator(executor: MockCommandExecutor) -> InterfaceConfigurator<MockCommandExecutor> {
        let executor = Arc::new(executor);
        let nmcli = Nmcli::new("nmcli");
        let inventory = InterfaceInventory::new(executor.clone(), nmcli.clone());
        let verifier = LinkVerifier::new(
            executor.clone(),
            nmcli.clone(),
            inventory.clone(),
            Duration::ZERO,
            1,
            RetryPolicy::immediate(3),
        );
        InterfaceConfigurator::new(executor, nmcli, inventory, Arc::new(verifier), Duration::ZERO)
    }

    /// A healthy host with `eth0` bound to profile `eth0`; records every command.
    fn healthy_host(carrier: &'static str) -> (MockCommandExecutor, Arc<Mutex<Vec<String>>>) {
        let commands = Arc::new(Mutex::new(Vec::new()));
        let recorded = commands.clone();
        let mut executor = MockCommandExecutor::new();
        executor.expect_execute().returning(move |argv| {
            let command = argv.join(" ");
            recorded.lock().unwrap().push(command.clone());
            let result = match command.as_str() {
                "nmcli -t -f DEVICE,TYPE,STATE,CONNECTION device status" => {
                    Ok(CommandOutput::stdout("eth0:ethernet:connected:eth0\n"))
                }
                "nmcli -g WIRED-PROPERTIES.CARRIER device show eth0" => {
                    Ok(CommandOutput::stdout(carrier))
                }
                "nmcli -g IP4.ADDRESS device show eth0" => {
                    Ok(CommandOutput::stdout("192.168.0.120/24\n"))
                }
                "nmcli -g IP4.GATEWAY device show eth0" => {
                    Ok(CommandOutput::stdout("192.168.0.1\n"))
                }
                c if c.starts_with("nmcli connection modify id eth0")
                    || c == "nmcli connection up id eth0"
                    || c.starts_with("ping") =>
                {
                    Ok(CommandOutput::default())
                }
                _ => Err(ExecError::new(argv, Some(2), "unexpected")),
            };
            Box::pin(async move { result })
        });
        (executor, commands)
    }

    mod validation {
        use super::*;

        #[test]
        fn static_requires_address_and_gateway() {
            let mut missing_ip = request(false);
            missing_ip.ipv4 = None;
            assert!(matches!(
                AddressPlan::from_request(&missing_ip),
                Err(NetworkError::Validation(_))
            ));

            let mut missing_gateway = request(false);
            missing_gateway.gateway = Some(" ".to_string());
            assert!(matches!(
                AddressPlan::from_request(&missing_gateway),
                Err(NetworkError::Validation(_))
            ));
        }

        #[test]
        fn mask_defaults_to_host_route() {
            let mut req = request(false);
            req.subnet_mask = None;

            match AddressPlan::from_request(&req).unwrap() {
                AddressPlan::Static { prefix, .. } => assert_eq!(prefix, 32),
                plan => panic!("unexpected plan: {plan:?}"),
            }
        }

        #[test]
        fn rejects_non_contiguous_mask() {
            let mut req = request(false);
            req.subnet_mask = Some("255.0.255.0".to_string());

            assert!(matches!(
                AddressPlan::from_request(&req),
                Err(NetworkError::Validation(_))
            ));
        }

        #[test]
        fn dhcp_clears_static_fields() {
            let settings = AddressPlan::Dhcp.settings();
            assert_eq!(settings[0], ("ipv4.method", "auto".to_string()));
            assert!(settings[1..].iter().all(|(_, value)| value.is_empty()));
        }

        #[tokio::test]
        async fn invalid_request_issues_no_command() {
            let mut executor = MockCommandExecutor::new();
            executor.expect_execute().never();

            let mut req = request(false);
            req.gateway = None;

            let err = configurator(executor).configure(&req).await.unwrap_err();
            assert!(matches!(err, NetworkError::Validation(_)));
        }
    }

    mod configure {
        use super::*;

        #[tokio::test]
        async fn static_issues_one_modify_and_one_activation() {
            let (executor, commands) = healthy_host("on\n");

            let response = configurator(executor)
                .configure(&request(false))
                .await
                .unwrap();

            assert!(response.configured);
            assert_eq!(response.method, AddressingMethod::Static);
            assert_eq!(response.ipv4.as_deref(), Some("192.168.0.120"));
            assert_eq!(response.attempts, 1);

            let commands = commands.lock().unwrap();
            let modifies: Vec<_> = commands
                .iter()
                .filter(|c| c.starts_with("nmcli connection modify"))
                .collect();
            assert_eq!(
                modifies,
                vec![
                    "nmcli connection modify id eth0 ipv4.method manual ipv4.addresses 192.168.0.120/24 ipv4.gateway 192.168.0.1 ipv4.dns 1.1.1.1"
                ]
            );
            assert_eq!(
                commands
                    .iter()
                    .filter(|c| *c == "nmcli connection up id eth0")
                    .count(),
                1
            );
        }

        #[tokio::test]
        async fn dhcp_twice_issues_identical_commands() {
            let (executor, commands) = healthy_host("on\n");
            let configurator = configurator(executor);

            configurator.configure(&request(true)).await.unwrap();
            let first = std::mem::take(&mut *commands.lock().unwrap());
            configurator.configure(&request(true)).await.unwrap();
            let second = commands.lock().unwrap().clone();

            assert_eq!(first, second);
            assert!(first.contains(
                &"nmcli connection modify id eth0 ipv4.method auto ipv4.addresses  ipv4.gateway  ipv4.dns "
                    .to_string()
            ));
        }

        #[tokio::test]
        async fn missing_carrier_fails_without_mutation() {
            let (executor, commands) = healthy_host("off\n");

            let err = configurator(executor)
                .configure(&request(false))
                .await
                .unwrap_err();

            assert!(matches!(err, NetworkError::Precondition(_)));
            let commands = commands.lock().unwrap();
            assert_eq!(commands.len(), 2);
            assert!(!commands.iter().any(|c| c.contains("modify") || c.contains(" up ")));
        }

        #[tokio::test]
        async fn unknown_interface_is_a_precondition_failure() {
            let (executor, _) = healthy_host("on\n");
            let mut req = request(true);
            req.interface = "eth9".to_string();

            let err = configurator(executor).configure(&req).await.unwrap_err();

            assert!(matches!(err, NetworkError::Precondition(_)));
        }

        #[tokio::test]
        async fn failing_modify_is_an_apply_error() {
            let mut executor = MockCommandExecutor::new();
            executor.expect_execute().returning(|argv| {
                let result = match argv.join(" ").as_str() {
                    "nmcli -t -f DEVICE,TYPE,STATE,CONNECTION device status" => {
                        Ok(CommandOutput::stdout("eth0:ethernet:connected:eth0\n"))
                    }
                    "nmcli -g WIRED-PROPERTIES.CARRIER device show eth0" => {
                        Ok(CommandOutput::stdout("on\n"))
                    }
                    _ => Err(ExecError::new(argv, Some(2), "invalid property")),
                };
                Box::pin(async move { result })
            });

            let err = configurator(executor)
                .configure(&request(false))
                .await
                .unwrap_err();

            assert!(matches!(err, NetworkError::Apply { .. }));
        }

        #[tokio::test]
        async fn creates_profile_when_none_is_bound() {
            let commands = Arc::new(Mutex::new(Vec::new()));
            let recorded = commands.clone();
            let mut executor = MockCommandExecutor::new();
            executor.expect_execute().returning(move |argv| {
                let command = argv.join(" ");
                recorded.lock().unwrap().push(command.clone());
                let result = match command.as_str() {
                    "nmcli -t -f DEVICE,TYPE,STATE,CONNECTION device status" => {
                        Ok(CommandOutput::stdout("eth1:ethernet:connected:\n"))
                    }
                    "nmcli -g WIRED-PROPERTIES.CARRIER device show eth1" => {
                        Ok(CommandOutput::stdout("on\n"))
                    }
                    "nmcli -t -f NAME,TYPE,DEVICE,ACTIVE connection show" => {
                        Ok(CommandOutput::stdout("Hotspot:802-11-wireless::no\n"))
                    }
                    "nmcli -g IP4.ADDRESS device show eth1" => {
                        Ok(CommandOutput::stdout("10.0.0.5/8\n"))
                    }
                    "nmcli -g IP4.GATEWAY device show eth1" => Ok(CommandOutput::default()),
                    "nmcli connection add type ethernet ifname eth1 con-name eth1"
                    | "nmcli connection up id eth1" => Ok(CommandOutput::default()),
                    c if c.starts_with("nmcli connection modify id eth1") => {
                        Ok(CommandOutput::default())
                    }
                    _ => Err(ExecError::new(argv, Some(2), "unexpected")),
                };
                Box::pin(async move { result })
            });

            let mut req = request(true);
            req.interface = "eth1".to_string();
            let response = configurator(executor).configure(&req).await.unwrap();

            assert_eq!(response.profile, "eth1");
            assert!(commands
                .lock()
                .unwrap()
                .contains(&"nmcli connection add type ethernet ifname eth1 con-name eth1".to_string()));
        }

        #[tokio::test]
        async fn interface_staying_unavailable_is_fatal() {
            let mut executor = MockCommandExecutor::new();
            executor.expect_execute().returning(|argv| {
                let result = match argv.join(" ").as_str() {
                    "nmcli -t -f DEVICE,TYPE,STATE,CONNECTION device status" => {
                        Ok(CommandOutput::stdout("wlan0:wifi:unavailable:\n"))
                    }
                    "nmcli device connect wlan0" => {
                        Err(ExecError::new(argv, Some(4), "device is not available"))
                    }
                    _ => Err(ExecError::new(argv, Some(2), "unexpected")),
                };
                Box::pin(async move { result })
            });

            let mut req = request(true);
            req.interface = "wlan0".to_string();
            let err = configurator(executor).configure(&req).await.unwrap_err();

            assert!(matches!(err, NetworkError::Precondition(_)));
            assert!(err.to_string().contains("still unavailable"));
        }

        #[tokio::test]
        async fn interface_left_disconnected_after_enabling_is_still_configured() {
            let commands = Arc::new(Mutex::new(Vec::new()));
            let recorded = commands.clone();
            let mut status_calls = 0;
            let mut executor = MockCommandExecutor::new();
            executor.expect_execute().returning(move |argv| {
                let command = argv.join(" ");
                recorded.lock().unwrap().push(command.clone());
                let stdout = match command.as_str() {
                    "nmcli -t -f DEVICE,TYPE,STATE,CONNECTION device status" => {
                        status_calls += 1;
                        match status_calls {
                            1 => "wlan0:wifi:unmanaged:\n",
                            2 => "wlan0:wifi:disconnected:\n",
                            _ => "wlan0:wifi:connected:home\n",
                        }
                    }
                    "nmcli -t -f NAME,TYPE,DEVICE,ACTIVE connection show" => {
                        "home:802-11-wireless:wlan0:no\n"
                    }
                    "nmcli -g IP4.ADDRESS device show wlan0" => "192.168.1.50/24\n",
                    "nmcli device set wlan0 managed yes"
                    | "nmcli device connect wlan0"
                    | "nmcli connection up id home"
                    | "nmcli -g IP4.GATEWAY device show wlan0" => "",
                    c if c.starts_with("nmcli connection modify id home") => "",
                    _ => {
                        let err = ExecError::new(argv, Some(2), "unexpected");
                        return Box::pin(async move { Err(err) });
                    }
                };
                Box::pin(async move { Ok(CommandOutput::stdout(stdout)) })
            });

            let mut req = request(true);
            req.interface = "wlan0".to_string();
            let response = configurator(executor).configure(&req).await.unwrap();

            assert_eq!(response.profile, "home");
            assert_eq!(response.ipv4.as_deref(), Some("192.168.1.50"));
            assert_eq!(
                *commands.lock().unwrap(),
                [
                    "nmcli -t -f DEVICE,TYPE,STATE,CONNECTION device status",
                    "nmcli device set wlan0 managed yes",
                    "nmcli device connect wlan0",
                    "nmcli -t -f DEVICE,TYPE,STATE,CONNECTION device status",
                    "nmcli -t -f NAME,TYPE,DEVICE,ACTIVE connection show",
                    "nmcli connection modify id home ipv4.method auto ipv4.addresses  ipv4.gateway  ipv4.dns ",
                    "nmcli connection up id home",
                    "nmcli -t -f DEVICE,TYPE,STATE,CONNECTION device status",
                    "nmcli -g IP4.ADDRESS device show wlan0",
                    "nmcli -g IP4.GATEWAY device show wlan0",
                ]
            );
        }
    }

    #[test]
    fn terminal_states() {
        assert!(ConfigureState::Verified.is_terminal());
        assert!(ConfigureState::Failed.is_terminal());
        assert!(!ConfigureState::VerifyingUp.is_terminal());
    }

    #[test]
    fn transitions_run_in_order() {
        let mut transitions = Transitions::new("eth0");
        for state in [
            ConfigureState::Validating,
            ConfigureState::Applying,
            ConfigureState::VerifyingUp,
            ConfigureState::Verified,
        ] {
            transitions.enter(state);
        }
        assert_eq!(transitions.state, ConfigureState::Verified);
    }

    #[test]
    #[should_panic(expected = "no transition out of Failed")]
    fn terminal_state_is_final() {
        let mut transitions = Transitions::new("eth0");
        transitions.enter(ConfigureState::Failed);
        transitions.enter(ConfigureState::Applying);
    }
}
