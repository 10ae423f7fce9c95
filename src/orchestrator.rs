//! Single entry point for callers
//!
//! Wires every component once around one command executor and serializes
//! configuration operations per interface or radio. Read-only operations are not
//! serialized.

use crate::{
    command_executor::CommandExecutor,
    config::{NetworkConfig, TimeSyncConfig},
    error::NetworkResult,
    services::{
        hotspot::HotspotManager,
        interface::InterfaceConfigurator,
        inventory::InterfaceInventory,
        locks::ResourceLocks,
        nmcli::Nmcli,
        radio::WifiRadio,
        timesync::TimeSyncManager,
        verification::LinkVerifier,
        wifi::WifiConnector,
    },
    types::{
        ConnectivityResult, HotspotConfig, HotspotStatus, InterfaceDescriptor, NetworkConfigRequest,
        NetworkConfigResponse, NtpConfig, NtpStatus, ProfileConfig, WifiConnectResponse,
        WifiDisconnectResponse, WifiJoinRequest, WifiNetwork,
    },
};
use anyhow::Context;
use log::info;
use std::sync::Arc;

/// Lock key for wifi operations on a host without any wifi interface.
const WIFI_RADIO: &str = "wifi";
const TIMESYNC: &str = "timesync";

pub struct Orchestrator<E> {
    executor: Arc<E>,
    nmcli: Nmcli,
    inventory: InterfaceInventory<E>,
    interfaces: InterfaceConfigurator<E>,
    wifi: WifiConnector<E>,
    hotspot: HotspotManager<E>,
    timesync: TimeSyncManager<E>,
    locks: ResourceLocks,
}

impl<E> Orchestrator<E>
where
    E: CommandExecutor,
{
    pub fn new(executor: E, network: &NetworkConfig, timesync: &TimeSyncConfig) -> Self {
        let executor = Arc::new(executor);
        let nmcli = Nmcli::new(network.nmcli_path.clone());
        let inventory = InterfaceInventory::new(executor.clone(), nmcli.clone());
        let radio = Arc::new(WifiRadio::new(
            executor.clone(),
            nmcli.clone(),
            network.radio_enable_timeout,
        ));
        let verifier = Arc::new(LinkVerifier::new(
            executor.clone(),
            nmcli.clone(),
            inventory.clone(),
            network.settle_delay,
            network.ping_timeout_secs,
            network.verify_retry,
        ));

        Orchestrator {
            interfaces: InterfaceConfigurator::new(
                executor.clone(),
                nmcli.clone(),
                inventory.clone(),
                verifier.clone(),
                network.settle_delay,
            ),
            wifi: WifiConnector::new(
                executor.clone(),
                nmcli.clone(),
                inventory.clone(),
                radio.clone(),
                verifier,
                network.scan_wait,
            ),
            hotspot: HotspotManager::new(
                executor.clone(),
                nmcli.clone(),
                inventory.clone(),
                radio,
                network.verify_retry,
                network.hotspot_profile_name.clone(),
            ),
            timesync: TimeSyncManager::new(executor.clone(), inventory.clone(), timesync.clone()),
            locks: ResourceLocks::default(),
            executor,
            nmcli,
            inventory,
        }
    }

    pub async fn list_interfaces(&self) -> NetworkResult<Vec<InterfaceDescriptor>> {
        self.inventory.list_interfaces().await
    }

    pub async fn list_wifi_interfaces(&self) -> NetworkResult<Vec<InterfaceDescriptor>> {
        self.inventory.list_wifi_interfaces().await
    }

    pub async fn get_interface(&self, name: &str) -> NetworkResult<Option<InterfaceDescriptor>> {
        self.inventory.get_interface(name).await
    }

    pub async fn get_bound_profile_config(
        &self,
        profile: &str,
    ) -> NetworkResult<Option<ProfileConfig>> {
        self.inventory.bound_profile_config(profile).await
    }

    pub async fn configure_interface(
        &self,
        request: &NetworkConfigRequest,
    ) -> NetworkResult<NetworkConfigResponse> {
        let _guard = self.locks.acquire(&request.interface).await;
        self.interfaces.configure(request).await
    }

    pub async fn connect_wifi(&self, request: &WifiJoinRequest) -> NetworkResult<WifiConnectResponse> {
        WifiConnector::<E>::validate(request)?;

        let interface = self
            .wifi
            .resolve_interface(request.interface.as_deref())
            .await?;
        let _guard = self.locks.acquire(&interface).await;

        self.wifi.connect(request, &interface).await
    }

    /// Deactivate the active client profile, serialized on the radio it runs on.
    pub async fn disconnect_wifi(&self) -> NetworkResult<WifiDisconnectResponse> {
        let Some(profile) = self.wifi.active_client().await? else {
            info!("no active wifi client profile");
            return Ok(WifiDisconnectResponse {
                disconnected: false,
                profile: None,
            });
        };

        let _guard = self
            .locks
            .acquire(profile.entry.device.as_deref().unwrap_or(WIFI_RADIO))
            .await;

        self.wifi.disconnect(&profile).await?;

        Ok(WifiDisconnectResponse {
            disconnected: true,
            profile: Some(profile.entry.name),
        })
    }

    pub async fn scan_wifi(&self, interface: Option<&str>) -> NetworkResult<Vec<WifiNetwork>> {
        let interface = self.wifi.resolve_interface(interface).await?;
        self.wifi.scan(&interface).await
    }

    pub async fn get_hotspot_status(&self) -> NetworkResult<HotspotStatus> {
        self.hotspot.get_status().await
    }

    pub async fn configure_hotspot(&self, config: &HotspotConfig) -> NetworkResult<HotspotStatus> {
        HotspotManager::<E>::validate(config)?;

        let interface = self
            .hotspot
            .resolve_interface(config.interface.as_deref())
            .await?;
        let _guard = self
            .locks
            .acquire(interface.as_deref().unwrap_or(WIFI_RADIO))
            .await;

        self.hotspot.configure(config, interface.as_deref()).await
    }

    pub async fn get_ntp_status(&self) -> NetworkResult<NtpStatus> {
        self.timesync.get_status().await
    }

    pub async fn configure_ntp(&self, config: &NtpConfig) -> NetworkResult<NtpStatus> {
        let _guard = self.locks.acquire(TIMESYNC).await;
        self.timesync.configure(config).await
    }

    pub async fn check_ntp_connectivity(&self, host: &str) -> NetworkResult<ConnectivityResult> {
        self.timesync.check_connectivity(host).await
    }

    /// Whether the host network manager is running.
    pub async fn healthcheck(&self) -> NetworkResult<bool> {
        let output = self
            .executor
            .execute(&self.nmcli.general_running())
            .await
            .context("failed to query network manager")?;

        Ok(output.stdout.trim() == "running")
    }
}
