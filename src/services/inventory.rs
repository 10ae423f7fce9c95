//! Interface inventory
//!
//! Enumerates interfaces and enriches them with live attributes. Enrichment is
//! best-effort: a failing sub-query drops that attribute but never the
//! interface or the enumeration as a whole.

use crate::{
    command_executor::CommandExecutor,
    error::NetworkResult,
    services::nmcli::{self, DeviceStatus, Nmcli},
    types::{InterfaceDescriptor, InterfaceKind, ProfileConfig},
};
use anyhow::Context;
use log::debug;
use std::sync::Arc;

const PROPERTY_MAC: &str = "GENERAL.HWADDR";
const PROPERTY_ADDRESS: &str = "IP4.ADDRESS";
const PROPERTY_GATEWAY: &str = "IP4.GATEWAY";
const PROPERTY_DNS: &str = "IP4.DNS";
const PROPERTY_CARRIER: &str = "WIRED-PROPERTIES.CARRIER";

pub struct InterfaceInventory<E> {
    executor: Arc<E>,
    nmcli: Nmcli,
}

impl<E> Clone for InterfaceInventory<E> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            nmcli: self.nmcli.clone(),
        }
    }
}

impl<E> InterfaceInventory<E>
where
    E: CommandExecutor,
{
    pub fn new(executor: Arc<E>, nmcli: Nmcli) -> Self {
        Self { executor, nmcli }
    }

    /// All interfaces of a supported kind, each enriched with live attributes.
    pub async fn list_interfaces(&self) -> NetworkResult<Vec<InterfaceDescriptor>> {
        let mut interfaces = Vec::new();

        for status in self.device_statuses().await? {
            interfaces.push(self.enrich(status).await);
        }

        Ok(interfaces)
    }

    pub async fn list_wifi_interfaces(&self) -> NetworkResult<Vec<InterfaceDescriptor>> {
        let mut interfaces = Vec::new();

        for status in self
            .device_statuses()
            .await?
            .into_iter()
            .filter(|status| status.kind == Some(InterfaceKind::Wifi))
        {
            interfaces.push(self.enrich(status).await);
        }

        Ok(interfaces)
    }

    pub async fn get_interface(&self, name: &str) -> NetworkResult<Option<InterfaceDescriptor>> {
        match self.device_status(name).await? {
            Some(status) => Ok(Some(self.enrich(status).await)),
            None => Ok(None),
        }
    }

    /// Enumeration without enrichment. Devices of unsupported kinds are skipped.
    pub async fn device_statuses(&self) -> NetworkResult<Vec<DeviceStatus>> {
        let output = self
            .executor
            .execute(&self.nmcli.device_status())
            .await
            .context("failed to enumerate interfaces")?;

        Ok(nmcli::parse_device_status(&output.stdout)
            .into_iter()
            .filter(|status| status.kind.is_some())
            .collect())
    }

    /// Live state of a single interface, `None` if it does not exist.
    pub async fn device_status(&self, name: &str) -> NetworkResult<Option<DeviceStatus>> {
        Ok(self
            .device_statuses()
            .await?
            .into_iter()
            .find(|status| status.name == name))
    }

    /// First ipv4 address (CIDR notation) currently assigned, best-effort.
    pub async fn ipv4_address(&self, name: &str) -> Option<String> {
        self.property(name, PROPERTY_ADDRESS)
            .await
            .and_then(|addresses| addresses.into_iter().next())
    }

    pub async fn gateway(&self, name: &str) -> Option<String> {
        self.property(name, PROPERTY_GATEWAY)
            .await
            .and_then(|gateways| gateways.into_iter().next())
    }

    /// Whether the physical link of an interface is up.
    pub async fn carrier(&self, name: &str) -> NetworkResult<bool> {
        let output = self
            .executor
            .execute(&self.nmcli.device_property(name, PROPERTY_CARRIER))
            .await
            .context(format!("failed to read carrier of {name}"))?;

        Ok(nmcli::parse_values(&output.stdout)
            .first()
            .is_some_and(|carrier| carrier == "on" || carrier == "yes"))
    }

    /// Stored addressing settings of a profile, `None` if there is no such profile.
    pub async fn bound_profile_config(&self, profile: &str) -> NetworkResult<Option<ProfileConfig>> {
        let argv = self.nmcli.connection_values(
            profile,
            &["ipv4.method", "ipv4.addresses", "ipv4.gateway", "ipv4.dns"],
        );

        match self.executor.execute(&argv).await {
            Ok(output) => Ok(Some(nmcli::parse_profile_config(profile, &output.stdout))),
            Err(e) if nmcli::is_not_found(&e) => {
                debug!("profile {profile} not found");
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("failed to read profile {profile}"))
                .into()),
        }
    }

    async fn enrich(&self, status: DeviceStatus) -> InterfaceDescriptor {
        let name = status.name;
        let mac = self
            .property(&name, PROPERTY_MAC)
            .await
            .and_then(|values| values.into_iter().next());
        let address = self
            .property(&name, PROPERTY_ADDRESS)
            .await
            .and_then(|values| values.into_iter().next())
            .and_then(|cidr| nmcli::split_cidr(&cidr));
        let gateway = self.gateway(&name).await;
        let dns = self
            .property(&name, PROPERTY_DNS)
            .await
            .filter(|servers| !servers.is_empty());

        InterfaceDescriptor {
            kind: status.kind.unwrap_or(InterfaceKind::Ethernet),
            admin_state: status.state,
            bound_profile: status.connection,
            mac,
            ipv4: address.map(|(addr, _)| addr.to_string()),
            subnet_mask: address.map(|(_, prefix)| nmcli::prefix_to_mask(prefix).to_string()),
            gateway,
            dns,
            name,
        }
    }

    /// Informational sub-query; failures are logged and yield `None`.
    async fn property(&self, name: &str, property: &str) -> Option<Vec<String>> {
        match self
            .executor
            .execute(&self.nmcli.device_property(name, property))
            .await
        {
            Ok(output) => Some(nmcli::parse_values(&output.stdout)),
            Err(e) => {
                debug!("failed to read {property} of {name}: {e}");
                None
            }
        }
    }
}
