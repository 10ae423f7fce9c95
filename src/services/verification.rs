//! Post-activation verification
//!
//! Shared by the interface configurator and the wifi connector: after a settle
//! delay the interface has to report `connected` with an ipv4 address. Failed
//! checks cycle the profile (down, up) and are retried within the verify budget.
//! The gateway ping is informational only.

use crate::{
    command_executor::CommandExecutor,
    error::{NetworkError, NetworkResult},
    services::{
        inventory::InterfaceInventory,
        nmcli::{self, Nmcli},
        probe,
        retry::RetryPolicy,
    },
    types::AdminState,
};
use log::{debug, info, warn};
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;

/// Outcome of a successful verification.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkUp {
    pub ipv4: Option<String>,
    pub attempts: u32,
}

pub struct LinkVerifier<E> {
    executor: Arc<E>,
    nmcli: Nmcli,
    inventory: InterfaceInventory<E>,
    settle_delay: Duration,
    ping_timeout_secs: u32,
    retry: RetryPolicy,
}

impl<E> LinkVerifier<E>
where
    E: CommandExecutor,
{
    pub fn new(
        executor: Arc<E>,
        nmcli: Nmcli,
        inventory: InterfaceInventory<E>,
        settle_delay: Duration,
        ping_timeout_secs: u32,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            executor,
            nmcli,
            inventory,
            settle_delay,
            ping_timeout_secs,
            retry,
        }
    }

    /// Verify `interface` came up with `profile` active.
    ///
    /// `gateway` is pinged once after success; if absent the gateway currently
    /// reported for the interface is used.
    pub async fn verify_up(
        &self,
        interface: &str,
        profile: &str,
        gateway: Option<&str>,
    ) -> NetworkResult<LinkUp> {
        sleep(self.settle_delay).await;

        let label = format!("verify {interface}");
        let (address, attempts) = self
            .retry
            .run(
                &label,
                |_| self.check(interface),
                |_| self.cycle(profile),
            )
            .await
            .map_err(|exhausted| NetworkError::PostValidation {
                target: interface.to_string(),
                attempts: exhausted.attempts,
                reason: exhausted.last_error,
            })?;

        info!("{interface} is up with {address} after {attempts} attempt(s)");

        self.ping_gateway(interface, gateway).await;

        Ok(LinkUp {
            ipv4: nmcli::split_cidr(&address).map(|(addr, _)| addr.to_string()),
            attempts,
        })
    }

    /// Connected with an ipv4 address, which is returned in CIDR notation.
    async fn check(&self, interface: &str) -> Result<String, String> {
        let status = self
            .inventory
            .device_status(interface)
            .await
            .map_err(|e| format!("{e:#}"))?
            .ok_or_else(|| format!("{interface} disappeared"))?;

        if status.state != AdminState::Connected {
            return Err(format!("{interface} is {}", status.state));
        }

        self.inventory
            .ipv4_address(interface)
            .await
            .ok_or_else(|| format!("{interface} has no ipv4 address"))
    }

    async fn cycle(&self, profile: &str) {
        debug!("cycling profile {profile}");

        if let Err(e) = self
            .executor
            .execute(&self.nmcli.connection_down(profile))
            .await
        {
            debug!("deactivate {profile}: {e}");
        }

        if let Err(e) = self.executor.execute(&self.nmcli.connection_up(profile)).await {
            warn!("reactivate {profile}: {e}");
        }
    }

    async fn ping_gateway(&self, interface: &str, gateway: Option<&str>) {
        let gateway = match gateway {
            Some(gateway) => Some(gateway.to_string()),
            None => self.inventory.gateway(interface).await,
        };

        let Some(gateway) = gateway else {
            debug!("{interface} has no gateway to ping");
            return;
        };

        if !probe::ping(self.executor.as_ref(), &gateway, self.ping_timeout_secs).await {
            warn!("gateway {gateway} of {interface} does not answer ping");
        }
    }
}
