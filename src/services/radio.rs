use crate::{
    command_executor::CommandExecutor,
    error::{NetworkError, NetworkResult},
    services::nmcli::Nmcli,
};
use anyhow::Context;
use log::{debug, info};
use std::{sync::Arc, time::Duration};
use tokio::time::{Instant, sleep};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Global wifi radio switch, shared precondition of the client and hotspot roles.
pub struct WifiRadio<E> {
    executor: Arc<E>,
    nmcli: Nmcli,
    enable_timeout: Duration,
}

impl<E> WifiRadio<E>
where
    E: CommandExecutor,
{
    pub fn new(executor: Arc<E>, nmcli: Nmcli, enable_timeout: Duration) -> Self {
        Self {
            executor,
            nmcli,
            enable_timeout,
        }
    }

    pub async fn is_enabled(&self) -> NetworkResult<bool> {
        let output = self
            .executor
            .execute(&self.nmcli.radio_wifi())
            .await
            .context("failed to query wifi radio")?;

        Ok(output.stdout.trim() == "enabled")
    }

    /// Switch the radio on if needed and wait until it reports enabled.
    pub async fn ensure_enabled(&self) -> NetworkResult<()> {
        if self.is_enabled().await? {
            debug!("wifi radio already enabled");
            return Ok(());
        }

        info!("enabling wifi radio");
        self.executor
            .execute(&self.nmcli.radio_wifi_on())
            .await
            .map_err(|e| NetworkError::apply("enable wifi radio", e))?;

        let deadline = Instant::now() + self.enable_timeout;

        loop {
            if self.is_enabled().await? {
                info!("wifi radio enabled");
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(NetworkError::Precondition(format!(
                    "wifi radio still disabled after {}ms",
                    self.enable_timeout.as_millis()
                )));
            }

            sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}
