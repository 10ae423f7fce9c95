use crate::{argv, command_executor::CommandExecutor};
use log::debug;

/// Single ICMP echo with a short timeout. Never fails, unreachable is `false`.
pub async fn ping<E>(executor: &E, host: &str, timeout_secs: u32) -> bool
where
    E: CommandExecutor,
{
    match executor
        .execute(&argv!["ping", "-c", "1", "-W", timeout_secs, host])
        .await
    {
        Ok(_) => true,
        Err(e) => {
            debug!("ping {host} failed: {e}");
            false
        }
    }
}
