//! Host command execution boundary
//!
//! Every interaction with the host network manager and the time-sync daemon goes
//! through [`CommandExecutor`]. Commands are plain argv arrays, never shell strings,
//! so user supplied values (ssid, passphrase, server names) cannot be interpreted
//! by a shell.

use crate::config::CommandConfig;
use log::debug;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use std::{process::Stdio, time::Duration};
use thiserror::Error;
use tokio::{process::Command, time::timeout};
use trait_variant::make;

/// Build an argv vector from anything implementing `ToString`.
#[macro_export]
macro_rules! argv {
    ($($arg:expr),* $(,)?) => {
        vec![$(($arg).to_string()),*]
    };
}

/// Arguments whose successor is a secret and must never end up in a log line.
const SECRET_KEYS: [&str; 4] = [
    "wifi-sec.psk",
    "802-11-wireless-security.psk",
    "wifi-sec.wep-key0",
    "802-11-wireless-security.wep-key0",
];

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn stdout(stdout: impl Into<String>) -> Self {
        CommandOutput {
            stdout: stdout.into(),
            ..Default::default()
        }
    }
}

/// A command exited non-zero, could not be spawned or timed out.
///
/// `exit_code` is `None` if the process never produced an exit status.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("failed to execute `{command}` (exit code: {}): {stderr}", exit_code_label(.exit_code))]
pub struct ExecError {
    pub command: String,
    pub exit_code: Option<i32>,
    pub stderr: String,
}

fn exit_code_label(exit_code: &Option<i32>) -> String {
    exit_code.map_or_else(|| "none".to_string(), |code| code.to_string())
}

impl ExecError {
    pub fn new(argv: &[String], exit_code: Option<i32>, stderr: impl Into<String>) -> Self {
        ExecError {
            command: display_argv(argv),
            exit_code,
            stderr: stderr.into(),
        }
    }
}

#[make(Send)]
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait CommandExecutor {
    async fn execute(&self, argv: &[String]) -> Result<CommandOutput, ExecError>;
}

/// Runs commands as child processes of this service.
#[derive(Clone, Debug)]
pub struct HostCommandExecutor {
    timeout: Duration,
}

impl HostCommandExecutor {
    pub fn new(config: &CommandConfig) -> Self {
        HostCommandExecutor {
            timeout: config.timeout,
        }
    }
}

impl CommandExecutor for HostCommandExecutor {
    async fn execute(&self, argv: &[String]) -> Result<CommandOutput, ExecError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(ExecError::new(argv, None, "empty command line"));
        };

        debug!("exec: {}", display_argv(argv));

        let child = Command::new(program)
            .args(args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ExecError::new(argv, None, format!("failed to spawn: {e}"))),
            Err(_) => {
                return Err(ExecError::new(
                    argv,
                    None,
                    format!("timed out after {}s", self.timeout.as_secs()),
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        match output.status.code() {
            Some(0) => Ok(CommandOutput {
                stdout,
                stderr,
                exit_code: 0,
            }),
            code => Err(ExecError::new(argv, code, stderr)),
        }
    }
}

/// Render an argv for logs and error messages with secrets masked.
pub fn display_argv(argv: &[String]) -> String {
    let mut rendered = Vec::with_capacity(argv.len());
    let mut mask_next = false;

    for arg in argv {
        if mask_next {
            rendered.push("******".to_string());
            mask_next = false;
            continue;
        }
        mask_next = SECRET_KEYS.contains(&arg.as_str());
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            rendered.push(format!("'{arg}'"));
        } else {
            rendered.push(arg.clone());
        }
    }

    rendered.join(" ")
}
