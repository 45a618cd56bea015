//! NS-012: SSH execution transport.
//!
//! Uses the `ssh` binary directly, with no libssh2 dependency. Batch mode only,
//! so authentication is key-based; the plan's username selects the remote
//! account. One ssh invocation per command keeps outputs separable.

use super::{ConnectionSettings, DeviceError, ExecOutput};
use crate::core::types::Target;
use std::process::{Command, Stdio};

/// Expand a leading `~/` to the home directory.
fn expand_home(key: &str) -> String {
    if let Some(rest) = key.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{}/{}", home, rest);
        }
    }
    key.to_string()
}

/// Build the ssh argument list for one command.
pub fn ssh_args(target: &Target, settings: &ConnectionSettings, command: &str) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-o".into(),
        "BatchMode=yes".into(),
        "-o".into(),
        format!("ConnectTimeout={}", settings.timeout.as_secs().max(1)),
        "-o".into(),
        "StrictHostKeyChecking=accept-new".into(),
    ];

    if let Some(port) = settings.port {
        args.push("-p".into());
        args.push(port.to_string());
    }
    if let Some(ref key) = settings.ssh_key {
        args.push("-i".into());
        args.push(expand_home(key));
    }

    args.push(format!("{}@{}", target.username, target.host));
    args.push(command.to_string());
    args
}

/// Execute one command on a remote device via SSH.
pub fn exec_ssh(
    target: &Target,
    settings: &ConnectionSettings,
    command: &str,
) -> Result<ExecOutput, DeviceError> {
    let output = Command::new("ssh")
        .args(ssh_args(target, settings, command))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|source| DeviceError::Spawn {
            program: "ssh",
            source,
        })?;

    Ok(ExecOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Run every command of a target in order; stop at the first failure.
pub fn run_commands(target: &Target, settings: &ConnectionSettings) -> Result<Vec<String>, DeviceError> {
    target
        .commands
        .iter()
        .map(|command| exec_ssh(target, settings, command)?.into_result(command))
        .collect()
}
