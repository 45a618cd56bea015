//! NS-011: Local execution transport.
//!
//! Runs each command through `bash` on this machine. Used for lab setups
//! where the "device" is the local host, and by the test suite.

use super::{DeviceError, ExecOutput};
use crate::core::types::Target;
use std::io::Write;
use std::process::{Command, Stdio};

/// Execute a shell script locally via `bash`.
pub fn exec_local(script: &str) -> Result<ExecOutput, DeviceError> {
    let mut child = Command::new("bash")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| DeviceError::Spawn {
            program: "bash",
            source,
        })?;

    if let Some(ref mut stdin) = child.stdin {
        stdin
            .write_all(script.as_bytes())
            .map_err(|source| DeviceError::Io {
                program: "bash",
                source,
            })?;
    }

    let output = child.wait_with_output().map_err(|source| DeviceError::Io {
        program: "bash",
        source,
    })?;

    Ok(ExecOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Run every command of a target in order; stop at the first failure.
pub fn run_commands(target: &Target) -> Result<Vec<String>, DeviceError> {
    target
        .commands
        .iter()
        .map(|command| exec_local(command)?.into_result(command))
        .collect()
}
