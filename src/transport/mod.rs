//! NS-010: Device transports: eAPI over HTTP(S), ssh, and local shell.
//!
//! The [`Transport`] trait is the seam the executor talks to. [`Dispatcher`]
//! is the production implementation: it reads the host's `connection`
//! options and routes to the matching backend.

pub mod eapi;
pub mod local;
pub mod ssh;

use crate::core::types::Target;
use serde_yaml_ng::{Mapping, Value};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default per-connection timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Failure talking to one device. Recovered per host by the executor.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} I/O error: {source}")]
    Io {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with code {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("HTTP error: {message}")]
    Http {
        message: String,
        status: Option<u16>,
    },

    #[error("device rejected request (code {code}): {message}")]
    Rpc { code: i64, message: String },

    #[error("expected {expected} result(s), device returned {got}")]
    ResultCount { expected: usize, got: usize },

    #[error("invalid connection option `{key}`: {message}")]
    InvalidOption { key: String, message: String },
}

impl From<ureq::Error> for DeviceError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {}", code),
                status: Some(code),
            },
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

/// Output from executing a command on a target.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Convert to the command's output, or a failure carrying stderr.
    pub fn into_result(self, command: &str) -> Result<String, DeviceError> {
        if self.success() {
            Ok(self.stdout)
        } else {
            Err(DeviceError::CommandFailed {
                command: command.to_string(),
                exit_code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Runs a target's commands and returns one output string per command, in order.
pub trait Transport: Sync {
    fn execute(&self, target: &Target) -> Result<Vec<String>, DeviceError>;
}

/// How to reach a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportKind {
    #[default]
    Https,
    Http,
    Ssh,
    Local,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Https => write!(f, "https"),
            Self::Http => write!(f, "http"),
            Self::Ssh => write!(f, "ssh"),
            Self::Local => write!(f, "local"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "https" => Ok(Self::Https),
            "http" => Ok(Self::Http),
            "ssh" => Ok(Self::Ssh),
            "local" => Ok(Self::Local),
            other => Err(DeviceError::InvalidOption {
                key: "transport".to_string(),
                message: format!("unknown transport '{}' (expected https, http, ssh, local)", other),
            }),
        }
    }
}

/// Typed view of a host's `connection` mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub kind: TransportKind,
    pub port: Option<u16>,
    pub timeout: Duration,
    pub verify_tls: bool,
    pub ssh_key: Option<String>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            port: None,
            timeout: DEFAULT_TIMEOUT,
            verify_tls: false,
            ssh_key: None,
        }
    }
}

impl ConnectionSettings {
    /// Read settings from a merged `connection` mapping. Unknown keys are ignored.
    pub fn from_mapping(mapping: &Mapping) -> Result<Self, DeviceError> {
        let mut settings = Self::default();

        for (key, value) in mapping {
            let Some(key) = key.as_str() else { continue };
            match key {
                "transport" => settings.kind = as_str(key, value)?.parse()?,
                "port" => {
                    let port = as_u64(key, value)?;
                    settings.port = Some(u16::try_from(port).map_err(|_| invalid(key, "out of range"))?);
                }
                "timeout_secs" => settings.timeout = Duration::from_secs(as_u64(key, value)?),
                "verify_tls" => {
                    settings.verify_tls = value.as_bool().ok_or_else(|| invalid(key, "expected true or false"))?
                }
                "ssh_key" => settings.ssh_key = Some(as_str(key, value)?.to_string()),
                other => tracing::debug!(option = other, "ignoring unknown connection option"),
            }
        }

        Ok(settings)
    }
}

fn invalid(key: &str, message: &str) -> DeviceError {
    DeviceError::InvalidOption {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn as_str<'a>(key: &str, value: &'a Value) -> Result<&'a str, DeviceError> {
    value.as_str().ok_or_else(|| invalid(key, "expected a string"))
}

fn as_u64(key: &str, value: &Value) -> Result<u64, DeviceError> {
    value
        .as_u64()
        .ok_or_else(|| invalid(key, "expected a non-negative integer"))
}

/// Routes each target to the backend named by its connection options.
#[derive(Debug, Default, Clone, Copy)]
pub struct Dispatcher;

impl Transport for Dispatcher {
    fn execute(&self, target: &Target) -> Result<Vec<String>, DeviceError> {
        if target.commands.is_empty() {
            return Ok(Vec::new());
        }

        let settings = ConnectionSettings::from_mapping(&target.connection)?;
        tracing::debug!(host = %target.host, transport = %settings.kind, "connecting");

        match settings.kind {
            TransportKind::Https | TransportKind::Http => eapi::run_cmds(target, &settings),
            TransportKind::Ssh => ssh::run_commands(target, &settings),
            TransportKind::Local => local::run_commands(target),
        }
    }
}
