//! NS-001: Config blocks, resolved host entries, the snapshot plan, and run results.
//!
//! The YAML source is a sequence of blocks. Each block is one of three kinds,
//! discriminated by the key it carries (`host_db`, `snapshot_commands`,
//! `username`). The parser turns them into [`ConfigBlock`] variants; the
//! planner folds them into a [`SnapshotPlan`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml_ng::Mapping;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// Placeholder value meaning "not yet set, a later merge may override".
pub const SENTINEL: &str = "to be defined";

/// Set of tags attached to a host or a rule. Ordered for stable output.
pub type TagSet = BTreeSet<String>;

// ============================================================================
// Config blocks
// ============================================================================

/// One declarative unit of the configuration source.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigBlock {
    Hosts(HostBlock),
    Commands(CommandBlock),
    Credentials(CredentialBlock),
}

impl ConfigBlock {
    /// Short kind name used in diagnostics.
    pub fn kind(&self) -> BlockKind {
        match self {
            Self::Hosts(_) => BlockKind::Hosts,
            Self::Commands(_) => BlockKind::Commands,
            Self::Credentials(_) => BlockKind::Credentials,
        }
    }
}

/// Block discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Hosts,
    Commands,
    Credentials,
}

impl BlockKind {
    /// The key whose presence identifies this kind of block.
    pub fn marker_key(self) -> &'static str {
        match self {
            Self::Hosts => "host_db",
            Self::Commands => "snapshot_commands",
            Self::Credentials => "username",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hosts => write!(f, "host"),
            Self::Commands => write!(f, "command"),
            Self::Credentials => write!(f, "credential"),
        }
    }
}

/// Host inventory: `host_db` is a list of `{host: [tags]}` mappings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostBlock {
    #[serde(deserialize_with = "scalar::host_db")]
    pub host_db: Vec<IndexMap<String, Vec<String>>>,
}

impl HostBlock {
    /// Iterate `(hostname, tags)` pairs in declaration order.
    pub fn hosts(&self) -> impl Iterator<Item = (&str, TagSet)> + '_ {
        self.host_db.iter().flat_map(|entry| {
            entry
                .iter()
                .map(|(host, tags)| (host.as_str(), tags.iter().cloned().collect()))
        })
    }
}

/// Commands collected from every host carrying all of `tags`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandBlock {
    #[serde(deserialize_with = "scalar::string_list")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "scalar::string_list")]
    pub snapshot_commands: Vec<String>,
}

impl CommandBlock {
    pub fn tag_set(&self) -> TagSet {
        self.tags.iter().cloned().collect()
    }
}

/// Credentials (and optional connection options) for hosts carrying all of `tags`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialBlock {
    #[serde(deserialize_with = "scalar::string_list")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "scalar::string")]
    pub username: String,
    #[serde(deserialize_with = "scalar::string")]
    pub password: String,

    /// Transport options: `transport`, `port`, `timeout_secs`, `verify_tls`
    #[serde(default)]
    pub connection: Mapping,
}

impl CredentialBlock {
    pub fn tag_set(&self) -> TagSet {
        self.tags.iter().cloned().collect()
    }
}

/// Deserializers that take YAML scalars as text.
///
/// YAML types `password: 123456` or `sw1: [10, 20]` as numbers. Config
/// values are text, so any string, number or bool is taken in its YAML
/// spelling. Anything else is rejected.
mod scalar {
    use indexmap::IndexMap;
    use serde::de::{Deserializer, Error};
    use serde::Deserialize;
    use serde_yaml_ng::{Mapping, Value};

    fn text(value: Value) -> Result<String, String> {
        match value {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(format!(
                "expected a scalar, got {}",
                crate::core::merge::value_kind(&other)
            )),
        }
    }

    fn text_list(values: Vec<Value>) -> Result<Vec<String>, String> {
        values.into_iter().map(text).collect()
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        text(Value::deserialize(d)?).map_err(D::Error::custom)
    }

    pub fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        text_list(Vec::<Value>::deserialize(d)?).map_err(D::Error::custom)
    }

    pub fn host_db<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Vec<IndexMap<String, Vec<String>>>, D::Error> {
        Vec::<Mapping>::deserialize(d)?
            .into_iter()
            .map(|entry| {
                entry
                    .into_iter()
                    .map(|(host, tags)| {
                        let host = text(host).map_err(|e| format!("host name: {}", e))?;
                        let tags = match tags {
                            Value::Sequence(items) => text_list(items),
                            other => Err(format!(
                                "expected a sequence, got {}",
                                crate::core::merge::value_kind(&other)
                            )),
                        }
                        .map_err(|e| format!("tags of '{}': {}", host, e))?;
                        Ok((host, tags))
                    })
                    .collect::<Result<IndexMap<_, _>, String>>()
            })
            .collect::<Result<Vec<_>, String>>()
            .map_err(D::Error::custom)
    }
}

// ============================================================================
// Snapshot plan
// ============================================================================

/// Resolved per-host entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostEntry {
    pub tags: TagSet,

    /// Commands in assignment order; duplicates allowed
    #[serde(default)]
    pub commands: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Mapping::is_empty")]
    pub connection: Mapping,
}

impl HostEntry {
    /// A freshly discovered host: tags only, no commands yet.
    pub fn discovered(tags: TagSet) -> Self {
        Self {
            tags,
            ..Self::default()
        }
    }

    /// The partial entry a credential block contributes.
    pub fn with_credentials(block: &CredentialBlock) -> Self {
        Self {
            username: Some(block.username.clone()),
            password: Some(block.password.clone()),
            connection: block.connection.clone(),
            ..Self::default()
        }
    }

    /// True when both credentials are present and not the placeholder.
    pub fn has_credentials(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| s != SENTINEL);
        set(&self.username) && set(&self.password)
    }

    /// Connection option keys still holding the placeholder.
    pub fn unresolved_options(&self) -> Vec<String> {
        self.connection
            .iter()
            .filter(|(_, value)| value.as_str() == Some(SENTINEL))
            .map(|(key, _)| match key.as_str() {
                Some(k) => k.to_string(),
                None => serde_yaml_ng::to_string(key)
                    .map(|k| k.trim_end().to_string())
                    .unwrap_or_default(),
            })
            .collect()
    }
}

/// The fully resolved plan: hostname → entry, in first-declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotPlan {
    pub hosts: IndexMap<String, HostEntry>,
}

impl SnapshotPlan {
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn get(&self, host: &str) -> Option<&HostEntry> {
        self.hosts.get(host)
    }

    /// Total commands across all hosts.
    pub fn command_count(&self) -> usize {
        self.hosts.values().map(|e| e.commands.len()).sum()
    }

    /// Hosts that ended planning without usable credentials.
    pub fn unresolved_hosts(&self) -> Vec<String> {
        self.hosts
            .iter()
            .filter(|(_, entry)| !entry.has_credentials())
            .map(|(host, _)| host.clone())
            .collect()
    }

    /// `host.option` for every connection option still holding the placeholder.
    pub fn unresolved_options(&self) -> Vec<String> {
        self.hosts
            .iter()
            .flat_map(|(host, entry)| {
                entry
                    .unresolved_options()
                    .into_iter()
                    .map(move |key| format!("{}.{}", host, key))
            })
            .collect()
    }

    /// Copy of the plan with passwords masked, for display.
    pub fn redacted(&self) -> Self {
        let mut plan = self.clone();
        for entry in plan.hosts.values_mut() {
            if entry.password.is_some() {
                entry.password = Some("********".to_string());
            }
        }
        plan
    }
}

/// A plan entry with resolved credentials, ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub host: String,
    pub username: String,
    pub password: String,
    pub commands: Vec<String>,
    pub connection: Mapping,
}

// ============================================================================
// Run results
// ============================================================================

/// Output of one command on one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub command: String,
    pub output: String,
}

/// Result of running one host's commands.
#[derive(Debug)]
pub struct HostOutcome {
    pub host: String,
    pub collected_at: chrono::DateTime<chrono::Local>,
    pub duration: Duration,
    pub result: Result<Vec<CommandOutput>, crate::transport::DeviceError>,
}

impl HostOutcome {
    pub fn success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result of a whole run.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: chrono::DateTime<chrono::Local>,
    pub duration: Duration,
    pub outcomes: Vec<HostOutcome>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success()).count()
    }

    pub fn failed_hosts(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| !o.success())
            .map(|o| o.host.clone())
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
