//! NS-005: Snapshot plan construction.
//!
//! Three ordered passes over the same block list, each returning a new plan:
//! 1. host discovery: merge `{host: {tags, commands: []}}` per inventory entry
//! 2. command assignment: append each command block to every matching host
//! 3. credential assignment: merge credentials into matching hosts, first match wins
//!
//! Passes 2 and 3 need the complete host set from pass 1, so they never interleave.

use super::error::{Error, Result};
use super::matcher;
use super::merge::Merge;
use super::types::*;
use indexmap::map::Entry;
use serde_yaml_ng::Value;

/// Build the snapshot plan from parsed config blocks.
pub fn build_plan(blocks: &[ConfigBlock]) -> Result<SnapshotPlan> {
    let plan = discover_hosts(blocks)?;
    let plan = assign_commands(plan, blocks);
    let plan = assign_credentials(plan, blocks)?;
    tracing::debug!(
        hosts = plan.len(),
        commands = plan.command_count(),
        unresolved = plan.unresolved_hosts().len(),
        "plan built"
    );
    Ok(plan)
}

/// Pass 1: every host in every inventory block, tags unioned across repeats.
pub fn discover_hosts(blocks: &[ConfigBlock]) -> Result<SnapshotPlan> {
    blocks
        .iter()
        .filter_map(|block| match block {
            ConfigBlock::Hosts(hosts) => Some(hosts),
            _ => None,
        })
        .flat_map(HostBlock::hosts)
        .try_fold(SnapshotPlan::default(), |mut plan, (host, tags)| {
            let fresh = HostEntry::discovered(tags);
            match plan.hosts.entry(host.to_string()) {
                Entry::Occupied(mut seen) => {
                    let merged = seen.get().merge(&fresh)?;
                    seen.insert(merged);
                }
                Entry::Vacant(slot) => {
                    slot.insert(fresh);
                }
            }
            Ok(plan)
        })
}

/// Pass 2: append commands, in block order, to every host the block's tags select.
pub fn assign_commands(plan: SnapshotPlan, blocks: &[ConfigBlock]) -> SnapshotPlan {
    blocks
        .iter()
        .filter_map(|block| match block {
            ConfigBlock::Commands(commands) => Some(commands),
            _ => None,
        })
        .fold(plan, |mut plan, block| {
            let rule = block.tag_set();
            let mut matched = 0usize;
            for entry in plan.hosts.values_mut() {
                if matcher::matches(&rule, &entry.tags) {
                    entry.commands.extend(block.snapshot_commands.iter().cloned());
                    matched += 1;
                }
            }
            if matched == 0 {
                tracing::debug!(tags = ?rule, "command block matches no host");
            }
            plan
        })
}

/// Pass 3: merge credentials into matching hosts. The existing entry is the
/// primary side, so the first matching block keeps its values.
pub fn assign_credentials(plan: SnapshotPlan, blocks: &[ConfigBlock]) -> Result<SnapshotPlan> {
    blocks
        .iter()
        .filter_map(|block| match block {
            ConfigBlock::Credentials(creds) => Some(creds),
            _ => None,
        })
        .try_fold(plan, |mut plan, block| {
            let rule = block.tag_set();
            let incoming = HostEntry::with_credentials(block);
            for entry in plan.hosts.values_mut() {
                if matcher::matches(&rule, &entry.tags) {
                    *entry = entry.merge(&incoming)?;
                }
            }
            Ok(plan)
        })
}

impl SnapshotPlan {
    /// Resolve every host into an executable target.
    ///
    /// Fails with [`Error::UnresolvedHosts`] if any host lacks a username or
    /// password (or still holds the placeholder), and with
    /// [`Error::UnresolvedOptions`] if a connection option still holds the
    /// placeholder. No device is contacted with a half-resolved plan.
    pub fn targets(&self) -> Result<Vec<Target>> {
        let unresolved = self.unresolved_hosts();
        if !unresolved.is_empty() {
            return Err(Error::UnresolvedHosts { hosts: unresolved });
        }
        let options = self.unresolved_options();
        if !options.is_empty() {
            return Err(Error::UnresolvedOptions { options });
        }

        Ok(self
            .hosts
            .iter()
            .filter_map(|(host, entry)| {
                Some(Target {
                    host: host.clone(),
                    username: entry.username.clone()?,
                    password: entry.password.clone()?,
                    commands: entry.commands.clone(),
                    connection: entry.connection.clone(),
                })
            })
            .collect())
    }

    /// Look up a connection option for a host, e.g. `transport` or `port`.
    pub fn connection_option(&self, host: &str, key: &str) -> Option<&Value> {
        self.hosts.get(host)?.connection.get(key)
    }
}
