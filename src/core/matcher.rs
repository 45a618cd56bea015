//! NS-003: Tag matching: a rule applies to a host iff its tags are a subset.

use super::types::{SnapshotPlan, TagSet};

/// True iff every rule tag is carried by the host. An empty rule matches all.
pub fn matches(rule_tags: &TagSet, host_tags: &TagSet) -> bool {
    rule_tags.iter().all(|tag| host_tags.contains(tag))
}

/// Hostnames in `plan` that a rule with `rule_tags` applies to, in plan order.
pub fn select<'a>(rule_tags: &'a TagSet, plan: &'a SnapshotPlan) -> impl Iterator<Item = &'a str> {
    plan.hosts
        .iter()
        .filter(move |(_, entry)| matches(rule_tags, &entry.tags))
        .map(|(host, _)| host.as_str())
}
