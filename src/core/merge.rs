//! NS-002: Recursive mapping merge with primary-wins conflict policy.
//!
//! For every key in either input:
//! - present on one side only → that side's value
//! - mappings on both sides → merged recursively, same rules at every depth
//! - otherwise → primary's value, unless it is the `"to be defined"`
//!   placeholder, in which case secondary's value
//!
//! Sequences and scalars are never merged element-wise. Tag sets are the one
//! exception: [`TagSet`] merges by union so that a host declared twice keeps
//! every tag it was given.

use super::types::{HostEntry, SnapshotPlan, TagSet, SENTINEL};
use indexmap::IndexMap;
use serde_yaml_ng::{Mapping, Value};
use std::hash::Hash;

/// Malformed merge input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    #[error("{side} value is not a mapping (got {found})")]
    NotAMapping { side: &'static str, found: &'static str },
}

/// Combine two values of the same type. `self` is the primary side.
pub trait Merge: Sized {
    fn merge(&self, secondary: &Self) -> Result<Self, MergeError>;
}

/// Free-function form: `merge(primary, secondary)`.
pub fn merge<T: Merge>(primary: &T, secondary: &T) -> Result<T, MergeError> {
    primary.merge(secondary)
}

/// True if the value is the placeholder string.
pub fn is_sentinel(value: &Value) -> bool {
    matches!(value, Value::String(s) if s == SENTINEL)
}

/// Merge two YAML mappings. Key order: primary's keys, then secondary-only keys.
pub fn merge_mappings(primary: &Mapping, secondary: &Mapping) -> Mapping {
    let mut result = Mapping::new();

    for (key, value) in primary {
        let merged = match secondary.get(key) {
            Some(other) => merge_entry(value, other),
            None => value.clone(),
        };
        result.insert(key.clone(), merged);
    }
    for (key, value) in secondary {
        if !primary.contains_key(key) {
            result.insert(key.clone(), value.clone());
        }
    }

    result
}

fn merge_entry(primary: &Value, secondary: &Value) -> Value {
    match (primary, secondary) {
        (Value::Mapping(p), Value::Mapping(s)) => Value::Mapping(merge_mappings(p, s)),
        _ if is_sentinel(primary) => secondary.clone(),
        _ => primary.clone(),
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

impl Merge for Mapping {
    fn merge(&self, secondary: &Self) -> Result<Self, MergeError> {
        Ok(merge_mappings(self, secondary))
    }
}

impl Merge for Value {
    fn merge(&self, secondary: &Self) -> Result<Self, MergeError> {
        match (self, secondary) {
            (Value::Mapping(p), Value::Mapping(s)) => Ok(Value::Mapping(merge_mappings(p, s))),
            (Value::Mapping(_), other) => Err(MergeError::NotAMapping {
                side: "secondary",
                found: value_kind(other),
            }),
            (other, _) => Err(MergeError::NotAMapping {
                side: "primary",
                found: value_kind(other),
            }),
        }
    }
}

impl<K, V> Merge for IndexMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Merge + Clone,
{
    fn merge(&self, secondary: &Self) -> Result<Self, MergeError> {
        let mut result = IndexMap::with_capacity(self.len() + secondary.len());

        for (key, value) in self {
            let merged = match secondary.get(key) {
                Some(other) => value.merge(other)?,
                None => value.clone(),
            };
            result.insert(key.clone(), merged);
        }
        for (key, value) in secondary {
            if !self.contains_key(key) {
                result.insert(key.clone(), value.clone());
            }
        }

        Ok(result)
    }
}

impl Merge for TagSet {
    fn merge(&self, secondary: &Self) -> Result<Self, MergeError> {
        Ok(self.union(secondary).cloned().collect())
    }
}

/// Scalar rule for an optional field: an absent or placeholder primary yields.
fn merge_field(primary: &Option<String>, secondary: &Option<String>) -> Option<String> {
    match primary.as_deref() {
        None => secondary.clone(),
        Some(SENTINEL) => secondary.clone().or_else(|| primary.clone()),
        Some(_) => primary.clone(),
    }
}

impl Merge for HostEntry {
    fn merge(&self, secondary: &Self) -> Result<Self, MergeError> {
        Ok(Self {
            tags: self.tags.merge(&secondary.tags)?,
            commands: self.commands.clone(),
            username: merge_field(&self.username, &secondary.username),
            password: merge_field(&self.password, &secondary.password),
            connection: self.connection.merge(&secondary.connection)?,
        })
    }
}

impl Merge for SnapshotPlan {
    fn merge(&self, secondary: &Self) -> Result<Self, MergeError> {
        Ok(Self {
            hosts: self.hosts.merge(&secondary.hosts)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml_ng::from_str(s).unwrap()
    }

    #[test]
    fn test_ns002_disjoint_keys() {
        let merged = merge(&yaml("a: 1\nb: 2"), &yaml("c: 3")).unwrap();
        assert_eq!(merged, yaml("a: 1\nb: 2\nc: 3"));
    }

    #[test]
    fn test_ns002_primary_wins() {
        let merged = merge(&yaml("k: keep"), &yaml("k: drop")).unwrap();
        assert_eq!(merged["k"], Value::String("keep".into()));
    }

    #[test]
    fn test_ns002_sentinel_yields() {
        let merged = merge(&yaml("k: to be defined"), &yaml("k: real")).unwrap();
        assert_eq!(merged["k"], Value::String("real".into()));
    }

    #[test]
    fn test_ns002_sentinel_yields_to_mapping() {
        let merged = merge(&yaml("k: to be defined"), &yaml("k: {x: 1}")).unwrap();
        assert_eq!(merged["k"], yaml("x: 1"));
    }

    #[test]
    fn test_ns002_sentinel_kept_when_alone() {
        let merged = merge(&yaml("k: to be defined"), &yaml("other: 1")).unwrap();
        assert!(is_sentinel(&merged["k"]));
    }

    #[test]
    fn test_ns002_nested_recursion() {
        let merged = merge(&yaml("k: {x: 1}"), &yaml("k: {y: 2}")).unwrap();
        assert_eq!(merged["k"], yaml("x: 1\ny: 2"));
    }

    #[test]
    fn test_ns002_deep_sentinel() {
        let merged = merge(
            &yaml("a: {b: {c: to be defined, d: 1}}"),
            &yaml("a: {b: {c: 9, d: 2, e: 3}}"),
        )
        .unwrap();
        assert_eq!(merged, yaml("a: {b: {c: 9, d: 1, e: 3}}"));
    }

    #[test]
    fn test_ns002_sequences_not_merged() {
        let merged = merge(&yaml("k: [1, 2]"), &yaml("k: [3]")).unwrap();
        assert_eq!(merged["k"], yaml("[1, 2]"));
    }

    #[test]
    fn test_ns002_mapping_vs_scalar_primary_wins() {
        let merged = merge(&yaml("k: {x: 1}"), &yaml("k: flat")).unwrap();
        assert_eq!(merged["k"], yaml("x: 1"));
    }

    #[test]
    fn test_ns002_inputs_untouched() {
        let a = yaml("k: to be defined");
        let b = yaml("k: v");
        let _ = merge(&a, &b).unwrap();
        assert!(is_sentinel(&a["k"]));
        assert_eq!(b["k"], Value::String("v".into()));
    }

    #[test]
    fn test_ns002_key_order() {
        let merged = merge(&yaml("b: 1\na: 2"), &yaml("c: 3\nb: 4")).unwrap();
        let keys: Vec<_> = merged
            .as_mapping()
            .unwrap()
            .keys()
            .map(|k| k.as_str().unwrap().to_string())
            .collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_ns002_non_mapping_root_rejected() {
        let err = merge(&yaml("[1, 2]"), &yaml("a: 1")).unwrap_err();
        assert_eq!(
            err,
            MergeError::NotAMapping {
                side: "primary",
                found: "sequence"
            }
        );
        let err = merge(&yaml("a: 1"), &yaml("plain")).unwrap_err();
        assert!(err.to_string().contains("secondary"));
    }

    #[test]
    fn test_ns002_tag_union() {
        let a: TagSet = ["prod", "core"].iter().map(|s| s.to_string()).collect();
        let b: TagSet = ["core", "edge"].iter().map(|s| s.to_string()).collect();
        let merged = merge(&a, &b).unwrap();
        assert_eq!(merged.len(), 3);
        assert!(merged.contains("edge"));
    }

    #[test]
    fn test_ns002_host_entry_credentials_first_wins() {
        let mut primary = HostEntry::discovered(TagSet::new());
        primary.username = Some("first".into());
        primary.password = Some("one".into());
        let mut secondary = HostEntry::default();
        secondary.username = Some("second".into());
        secondary.password = Some("two".into());

        let merged = primary.merge(&secondary).unwrap();
        assert_eq!(merged.username.as_deref(), Some("first"));
        assert_eq!(merged.password.as_deref(), Some("one"));
    }

    #[test]
    fn test_ns002_host_entry_sentinel_credentials_yield() {
        let mut primary = HostEntry::default();
        primary.username = Some("admin".into());
        primary.password = Some(SENTINEL.into());
        let mut secondary = HostEntry::default();
        secondary.username = Some("other".into());
        secondary.password = Some("s3cret".into());

        let merged = primary.merge(&secondary).unwrap();
        assert_eq!(merged.username.as_deref(), Some("admin"));
        assert_eq!(merged.password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_ns002_host_entry_commands_primary() {
        let mut primary = HostEntry::default();
        primary.commands = vec!["show version".into()];
        let mut secondary = HostEntry::default();
        secondary.commands = vec!["show clock".into()];
        let merged = primary.merge(&secondary).unwrap();
        assert_eq!(merged.commands, vec!["show version"]);
    }

    #[test]
    fn test_ns002_plan_merge_new_and_existing_hosts() {
        let mut a = SnapshotPlan::default();
        a.hosts.insert(
            "h1".into(),
            HostEntry::discovered(["x".to_string()].into_iter().collect()),
        );
        let mut b = SnapshotPlan::default();
        b.hosts.insert(
            "h1".into(),
            HostEntry::discovered(["y".to_string()].into_iter().collect()),
        );
        b.hosts.insert("h2".into(), HostEntry::default());

        let merged = a.merge(&b).unwrap();
        let hosts: Vec<_> = merged.hosts.keys().cloned().collect();
        assert_eq!(hosts, vec!["h1", "h2"]);
        assert_eq!(merged.hosts["h1"].tags.len(), 2);
    }
}
