//! Property-based tests for netsnap
//!
//! These tests verify:
//! - Merge conflict policy (disjoint keys, placeholder override, primary wins, recursion)
//! - Merge key order and identity
//! - Tag matching is exactly set inclusion
//! - Plan building is deterministic and command assignment follows the matcher

use netsnap::core::matcher::matches;
use netsnap::core::merge::{merge, merge_mappings};
use netsnap::core::parser::parse_config;
use netsnap::core::planner::build_plan;
use netsnap::core::types::{TagSet, SENTINEL};
use proptest::prelude::*;
use serde_yaml_ng::{Mapping, Value};

// =============================================================================
// Strategies
// =============================================================================

/// Non-placeholder scalar values.
fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[a-z]{1,6}".prop_map(Value::from),
        any::<i32>().prop_map(|n| Value::from(n as i64)),
        any::<bool>().prop_map(Value::from),
    ]
}

/// Flat mapping with keys carrying `prefix`.
fn mapping_strategy(prefix: &'static str) -> impl Strategy<Value = Mapping> {
    prop::collection::vec(("[a-h]{1,3}", scalar_strategy()), 0..8).prop_map(move |pairs| {
        pairs
            .into_iter()
            .map(|(k, v)| (Value::from(format!("{}{}", prefix, k)), v))
            .collect()
    })
}

fn tag_set_strategy() -> impl Strategy<Value = TagSet> {
    prop::collection::btree_set(prop_oneof![
        Just("prod".to_string()),
        Just("lab".to_string()),
        Just("core".to_string()),
        Just("edge".to_string()),
        Just("spine".to_string()),
    ], 0..4)
}

fn yaml_list(tags: &TagSet) -> String {
    let items: Vec<&str> = tags.iter().map(String::as_str).collect();
    format!("[{}]", items.join(", "))
}

// =============================================================================
// Merge properties
// =============================================================================

proptest! {
    /// Disjoint keys: every key of both sides survives with its own value
    #[test]
    fn merge_disjoint_keys_kept(p in mapping_strategy("p_"), s in mapping_strategy("s_")) {
        let merged = merge_mappings(&p, &s);
        prop_assert_eq!(merged.len(), p.len() + s.len());
        for (k, v) in p.iter().chain(s.iter()) {
            prop_assert_eq!(merged.get(k), Some(v));
        }
    }

    /// Placeholder in primary yields secondary's value
    #[test]
    fn merge_placeholder_takes_secondary(v in scalar_strategy()) {
        let mut p = Mapping::new();
        p.insert("k".into(), SENTINEL.into());
        let mut s = Mapping::new();
        s.insert("k".into(), v.clone());
        let merged = merge_mappings(&p, &s);
        prop_assert_eq!(merged.get("k"), Some(&v));
    }

    /// Non-placeholder, non-mapping primary value wins
    #[test]
    fn merge_primary_scalar_wins(a in scalar_strategy(), b in scalar_strategy()) {
        let mut p = Mapping::new();
        p.insert("k".into(), a.clone());
        let mut s = Mapping::new();
        s.insert("k".into(), b);
        let merged = merge_mappings(&p, &s);
        prop_assert_eq!(merged.get("k"), Some(&a));
    }

    /// Nested mappings merge recursively
    #[test]
    fn merge_nested_recursion(x in scalar_strategy(), y in scalar_strategy()) {
        let mut p: Value = serde_yaml_ng::from_str("k: {x: 0}").unwrap();
        let mut s: Value = serde_yaml_ng::from_str("k: {y: 0}").unwrap();
        p["k"]["x"] = x.clone();
        s["k"]["y"] = y.clone();

        let merged = merge(&p, &s).unwrap();
        prop_assert_eq!(&merged["k"]["x"], &x);
        prop_assert_eq!(&merged["k"]["y"], &y);
    }

    /// Result key order: primary's keys, then secondary-only keys
    #[test]
    fn merge_key_order(p in mapping_strategy(""), s in mapping_strategy("")) {
        let merged = merge_mappings(&p, &s);
        let mut expected: Vec<&Value> = p.keys().collect();
        expected.extend(s.keys().filter(|k| !p.contains_key(*k)));
        let actual: Vec<&Value> = merged.keys().collect();
        prop_assert_eq!(actual, expected);
    }

    /// Empty mapping is an identity on either side
    #[test]
    fn merge_empty_identity(m in mapping_strategy("")) {
        let empty = Mapping::new();
        prop_assert_eq!(merge_mappings(&m, &empty), m.clone());
        prop_assert_eq!(merge_mappings(&empty, &m), m);
    }
}

// =============================================================================
// Matcher properties
// =============================================================================

proptest! {
    /// matches() is exactly subset inclusion
    #[test]
    fn matcher_is_subset(rule in tag_set_strategy(), host in tag_set_strategy()) {
        prop_assert_eq!(matches(&rule, &host), rule.is_subset(&host));
    }

    /// Empty rule matches every host
    #[test]
    fn matcher_empty_rule_matches_all(host in tag_set_strategy()) {
        prop_assert!(matches(&TagSet::new(), &host));
    }

    /// A host always matches a rule built from its own tags
    #[test]
    fn matcher_reflexive(host in tag_set_strategy()) {
        prop_assert!(matches(&host, &host));
    }
}

// =============================================================================
// Plan properties
// =============================================================================

proptest! {
    /// Every host's commands are the concatenation, in block order, of the
    /// command blocks whose tags it carries; building twice gives the same plan
    #[test]
    fn plan_commands_follow_matcher(
        hosts in prop::collection::vec(tag_set_strategy(), 1..6),
        rules in prop::collection::vec(tag_set_strategy(), 0..5),
    ) {
        let mut yaml = String::from("- host_db:\n");
        for (i, tags) in hosts.iter().enumerate() {
            yaml.push_str(&format!("    - h{}: {}\n", i, yaml_list(tags)));
        }
        for (i, tags) in rules.iter().enumerate() {
            yaml.push_str(&format!("- tags: {}\n  snapshot_commands: [cmd{}]\n", yaml_list(tags), i));
        }
        yaml.push_str("- tags: []\n  username: u\n  password: p\n");

        let blocks = parse_config(&yaml).unwrap();
        let plan = build_plan(&blocks).unwrap();
        prop_assert_eq!(&plan, &build_plan(&blocks).unwrap());

        for (i, host_tags) in hosts.iter().enumerate() {
            let expected: Vec<String> = rules
                .iter()
                .enumerate()
                .filter(|(_, rule)| rule.is_subset(host_tags))
                .map(|(j, _)| format!("cmd{}", j))
                .collect();
            let entry = plan.get(&format!("h{}", i)).unwrap();
            prop_assert_eq!(&entry.commands, &expected);
        }
        prop_assert!(plan.targets().is_ok());
    }
}
