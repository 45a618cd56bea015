//! NS-016: BLAKE3 plan fingerprints.

use crate::core::types::SnapshotPlan;

/// Hash a string. Returns `"blake3:{hex}"`.
pub fn hash_string(s: &str) -> String {
    format!("blake3:{}", blake3::hash(s.as_bytes()).to_hex())
}

/// Fingerprint a plan over the canonical JSON form of its redacted copy.
///
/// Host order and command order are part of the plan, so they are part of
/// the fingerprint. Passwords are masked before hashing: the fingerprint is
/// published in reports and must not confirm a password guess.
pub fn fingerprint(plan: &SnapshotPlan) -> String {
    let shown = plan.redacted();
    match serde_json::to_string(&shown) {
        Ok(json) => hash_string(&json),
        // Mappings with non-string keys cannot become JSON; hash the YAML instead.
        Err(_) => hash_string(&serde_yaml_ng::to_string(&shown).unwrap_or_default()),
    }
}
