//! NS-004: YAML parsing and validation.
//!
//! The config file is a YAML sequence of blocks. Each block is classified by
//! its marker key (`host_db`, `snapshot_commands`, `username`) and decoded
//! into a typed [`ConfigBlock`]. Every malformed block is reported, not just
//! the first, so a broken file can be fixed in one pass.

use super::error::{Error, Result, ShapeError, ShapeErrors};
use super::merge::value_kind;
use super::types::*;
use serde_yaml_ng::Value;
use std::path::Path;

const KINDS: [BlockKind; 3] = [BlockKind::Hosts, BlockKind::Commands, BlockKind::Credentials];

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse a snapshot config file from disk.
pub fn parse_config_file(path: &Path) -> Result<Vec<ConfigBlock>> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), bytes = content.len(), "loaded config");
    parse_config(&content)
}

/// Parse a snapshot config from a string.
pub fn parse_config(yaml: &str) -> Result<Vec<ConfigBlock>> {
    let doc: Value = serde_yaml_ng::from_str(yaml).map_err(|e| Error::ConfigParse(e.to_string()))?;

    let items = match doc {
        Value::Sequence(items) => items,
        Value::Null => Vec::new(),
        other => {
            return Err(Error::ConfigParse(format!(
                "top level must be a sequence of blocks, got {}",
                value_kind(&other)
            )))
        }
    };

    let mut blocks = Vec::with_capacity(items.len());
    let mut errors = Vec::new();

    for (index, item) in items.into_iter().enumerate() {
        match parse_block(item) {
            Ok(block) => blocks.push(block),
            Err(message) => errors.push(ShapeError {
                block: index,
                message,
            }),
        }
    }

    if errors.is_empty() {
        Ok(blocks)
    } else {
        Err(Error::ConfigShape(ShapeErrors(errors)))
    }
}

/// Classify one block by its marker key, then decode it.
fn parse_block(item: Value) -> std::result::Result<ConfigBlock, String> {
    let mapping = match &item {
        Value::Mapping(m) => m,
        other => return Err(format!("expected a mapping, got {}", value_kind(other))),
    };

    let found: Vec<BlockKind> = KINDS
        .into_iter()
        .filter(|kind| mapping.contains_key(kind.marker_key()))
        .collect();

    match found.as_slice() {
        [] => Err(
            "unrecognized block: expected one of `host_db`, `snapshot_commands`, `username`"
                .to_string(),
        ),
        [kind] => decode_block(*kind, item),
        many => {
            let keys: Vec<String> = many.iter().map(|k| format!("`{}`", k.marker_key())).collect();
            Err(format!("ambiguous block: has {}", keys.join(" and ")))
        }
    }
}

fn decode_block(kind: BlockKind, item: Value) -> std::result::Result<ConfigBlock, String> {
    let decoded = match kind {
        BlockKind::Hosts => serde_yaml_ng::from_value(item).map(ConfigBlock::Hosts),
        BlockKind::Commands => serde_yaml_ng::from_value(item).map(ConfigBlock::Commands),
        BlockKind::Credentials => serde_yaml_ng::from_value(item).map(ConfigBlock::Credentials),
    };
    decoded.map_err(|e| format!("{} block: {}", kind, e))
}

/// Validate parsed blocks. Returns a list of errors (empty = valid).
pub fn validate_blocks(blocks: &[ConfigBlock]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut host_count = 0usize;

    for (index, block) in blocks.iter().enumerate() {
        let n = index + 1;
        match block {
            ConfigBlock::Hosts(hosts) => {
                for (host, tags) in hosts.hosts() {
                    host_count += 1;
                    if host.trim().is_empty() {
                        errors.push(ValidationError {
                            message: format!("block {}: empty host name", n),
                        });
                    }
                    check_tags(n, tags.iter(), &mut errors);
                }
            }
            ConfigBlock::Commands(commands) => {
                check_tags(n, commands.tags.iter(), &mut errors);
                for (i, command) in commands.snapshot_commands.iter().enumerate() {
                    if command.trim().is_empty() {
                        errors.push(ValidationError {
                            message: format!("block {}: command {} is empty", n, i + 1),
                        });
                    }
                }
            }
            ConfigBlock::Credentials(creds) => {
                check_tags(n, creds.tags.iter(), &mut errors);
                if creds.username.trim().is_empty() {
                    errors.push(ValidationError {
                        message: format!("block {}: empty username", n),
                    });
                }
            }
        }
    }

    if host_count == 0 {
        errors.push(ValidationError {
            message: "config declares no hosts".to_string(),
        });
    }

    errors
}

fn check_tags<'a>(
    block: usize,
    tags: impl Iterator<Item = &'a String>,
    errors: &mut Vec<ValidationError>,
) {
    for tag in tags {
        if tag.trim().is_empty() {
            errors.push(ValidationError {
                message: format!("block {}: empty tag", block),
            });
        }
    }
}
