//! NS-007: Error taxonomy.
//!
//! Config load, shape and merge errors are fatal before a plan exists.
//! Unresolved credentials are fatal before any device I/O. Device failures
//! are per-host and live in each `HostOutcome`; the run only reports them
//! in aggregate through `IncompleteRun`.

use super::merge::MergeError;
use std::fmt;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot read {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    ConfigParse(String),

    #[error("invalid config: {0}")]
    ConfigShape(ShapeErrors),

    #[error("{} validation error(s)", .0.len())]
    Validation(Vec<String>),

    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),

    #[error("no credentials resolved for host(s): {}", .hosts.join(", "))]
    UnresolvedHosts { hosts: Vec<String> },

    #[error("connection option(s) still 'to be defined': {}", .options.join(", "))]
    UnresolvedOptions { options: Vec<String> },

    #[error("host '{host}' is not in the plan")]
    UnknownHost { host: String },

    #[error("snapshot incomplete, {} host(s) failed: {}", .failed.len(), .failed.join(", "))]
    IncompleteRun { failed: Vec<String> },

    #[error("cannot write report {}: {source}", .path.display())]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot create output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot open event log {}: {source}", .path.display())]
    EventLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", .path.display())]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} already exists")]
    AlreadyExists { path: String },
}

/// A problem with one config block, by position in the source sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeError {
    /// Zero-based block index
    pub block: usize,
    pub message: String,
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block {}: {}", self.block + 1, self.message)
    }
}

/// Every shape problem found in one parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeErrors(pub Vec<ShapeError>);

impl ShapeErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ShapeError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ShapeErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("; "))
    }
}
