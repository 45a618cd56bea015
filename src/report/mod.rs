//! NS-014: Snapshot report: text rendering, atomic write, run events.
//!
//! The report groups output by host in plan order. Each host gets a
//! `#`-ruled header; each command a `~-`-ruled command/result section.
//! Hosts that failed show their error instead of results.

pub mod eventlog;
pub mod fingerprint;

use crate::core::error::{Error, Result};
use crate::core::types::{HostOutcome, RunSummary};
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};

const HOST_RULE: &str = "########################################";
const COMMAND_RULE: &str = "~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-";

/// Timestamp format inside the report body.
const BODY_TS: &str = "%Y-%m-%d:%H:%M:%S%.6f";

/// Timestamp format inside the report file name (no colons).
const FILE_TS: &str = "%Y%m%d-%H%M%S%.6f";

/// Report file name for a run, e.g.
/// `snapshot-20260114-093012.000000-r-000000000001.txt`.
///
/// The run ID keeps two runs started in the same microsecond apart.
pub fn report_file_name(summary: &RunSummary) -> String {
    format!(
        "snapshot-{}-{}.txt",
        summary.started_at.format(FILE_TS),
        summary.run_id
    )
}

fn render_host(out: &mut String, outcome: &HostOutcome) -> std::fmt::Result {
    writeln!(out, "{}", HOST_RULE)?;
    writeln!(out, "### SNAPSHOT: {}", outcome.host)?;
    writeln!(out, "### TIMESTAMP: {}", outcome.collected_at.format(BODY_TS))?;
    writeln!(out, "{}", HOST_RULE)?;

    match &outcome.result {
        Ok(outputs) => {
            for entry in outputs {
                writeln!(out, "{}", COMMAND_RULE)?;
                writeln!(out, "### COMMAND: {}", entry.command)?;
                writeln!(out, "{}", COMMAND_RULE)?;
                writeln!(out, "### RESULT:")?;
                writeln!(out, "{}", COMMAND_RULE)?;
                writeln!(out, "{}", entry.output)?;
            }
        }
        Err(e) => {
            writeln!(out, "### ERROR: {}", e)?;
        }
    }
    Ok(())
}

/// Render the full text report for a run.
pub fn render_report(summary: &RunSummary, fingerprint: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "### RUN: {}", summary.run_id);
    let _ = writeln!(out, "### PLAN: {}", fingerprint);
    let _ = writeln!(
        out,
        "### HOSTS: {} ok, {} failed",
        summary.succeeded(),
        summary.outcomes.len() - summary.succeeded()
    );
    for outcome in &summary.outcomes {
        // Writing into a String cannot fail.
        let _ = render_host(&mut out, outcome);
    }
    out
}

/// Write the rendered report into `dir` atomically.
///
/// The body goes to a temp file which is then hard-linked to the final
/// name. Linking never replaces an existing file, so an existing report
/// fails with `ReportWrite` (`ErrorKind::AlreadyExists`) and stays intact.
pub fn write_report(dir: &Path, summary: &RunSummary, fingerprint: &str) -> Result<PathBuf> {
    let name = report_file_name(summary);
    let path = dir.join(&name);
    let tmp = dir.join(format!(".{}.tmp", name));
    let body = render_report(summary, fingerprint);

    let write = || -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp)?;
        let linked = file
            .write_all(body.as_bytes())
            .and_then(|()| file.sync_all())
            .and_then(|()| std::fs::hard_link(&tmp, &path));
        let _ = std::fs::remove_file(&tmp);
        linked
    };

    write().map_err(|source| Error::ReportWrite {
        path: path.clone(),
        source,
    })?;

    tracing::info!(path = %path.display(), bytes = body.len(), "report written");
    Ok(path)
}
