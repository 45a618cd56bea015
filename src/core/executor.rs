//! NS-006: Executor: runs a snapshot plan against its devices.
//!
//! resolve targets → filter → for each host: transport → pair outputs → events
//!
//! Hosts are independent: a device failure is recorded in that host's
//! outcome and the run moves on. With `parallel`, hosts run on the rayon
//! pool; outcomes still come back in plan order.

use super::error::{Error, Result};
use super::types::*;
use crate::report::eventlog::{self, EventLog, RunEvent};
use crate::transport::{DeviceError, Transport};
use rayon::prelude::*;
use std::path::Path;
use std::time::Instant;

/// Configuration for a snapshot run.
#[derive(Debug, Clone, Copy)]
pub struct RunConfig<'a> {
    pub output_dir: &'a Path,
    pub host_filter: Option<&'a str>,
    pub parallel: bool,
    pub dry_run: bool,
    pub event_log: bool,
}

/// Resolve the plan's targets, narrowed to one host when a filter is set.
pub fn select_targets(plan: &SnapshotPlan, host_filter: Option<&str>) -> Result<Vec<Target>> {
    let targets = plan.targets()?;
    match host_filter {
        None => Ok(targets),
        Some(host) => {
            let selected: Vec<Target> = targets.into_iter().filter(|t| t.host == host).collect();
            if selected.is_empty() {
                return Err(Error::UnknownHost {
                    host: host.to_string(),
                });
            }
            Ok(selected)
        }
    }
}

/// Execute the plan.
pub fn run<T>(plan: &SnapshotPlan, cfg: &RunConfig, transport: &T) -> Result<RunSummary>
where
    T: Transport + ?Sized,
{
    let start = Instant::now();
    let started_at = chrono::Local::now();
    let run_id = eventlog::generate_run_id();

    let targets = select_targets(plan, cfg.host_filter)?;

    if cfg.dry_run {
        tracing::info!(hosts = targets.len(), "dry run, no devices contacted");
        return Ok(RunSummary {
            run_id,
            started_at,
            duration: start.elapsed(),
            outcomes: Vec::new(),
        });
    }

    std::fs::create_dir_all(cfg.output_dir).map_err(|source| Error::OutputDir {
        path: cfg.output_dir.to_path_buf(),
        source,
    })?;
    let log = if cfg.event_log {
        Some(EventLog::open(cfg.output_dir)?)
    } else {
        None
    };
    let record = |event: RunEvent| {
        if let Some(ref log) = log {
            log.record(event);
        }
    };

    record(RunEvent::RunStarted {
        run_id: run_id.clone(),
        hosts: targets.len(),
        netsnap_version: env!("CARGO_PKG_VERSION").to_string(),
    });
    tracing::info!(run_id = %run_id, hosts = targets.len(), parallel = cfg.parallel, "run started");

    let collect = |target: &Target| {
        record(RunEvent::HostStarted {
            run_id: run_id.clone(),
            host: target.host.clone(),
            commands: target.commands.len(),
        });
        let outcome = collect_host(target, transport);
        match &outcome.result {
            Ok(outputs) => record(RunEvent::HostCompleted {
                run_id: run_id.clone(),
                host: outcome.host.clone(),
                commands: outputs.len(),
                duration_seconds: outcome.duration.as_secs_f64(),
            }),
            Err(e) => record(RunEvent::HostFailed {
                run_id: run_id.clone(),
                host: outcome.host.clone(),
                error: e.to_string(),
            }),
        }
        outcome
    };

    let outcomes: Vec<HostOutcome> = if cfg.parallel {
        targets.par_iter().map(collect).collect()
    } else {
        targets.iter().map(collect).collect()
    };

    let summary = RunSummary {
        run_id,
        started_at,
        duration: start.elapsed(),
        outcomes,
    };

    record(RunEvent::RunCompleted {
        run_id: summary.run_id.clone(),
        succeeded: summary.succeeded(),
        failed: summary.outcomes.len() - summary.succeeded(),
        total_seconds: summary.duration.as_secs_f64(),
    });
    tracing::info!(
        run_id = %summary.run_id,
        succeeded = summary.succeeded(),
        failed = summary.outcomes.len() - summary.succeeded(),
        "run completed"
    );

    Ok(summary)
}

/// Run one host's commands and pair each output with its command.
fn collect_host<T>(target: &Target, transport: &T) -> HostOutcome
where
    T: Transport + ?Sized,
{
    let start = Instant::now();
    let collected_at = chrono::Local::now();
    tracing::info!(host = %target.host, commands = target.commands.len(), "collecting");

    let result = transport
        .execute(target)
        .and_then(|outputs| pair_outputs(&target.commands, outputs));

    if let Err(ref e) = result {
        tracing::warn!(host = %target.host, error = %e, "host failed");
    }

    HostOutcome {
        host: target.host.clone(),
        collected_at,
        duration: start.elapsed(),
        result,
    }
}

fn pair_outputs(commands: &[String], outputs: Vec<String>) -> std::result::Result<Vec<CommandOutput>, DeviceError> {
    if outputs.len() != commands.len() {
        return Err(DeviceError::ResultCount {
            expected: commands.len(),
            got: outputs.len(),
        });
    }
    Ok(commands
        .iter()
        .zip(outputs)
        .map(|(command, output)| CommandOutput {
            command: command.clone(),
            output,
        })
        .collect())
}
