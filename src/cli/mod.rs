//! NS-018: CLI subcommands: init, validate, plan, run.

use crate::core::error::{Error, Result};
use crate::core::executor::{self, RunConfig};
use crate::core::types::{RunSummary, SnapshotPlan};
use crate::core::{parser, planner};
use crate::report::{self, fingerprint::fingerprint};
use crate::transport::{ConnectionSettings, Dispatcher, Transport};
use clap::Subcommand;
use std::path::{Path, PathBuf};

/// Default config file name.
pub const DEFAULT_CONFIG: &str = "snapshot-cfg.yaml";

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a template snapshot-cfg.yaml
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Parse and resolve the config without contacting devices
    Validate {
        /// Path to snapshot-cfg.yaml
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        file: PathBuf,
    },

    /// Show the resolved snapshot plan (passwords redacted)
    Plan {
        /// Path to snapshot-cfg.yaml
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        file: PathBuf,

        /// Show a single host
        #[arg(long)]
        host: Option<String>,

        /// Print the plan as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Collect command output from every host and write the report
    Run {
        /// Path to snapshot-cfg.yaml
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        file: PathBuf,

        /// Directory for the report and event log
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Snapshot a single host
        #[arg(long)]
        host: Option<String>,

        /// Contact hosts concurrently
        #[arg(long)]
        parallel: bool,

        /// Resolve the plan and show what would run, without connecting
        #[arg(long)]
        dry_run: bool,

        /// Do not append to events.jsonl
        #[arg(long)]
        no_event_log: bool,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Plan { file, host, yaml } => cmd_plan(&file, host.as_deref(), yaml),
        Commands::Run {
            file,
            output_dir,
            host,
            parallel,
            dry_run,
            no_event_log,
        } => cmd_run(
            &file,
            &RunConfig {
                output_dir: &output_dir,
                host_filter: host.as_deref(),
                parallel,
                dry_run,
                event_log: !no_event_log,
            },
            &Dispatcher,
        ),
    }
}

const TEMPLATE: &str = r#"# netsnap configuration: a sequence of host, command and credential blocks.
# A command or credential block applies to every host carrying all of its tags.

- host_db:
    - 10.0.0.1: [prod, core]
    - 10.0.0.2: [prod]

- tags: [prod]
  snapshot_commands:
    - show version
    - show interfaces status

- tags: [core]
  snapshot_commands:
    - show ip bgp summary

# The first matching credential block wins. A value of "to be defined"
# leaves the field open for a later block to fill.
- tags: []
  username: admin
  password: admin
  connection:
    transport: https
    timeout_secs: 30
"#;

fn cmd_init(path: &Path) -> Result<()> {
    let config_path = path.join(DEFAULT_CONFIG);
    if config_path.exists() {
        return Err(Error::AlreadyExists {
            path: config_path.display().to_string(),
        });
    }

    std::fs::write(&config_path, TEMPLATE).map_err(|source| Error::ConfigWrite {
        path: config_path.clone(),
        source,
    })?;

    println!("Created {}", config_path.display());
    Ok(())
}

/// Parse, validate and resolve a config file into a plan.
fn load_plan(file: &Path) -> Result<SnapshotPlan> {
    let blocks = parser::parse_config_file(file)?;
    let errors = parser::validate_blocks(&blocks);
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        return Err(Error::Validation(
            errors.into_iter().map(|e| e.message).collect(),
        ));
    }
    planner::build_plan(&blocks)
}

fn cmd_validate(file: &Path) -> Result<()> {
    let plan = load_plan(file)?;
    let targets = plan.targets()?;
    println!(
        "OK: {} ({} host(s), {} command(s))",
        file.display(),
        targets.len(),
        plan.command_count()
    );
    Ok(())
}

fn cmd_plan(file: &Path, host_filter: Option<&str>, yaml: bool) -> Result<()> {
    let plan = load_plan(file)?;
    if let Some(host) = host_filter {
        if plan.get(host).is_none() {
            return Err(Error::UnknownHost {
                host: host.to_string(),
            });
        }
    }

    if yaml {
        let mut shown = plan.redacted();
        if let Some(host) = host_filter {
            shown.hosts.retain(|h, _| h == host);
        }
        let text = serde_yaml_ng::to_string(&shown).map_err(|e| Error::ConfigParse(e.to_string()))?;
        print!("{}", text);
    } else {
        print_plan(&plan, host_filter);
    }
    Ok(())
}

/// Display a plan to stdout.
fn print_plan(plan: &SnapshotPlan, host_filter: Option<&str>) {
    println!(
        "Planning: {} host(s), {} command(s)",
        plan.len(),
        plan.command_count()
    );
    println!();

    for (host, entry) in &plan.hosts {
        if let Some(filter) = host_filter {
            if host != filter {
                continue;
            }
        }
        let tags: Vec<&str> = entry.tags.iter().map(String::as_str).collect();
        let via = ConnectionSettings::from_mapping(&entry.connection)
            .map(|s| s.kind.to_string())
            .unwrap_or_else(|e| format!("invalid ({})", e));
        match (entry.has_credentials(), entry.username.as_deref()) {
            (true, Some(user)) => println!("{} [{}] as {} via {}", host, tags.join(", "), user, via),
            _ => println!("{} [{}] (no credentials)", host, tags.join(", ")),
        }
        if entry.commands.is_empty() {
            println!("    (no commands)");
        }
        for command in &entry.commands {
            println!("  > {}", command);
        }
    }

    println!();
    let unresolved = plan.unresolved_hosts();
    if !unresolved.is_empty() {
        println!("Unresolved: {}", unresolved.join(", "));
    }
    let options = plan.unresolved_options();
    if !options.is_empty() {
        println!("Unresolved options: {}", options.join(", "));
    }
    println!("Fingerprint: {}", fingerprint(plan));
}

fn cmd_run<T>(file: &Path, cfg: &RunConfig, transport: &T) -> Result<()>
where
    T: Transport + ?Sized,
{
    let plan = load_plan(file)?;
    let summary = executor::run(&plan, cfg, transport)?;

    if cfg.dry_run {
        let targets = executor::select_targets(&plan, cfg.host_filter)?;
        let commands: usize = targets.iter().map(|t| t.commands.len()).sum();
        println!(
            "Dry run: {} host(s), {} command(s), no devices contacted.",
            targets.len(),
            commands
        );
        return Ok(());
    }

    let path = emit_report(cfg.output_dir, &summary, &fingerprint(&plan))?;

    for outcome in &summary.outcomes {
        match &outcome.result {
            Ok(outputs) => println!(
                "{}: {} command(s) ({:.1}s)",
                outcome.host,
                outputs.len(),
                outcome.duration.as_secs_f64()
            ),
            Err(e) => println!("{}: FAILED: {}", outcome.host, e),
        }
    }
    println!();
    println!("Report: {}", path.display());

    let failed = summary.failed_hosts();
    if !failed.is_empty() {
        return Err(Error::IncompleteRun { failed });
    }
    println!("Snapshot complete: {} host(s).", summary.succeeded());
    Ok(())
}

/// Write the report; if that fails, print it to stdout so the output is not lost.
fn emit_report(dir: &Path, summary: &RunSummary, fp: &str) -> Result<PathBuf> {
    report::write_report(dir, summary, fp).inspect_err(|e| {
        eprintln!("error: {}", e);
        print!("{}", report::render_report(summary, fp));
    })
}
