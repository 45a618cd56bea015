//! netsnap CLI: snapshot network device state from a tag-based config.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "netsnap",
    version,
    about = "Tag-driven command snapshots for network devices"
)]
struct Cli {
    /// Log progress to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: netsnap::cli::Commands,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = netsnap::logging::init(cli.verbose) {
        eprintln!("warning: logging disabled: {}", e);
    }
    if let Err(e) = netsnap::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
