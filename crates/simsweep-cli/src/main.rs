mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use simsweep_engine::execution::default_cores;
use simsweep_engine::runner::DEFAULT_SIMULATOR;
use simsweep_engine::SweepOptions;

#[derive(Parser)]
#[command(
    name = "simsweep",
    version,
    about = "Parallel executor for simulation parameter sweeps"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a sweep across a pool of local workers
    Run {
        /// Path to the sweep manifest
        manifest: PathBuf,

        /// Number of worker processes
        #[arg(short = 'c', long, default_value_t = default_cores())]
        cores: u32,

        /// Suppress per-run progress
        #[arg(short, long, conflicts_with = "verbose")]
        quiet: bool,

        /// Report every run start and finish
        #[arg(short, long)]
        verbose: bool,

        /// Build the shared run archive alongside the sweep
        #[arg(short = 'b', long, visible_alias = "bp")]
        bigplanet: bool,

        /// Operator notification address (surfaced to the notifier seam)
        #[arg(short = 'm', long = "mail")]
        mail: Option<String>,

        /// Simulator binary name or path
        #[arg(long, default_value = DEFAULT_SIMULATOR)]
        simulator: String,

        /// Wipe and re-run even if the checkpoint reports completion
        #[arg(long)]
        force: bool,
    },
    /// Report checkpoint progress for a sweep
    Status {
        /// Path to the sweep manifest
        manifest: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            manifest,
            cores,
            quiet,
            verbose,
            bigplanet,
            mail,
            simulator,
            force,
        } => {
            let level = if quiet {
                "warn"
            } else if verbose {
                "debug"
            } else {
                cli.log_level.as_str()
            };
            logging::init(level);

            let options = SweepOptions {
                cores,
                verbose,
                bigplanet,
                force,
                simulator,
                notify: mail,
                work_dir: None,
            };
            commands::run::execute(&manifest, options).await
        }
        Commands::Status { manifest } => {
            logging::init(&cli.log_level);
            commands::status::execute(&manifest)
        }
    }
}
