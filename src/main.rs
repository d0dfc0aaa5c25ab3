// src/main.rs
use std::path::PathBuf;
use std::process::exit;
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, Level};

use dpflow::app::{App, Command};
use dpflow::tasks::TrainTaskInput;

#[derive(Parser)]
#[command(name = "dpflow")]
#[command(about = "Submit a sliced training workflow with a fan-in summary stage")]
#[command(args_conflicts_with_subcommands = true)]
#[command(subcommand_negates_reqs = true)]
struct Args {
    #[command(subcommand)]
    command: Option<Cli>,

    #[arg(required = true, help = "Workflow configuration file (JSON)")]
    config: Option<PathBuf>,

    #[arg(long, help = "Write the workflow manifest instead of submitting it")]
    dry_run: bool,

    #[arg(long, requires = "dry_run", help = "Manifest output file for --dry-run (default: stdout)")]
    manifest_out: Option<PathBuf>,

    #[arg(long, help = "Upload local artifacts into this directory instead of the object store")]
    local_store: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true, help = "Settings file")]
    settings: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Cli {
    /// Train one dataset (runs inside the training image)
    RunTrain {
        #[arg(long, help = "Dataset display name")]
        dataset_name: String,

        #[arg(long, help = "Training configuration template")]
        script: PathBuf,

        #[arg(long, num_args = 1.., required = true, help = "Training data paths")]
        training_data: Vec<PathBuf>,

        #[arg(long, num_args = 1.., required = true, help = "Validation data paths")]
        validation_data: Vec<PathBuf>,

        #[arg(long, default_value = ".", help = "Working directory of this slice")]
        workdir: PathBuf,

        #[arg(long, help = "External training command; a stub trainer is used when omitted")]
        trainer_command: Option<String>,
    },

    /// Summarize collected training outputs (runs inside the summary image)
    Summary {
        #[arg(long, num_args = 0.., help = "Dataset names in slice order")]
        names: Vec<String>,

        #[arg(long, num_args = 0.., help = "Training logs in slice order")]
        logs: Vec<PathBuf>,

        #[arg(long, num_args = 0.., help = "Learning curves in slice order")]
        lcurves: Vec<PathBuf>,
    },

    /// Write the default settings file
    Init {
        #[arg(short, long, help = "Force overwrite existing settings")]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let command = match args.command {
        Some(Cli::RunTrain { dataset_name, script, training_data, validation_data, workdir, trainer_command }) => {
            Command::RunTrain {
                input: TrainTaskInput {
                    dataset_name,
                    script,
                    training_data,
                    validation_data,
                    work_dir: workdir,
                },
                trainer_command,
            }
        },
        Some(Cli::Summary { names, logs, lcurves }) => {
            Command::Summary { names, logs, lcurves }
        },
        Some(Cli::Init { force }) => {
            Command::Init { force }
        },
        None => match args.config {
            Some(config) => Command::Submit {
                config,
                dry_run: args.dry_run,
                manifest_out: args.manifest_out,
                local_store: args.local_store,
            },
            None => {
                error!("No workflow configuration specified");
                eprintln!("error: no workflow configuration specified. Use --help for usage.");
                exit(2);
            }
        },
    };

    let app = match App::new(args.settings) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to load settings: {}", e);
            eprintln!("error: {}", e);
            exit(1);
        }
    };

    if let Err(e) = app.run_command(command).await {
        error!("Command execution failed: {}", e);
        eprintln!("error: {}", e);
        exit(1);
    }

    Ok(())
}
