//! Tablesync CLI
//!
//! Command-line tools for exercising the index synchronization engine.
//!
//! # Commands
//!
//! - `simulate` - Build a tree, define a view and run the worker to quiescence
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use commands::simulate::{MaskArg, OutputFormat, SimulateArgs};
use tracing_subscriber::EnvFilter;

/// Tablesync command-line tools.
#[derive(Parser)]
#[command(name = "tablesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate index synchronization over an in-memory deployment
    Simulate {
        /// Number of projects under the root
        #[arg(long, default_value = "2")]
        projects: usize,

        /// Folders directly under each project
        #[arg(long, default_value = "1")]
        folders_per_project: usize,

        /// Files in each project and folder
        #[arg(long, default_value = "1")]
        files_per_folder: usize,

        /// Entity types the view includes (comma separated)
        #[arg(short, long, value_enum, value_delimiter = ',', default_value = "file")]
        mask: Vec<MaskArg>,

        /// Files to modify after the first build
        #[arg(long, default_value = "0")]
        updates: usize,

        /// Maximum containers per view
        #[arg(long)]
        max_containers: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), commands::CliError> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Simulate {
            projects,
            folders_per_project,
            files_per_folder,
            mask,
            updates,
            max_containers,
            format,
        } => {
            let args = SimulateArgs {
                projects,
                folders_per_project,
                files_per_folder,
                mask,
                updates,
                max_containers,
            };
            commands::simulate::run(&args, format)?;
        }
        Commands::Version => {
            println!("Tablesync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Tablesync Core v{}", tablesync_core::VERSION);
        }
    }

    Ok(())
}
