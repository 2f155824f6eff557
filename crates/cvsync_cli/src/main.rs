//! CVSync CLI
//!
//! Command-line tools for inspecting CVS working copy metadata.
//!
//! # Commands
//!
//! - `inspect` - Display per-folder sync metadata
//! - `status` - List local changes against the recorded base revisions
//! - `verify` - Check that every metadata record decodes

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// CVSync working copy tools.
#[derive(Parser)]
#[command(name = "cvsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the working copy root
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display per-folder sync metadata
    Inspect {
        /// Include phantom records of deleted folders
        #[arg(long)]
        phantoms: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List local changes against the recorded base revisions
    Status {
        /// Subfolder to report on, relative to the working copy root
        #[arg(short, long, default_value = "")]
        folder: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check that every metadata record decodes
    Verify {
        /// Include phantom records of deleted folders
        #[arg(long)]
        phantoms: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { phantoms, format } => {
            let path = cli.path.ok_or("Working copy path required for inspect")?;
            commands::inspect::run(&path, phantoms, &format)?;
        }
        Commands::Status { folder, format } => {
            let path = cli.path.ok_or("Working copy path required for status")?;
            commands::status::run(&path, &folder, &format)?;
        }
        Commands::Verify { phantoms } => {
            let path = cli.path.ok_or("Working copy path required for verify")?;
            commands::verify::run(&path, phantoms)?;
        }
        Commands::Version => {
            println!("CVSync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("CVSync Core v{}", cvsync_core::VERSION);
        }
    }

    Ok(())
}
