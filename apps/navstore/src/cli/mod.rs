//! # navstore CLI Module
//!
//! ## Available Commands
//!
//! - `check` - Validate the schema and seed data, print counts
//! - `show` - Print every record of an entity set as JSON
//! - `run` - Execute a JSON script against the seeded store

mod commands;

use clap::{Parser, Subcommand};
use navstore::{AppError, DEFAULT_BASE_URI};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// navstore - schema-driven in-memory entity store
#[derive(Parser, Debug)]
#[command(name = "navstore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the TOML schema
    #[arg(short = 'S', long, global = true, default_value = "navstore.toml")]
    pub schema: PathBuf,

    /// Path to a JSON seed file
    #[arg(short = 'D', long, global = true)]
    pub data: Option<PathBuf>,

    /// Base URI stripped from binding links
    #[arg(long, global = true, default_value = DEFAULT_BASE_URI)]
    pub base_uri: String,

    /// Output compact JSON, one document per line
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate schema and seed data
    Check,

    /// Print the records of an entity set
    Show {
        /// Entity set name
        set: String,
    },

    /// Execute a script of store operations
    Run {
        /// Path to the JSON script
        script: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), AppError> {
    let options = Options {
        schema: &cli.schema,
        data: cli.data.as_deref(),
        base_uri: &cli.base_uri,
        json_mode: cli.json_mode,
    };

    match &cli.command {
        Some(Commands::Show { set }) => cmd_show(&options, set),
        Some(Commands::Run { script }) => cmd_run(&options, script),
        // No subcommand - check by default
        Some(Commands::Check) | None => cmd_check(&options),
    }
}
