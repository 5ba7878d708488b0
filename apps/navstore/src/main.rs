//! # navstore
//!
//! Command-line front end of the navstore entity store.
//!
//! ## Usage
//!
//! ```bash
//! # Validate a schema and seed file
//! navstore --schema catalog.toml --data seed.json check
//!
//! # Print an entity set
//! navstore --schema catalog.toml --data seed.json show Products
//!
//! # Run a script of operations
//! navstore --schema catalog.toml --data seed.json run script.json
//! ```

mod cli;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // NAVSTORE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("NAVSTORE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = EnvFilter::try_from_env("NAVSTORE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| "navstore=info,navstore_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        eprintln!("navstore v{}", env!("CARGO_PKG_VERSION"));
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!(status = e.status(), "Error: {}", e);
        std::process::exit(1);
    }
}
