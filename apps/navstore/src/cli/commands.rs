//! # CLI Command Implementations

use navstore::loader::{load_script, load_seed, load_store};
use navstore::{AppError, Session};
use std::path::Path;

/// Settings shared by every command.
#[derive(Debug)]
pub struct Options<'a> {
    pub schema: &'a Path,
    pub data: Option<&'a Path>,
    pub base_uri: &'a str,
    pub json_mode: bool,
}

/// Load the schema and apply the seed file, if any.
fn open_session(options: &Options<'_>) -> Result<Session, AppError> {
    let mut session = Session::new(load_store(options.schema)?, options.base_uri);

    if let Some(data) = options.data {
        session.seed(&load_seed(data)?)?;
    }

    Ok(session)
}

fn print_json(value: &serde_json::Value, json_mode: bool) {
    let text = if json_mode {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    println!("{}", text.unwrap_or_default());
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Validate schema and seed data, print per-set record counts.
pub fn cmd_check(options: &Options<'_>) -> Result<(), AppError> {
    let session = open_session(options)?;
    let store = session.store();
    let schema = store.schema();

    let counts: Vec<(&str, usize)> = schema
        .entity_sets
        .iter()
        .map(|set| {
            let len = store.read_all(&set.name).map_or(0, |c| c.len());
            (set.name.as_str(), len)
        })
        .collect();

    if options.json_mode {
        let sets: serde_json::Map<String, serde_json::Value> = counts
            .iter()
            .map(|(name, len)| ((*name).to_string(), serde_json::json!(len)))
            .collect();
        let output = serde_json::json!({
            "schema": options.schema.to_string_lossy(),
            "entity_types": schema.entity_types.len(),
            "complex_types": schema.complex_types.len(),
            "records": store.record_count(),
            "sets": sets
        });
        print_json(&output, true);
        return Ok(());
    }

    println!("navstore Schema Check");
    println!("=====================");
    println!("Schema:        {}", options.schema.display());
    println!("Entity types:  {}", schema.entity_types.len());
    println!("Complex types: {}", schema.complex_types.len());
    println!("Records:       {}", store.record_count());
    println!();
    for (name, len) in counts {
        println!("  {:<24} {}", name, len);
    }

    Ok(())
}

// =============================================================================
// SHOW COMMAND
// =============================================================================

/// Print every record of an entity set.
pub fn cmd_show(options: &Options<'_>, set: &str) -> Result<(), AppError> {
    let session = open_session(options)?;
    print_json(&session.render_all(set)?, options.json_mode);
    Ok(())
}

// =============================================================================
// RUN COMMAND
// =============================================================================

/// Execute a script; stops at the first failing step.
pub fn cmd_run(options: &Options<'_>, script: &Path) -> Result<(), AppError> {
    let mut session = open_session(options)?;
    let steps = load_script(script)?;
    tracing::info!("Running {} steps from {:?}", steps.len(), script);

    for (index, step) in steps.iter().enumerate() {
        let result = session.execute(step).inspect_err(|e| {
            tracing::error!(step = index, op = step.name(), status = e.status(), "step failed");
        })?;
        print_json(&result, options.json_mode);
    }

    Ok(())
}
