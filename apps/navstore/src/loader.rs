//! # File Loading
//!
//! Reads the schema (TOML), seed data and scripts (JSON) from disk.

use crate::error::AppError;
use crate::session::{Seed, Step};
use navstore_core::{Schema, Store};
use std::path::{Path, PathBuf};
use tracing::info;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum schema file size (4 MB).
const MAX_SCHEMA_FILE_SIZE: u64 = 4 * 1024 * 1024;

/// Maximum seed or script file size (100 MB).
const MAX_DATA_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Resolve a path to an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, AppError> {
    let canonical = path.canonicalize().map_err(|e| AppError::io(path, e))?;

    if !canonical.is_file() {
        return Err(AppError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
        ));
    }

    Ok(canonical)
}

/// Read a file after checking its path and size.
fn read_limited(path: &Path, max_size: u64) -> Result<String, AppError> {
    let validated = validate_file_path(path)?;
    let metadata = std::fs::metadata(&validated).map_err(|e| AppError::io(path, e))?;

    if metadata.len() > max_size {
        return Err(AppError::io(
            path,
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "file size {} bytes exceeds maximum allowed {} bytes",
                    metadata.len(),
                    max_size
                ),
            ),
        ));
    }

    std::fs::read_to_string(&validated).map_err(|e| AppError::io(path, e))
}

// =============================================================================
// LOADERS
// =============================================================================

/// Parse and validate a TOML schema.
pub fn parse_schema(text: &str) -> Result<Schema, AppError> {
    let schema: Schema = toml::from_str(text)?;
    schema.validate()?;
    Ok(schema)
}

/// Load and validate a schema file.
pub fn load_schema(path: &Path) -> Result<Schema, AppError> {
    let schema = parse_schema(&read_limited(path, MAX_SCHEMA_FILE_SIZE)?)?;
    info!(
        path = %path.display(),
        entity_types = schema.entity_types.len(),
        entity_sets = schema.entity_sets.len(),
        "schema loaded"
    );
    Ok(schema)
}

/// Load a seed file.
pub fn load_seed(path: &Path) -> Result<Seed, AppError> {
    Ok(serde_json::from_str(&read_limited(path, MAX_DATA_FILE_SIZE)?)?)
}

/// Load a script file: a JSON array of steps.
pub fn load_script(path: &Path) -> Result<Vec<Step>, AppError> {
    Ok(serde_json::from_str(&read_limited(path, MAX_DATA_FILE_SIZE)?)?)
}

/// Build an empty store for the schema file.
pub fn load_store(schema_path: &Path) -> Result<Store, AppError> {
    Ok(Store::new(load_schema(schema_path)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"
[[entity_types]]
name = "ETThing"
keys = ["Id"]
properties = [
    { name = "Id", type = { primitive = "Int32" }, nullable = false },
    { name = "Label", type = { primitive = "String" } },
]

[[entity_sets]]
name = "Things"
entity_type = "ETThing"
"#;

    #[test]
    fn parses_toml_schema() {
        let schema = parse_schema(SCHEMA).expect("schema");
        let entity_type = schema.entity_type("ETThing").expect("type");
        assert_eq!(entity_type.keys, vec!["Id".to_string()]);
        assert!(entity_type.property("Label").expect("label").nullable);
        assert!(!entity_type.property("Id").expect("id").nullable);
    }

    #[test]
    fn dangling_reference_fails_validation() {
        let broken = SCHEMA.replace("entity_type = \"ETThing\"", "entity_type = \"ETMissing\"");
        assert!(matches!(parse_schema(&broken), Err(AppError::Store(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = load_schema(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(AppError::Io { .. })));
    }
}
