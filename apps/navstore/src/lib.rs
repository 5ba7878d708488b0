//! # navstore
//!
//! File-facing layer of the navstore entity store: schema and seed loading,
//! JSON payload conversion and script execution on top of `navstore-core`.

pub mod error;
pub mod loader;
pub mod payload;
pub mod session;

pub use error::AppError;
pub use session::{DEFAULT_BASE_URI, Seed, Session, Step};
