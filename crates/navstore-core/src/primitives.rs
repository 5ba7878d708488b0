//! # Store Primitives
//!
//! Hardcoded constants of the navstore CORE. They are part of the store's
//! observable behavior (key allocation order) and are immutable at runtime.

/// First value probed when allocating an integer key.
///
/// Integer keys are allocated as the lowest unused value `>= FIRST_INTEGER_KEY`,
/// so keys freed by a delete are handed out again.
pub const FIRST_INTEGER_KEY: i64 = 1;

/// First value probed when allocating a string key.
///
/// If taken, the search restarts from "0" and counts upward:
/// `"1", "0", "1", "2", "3", ...`
pub const FIRST_STRING_KEY_PROBE: &str = "1";

/// Counter the string-key search restarts from after the first probe.
pub const STRING_KEY_RESTART: u64 = 0;

/// First arena identifier handed out by a fresh store.
pub const FIRST_RECORD_ID: u64 = 1;
