//! Uploads and dispatched jobs are stored in a SQLite database

/// Connect to a SQLite database
pub mod open;
/// The upload catalog
pub mod upload;
pub mod job;
