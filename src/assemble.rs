//! Turn the values of one parameter into what is stored with the job
//!
//! Validates cardinality and ranges, resolves every value, downloads external files, and writes
//! a file list when the list mode asks for one.

/// Per-parameter orchestration
pub mod helper;
/// Downloads of external files into upload directories and the shared cache
pub mod materialize;
/// File list and group file format
pub mod filelist;
