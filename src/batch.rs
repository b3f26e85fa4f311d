//! Expansion of one submission into many jobs, one per matching batch input file

/// Enumerate the files of a batch directory
pub mod expand;
/// Pair up the files of several batch parameters into jobs
pub mod generator;
/// Submit single jobs and batches
pub mod submit;
