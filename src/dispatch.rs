//! Handing prepared jobs to the compute queue

/// Builds the module command line from the assembled values
pub mod command;
/// Submits job scripts to LSF with bsub
pub mod lsf;
