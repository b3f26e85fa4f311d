//! Job input resolution and batch submission for a GenePattern-style analysis server
//!
//! A submitted job names a module by LSID and gives raw values for its parameters. The values are
//! checked against the module's declared cardinality and range, resolved to server files or
//! external URLs, downloaded when needed, and assembled into the form the module's command line
//! expects. Batch parameters expand one submission into several jobs.

/// Errors reported to the submitter, one per failed check
pub mod error;
/// Server configuration
pub mod config;
/// Legacy and current list-handling rules
pub mod policy;
/// Module identifiers
pub mod lsid;
/// Formal parameters and submitted values
pub mod param;
/// Mapping raw values to files and URLs
pub mod resolve;
/// Interfaces to the rest of the server
pub mod collab;
/// Validation and assembly of the values of one job
pub mod assemble;
/// Batch expansion and submission
pub mod batch;
/// Installed modules
pub mod module;
/// Reading job requests
pub mod request;
/// Upload catalog and job table
pub mod db;
/// Job scripts and the compute queue
pub mod dispatch;
