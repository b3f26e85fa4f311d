//! Classify raw input values and map them onto file handles
//!
//! Resolution has no side effects: nothing is downloaded or created here, so a value can be
//! resolved any number of times. Materialization is a separate step, see [crate::assemble].

/// Normalized references to server files and external URLs
pub mod handle;
/// Where uploads, cached downloads and server data files live, and their relative URIs
pub mod layout;
/// Portable placeholder for the server's own base URL
pub mod href;
/// The result of classifying one value
pub mod record;
/// Classification rules
pub mod resolver;
