//! Job submission requests
//!
//! A request is JSON, checked against an embedded JSON schema before it is deserialised.

/// Read, validate and deserialise a request
pub mod message;
/// The embedded request schema
pub mod schema;
