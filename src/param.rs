//! Formal parameter declarations and the actual values submitted for them

/// Parameter declarations as loaded from a module manifest
pub mod spec;
/// `numValues` cardinality constraints
pub mod num_values;
/// Numeric `range` constraints
pub mod range;
/// How lists of values reach the command line
pub mod list_mode;
/// Submitted values and job input sets
pub mod value;
