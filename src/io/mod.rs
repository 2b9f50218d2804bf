//! Serialization boundary for values and flags

pub mod serial;

pub use serial::ValueRecord;
