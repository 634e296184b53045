//! Progress and machine-readable scan output.

pub mod scanlog;
