//! Integration tests for sonde-peek.

pub mod connection_test;
pub mod query_test;
