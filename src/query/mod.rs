//! Query construction and execution for sonde-peek.
//!
//! Keeps building a statement and running it as two separate steps.

pub mod builder;

pub use builder::{
    quote_ident, SelectStatement, TableQuery, DEFAULT_COLUMNS, DEFAULT_ROW_LIMIT, DEFAULT_TABLE,
};
