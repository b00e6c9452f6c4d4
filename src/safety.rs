//! Read-only guard for generated SQL.
//!
//! Uses sqlparser-rs with the PostgreSQL dialect to confirm that a rendered
//! statement is exactly one plain `SELECT` before it reaches the server.

use sqlparser::ast::{SetExpr, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::error::{PeekError, Result};

/// Fails unless `sql` parses as a single read-only SELECT.
pub fn ensure_read_only_select(sql: &str) -> Result<()> {
    let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)
        .map_err(|e| PeekError::query(format!("SQL parse error: {e}")))?;

    let statement = match statements.as_slice() {
        [statement] => statement,
        [] => return Err(PeekError::query("Empty SQL statement")),
        _ => {
            return Err(PeekError::query(format!(
                "Expected a single statement, found {}",
                statements.len()
            )))
        }
    };

    let Statement::Query(query) = statement else {
        return Err(PeekError::query(format!(
            "Refusing to run a non-query statement: {sql}"
        )));
    };

    if query.with.is_some() {
        return Err(PeekError::query("Common table expressions are not allowed"));
    }
    if !query.locks.is_empty() {
        return Err(PeekError::query("Locking clauses are not allowed"));
    }

    match query.body.as_ref() {
        SetExpr::Select(select) if select.into.is_none() => Ok(()),
        SetExpr::Select(_) => Err(PeekError::query("SELECT ... INTO is not allowed")),
        _ => Err(PeekError::query("Only a plain SELECT is allowed")),
    }
}
