//! The one-shot pipeline: validate config, connect, query, report, disconnect.

use std::io::Write;

use tracing::{info, warn};

use crate::config::Settings;
use crate::db::{Connector, Session};
use crate::error::Result;
use crate::query::{SelectStatement, TableQuery, DEFAULT_COLUMNS, DEFAULT_ROW_LIMIT, DEFAULT_TABLE};
use crate::report::Reporter;

/// What to read and how to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Table inside the configured schema.
    pub table: String,
    /// Projected columns; the first one is the sort key.
    pub columns: Vec<String>,
    /// Row cap.
    pub limit: u64,
    /// Print the SQL instead of connecting.
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            columns: DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect(),
            limit: DEFAULT_ROW_LIMIT,
            dry_run: false,
        }
    }
}

impl RunOptions {
    /// Describes the read against `schema` without running it.
    pub fn table_query(&self, schema: &str) -> TableQuery {
        let mut query = TableQuery::new(schema, &self.table)
            .select(self.columns.iter().cloned())
            .limit(self.limit);
        if let Some(sort_key) = self.columns.first() {
            query = query.order_by(sort_key.clone());
        }
        query
    }
}

/// Runs the whole pipeline once.
///
/// Configuration and query description are validated before any connection
/// attempt. Once connected, the session is released exactly once whether
/// the query succeeds or not.
pub async fn run<W: Write>(
    settings: &Settings,
    options: &RunOptions,
    connector: &dyn Connector,
    reporter: &Reporter,
    out: &mut W,
) -> Result<()> {
    let params = settings.validate()?;
    let statement = options.table_query(&params.schema).build()?;

    if options.dry_run {
        writeln!(out, "{}", statement.sql())?;
        return Ok(());
    }

    let mut session = Session::open(connector, &params).await?;
    let outcome = query_and_report(&mut session, &statement, &options.table, reporter, out).await;
    let released = session.release().await;

    match (outcome, released) {
        (Err(e), Err(close_err)) => {
            warn!("Ignoring disconnect failure after error: {close_err}");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), released) => released,
    }
}

async fn query_and_report<W: Write>(
    session: &mut Session,
    statement: &SelectStatement,
    table: &str,
    reporter: &Reporter,
    out: &mut W,
) -> Result<()> {
    let result = statement.execute(session.client()?).await?;
    info!(
        "Successfully retrieved {} rows from {table}",
        result.row_count()
    );
    reporter.report(out, table, &result)
}
