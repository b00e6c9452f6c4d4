//! Lazy table query builder.
//!
//! A [`TableQuery`] describes what to read (schema-qualified table,
//! projection, sort key, row cap) without touching the database.
//! [`TableQuery::build`] translates it into a [`SelectStatement`], and
//! [`SelectStatement::execute`] is the only place rows are pulled.

use std::time::Instant;

use tracing::{debug, info};

use crate::db::{DatabaseClient, QueryResult};
use crate::error::{PeekError, Result};
use crate::safety::ensure_read_only_select;

/// Table read by default.
pub const DEFAULT_TABLE: &str = "lake_ysi_6920";

/// Default projection: ordering key followed by two measurements.
pub const DEFAULT_COLUMNS: [&str; 3] = ["datetime", "temperature", "dissolved_oxygen"];

/// Default cap on materialized rows.
pub const DEFAULT_ROW_LIMIT: u64 = 100;

/// A reference to a remote table plus the operations to apply to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    schema: String,
    table: String,
    columns: Vec<String>,
    order_by: Option<String>,
    limit: u64,
}

impl TableQuery {
    /// References `schema.table`. Nothing is sent to the server.
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            columns: Vec::new(),
            order_by: None,
            limit: DEFAULT_ROW_LIMIT,
        }
    }

    /// Projects the result to exactly these columns, in this order.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sorts ascending by the given column.
    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }

    /// Keeps only the first `n` rows of the sorted, projected result.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = n;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// `schema.table` with both parts quoted.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }

    /// Validates the description and renders it as one SQL statement.
    pub fn build(&self) -> Result<SelectStatement> {
        self.validate()?;

        let projection = self
            .columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!("SELECT {projection} FROM {}", self.qualified_name());
        if let Some(order_by) = &self.order_by {
            sql.push_str(&format!(" ORDER BY {} ASC", quote_ident(order_by)));
        }
        sql.push_str(&format!(" LIMIT {}", self.limit));

        ensure_read_only_select(&sql)?;

        Ok(SelectStatement {
            sql,
            columns: self.columns.clone(),
        })
    }

    /// Builds and executes in one step.
    pub async fn collect(&self, client: &mut dyn DatabaseClient) -> Result<QueryResult> {
        self.build()?.execute(client).await
    }

    fn validate(&self) -> Result<()> {
        if self.schema.trim().is_empty() {
            return Err(PeekError::query("Schema name must not be empty"));
        }
        if self.table.trim().is_empty() {
            return Err(PeekError::query("Table name must not be empty"));
        }
        if self.columns.is_empty() {
            return Err(PeekError::query("At least one column must be selected"));
        }
        if let Some(column) = self.columns.iter().find(|c| c.trim().is_empty()) {
            return Err(PeekError::query(format!(
                "Invalid empty column name in projection: {column:?}"
            )));
        }
        for (i, column) in self.columns.iter().enumerate() {
            if self.columns[..i].contains(column) {
                return Err(PeekError::query(format!(
                    "Column '{column}' is selected more than once"
                )));
            }
        }
        if let Some(order_by) = &self.order_by {
            if !self.columns.contains(order_by) {
                return Err(PeekError::query(format!(
                    "Sort column '{order_by}' is not among the selected columns"
                )));
            }
        }
        if self.limit == 0 {
            return Err(PeekError::query("Row limit must be at least 1"));
        }
        Ok(())
    }
}

/// A rendered statement ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectStatement {
    sql: String,
    columns: Vec<String>,
}

impl SelectStatement {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Runs the statement and materializes the result.
    ///
    /// The result must carry exactly the projected columns, in order.
    pub async fn execute(&self, client: &mut dyn DatabaseClient) -> Result<QueryResult> {
        debug!("Executing: {}", self.sql);
        let start = Instant::now();

        let result = client.fetch(&self.sql).await?;

        let returned = result.column_names();
        if returned != self.columns.iter().map(String::as_str).collect::<Vec<_>>() {
            return Err(PeekError::query(format!(
                "Expected columns [{}], server returned [{}]",
                self.columns.join(", "),
                returned.join(", ")
            )));
        }

        info!(
            "Query returned {} rows in {:?}",
            result.row_count(),
            start.elapsed()
        );
        Ok(result)
    }
}

/// Quotes a PostgreSQL identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
