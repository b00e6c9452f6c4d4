//! PostgreSQL database client implementation.
//!
//! Provides `PostgresConnector` and the `PostgresClient` it hands out, built
//! on a single sqlx `PgConnection`.

use crate::config::ConnectionParams;
use crate::db::{ColumnInfo, Connector, DatabaseClient, QueryResult, Row, Value};
use crate::error::{PeekError, Result};
use async_trait::async_trait;
use chrono::NaiveTime;
use rust_decimal::Decimal;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow, PgValueFormat};
use sqlx::types::Uuid;
use sqlx::{
    Column as SqlxColumn, Connection, Executor, Row as SqlxRow, Statement, TypeInfo, ValueRef,
};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default time allowed for establishing a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const APPLICATION_NAME: &str = "sonde-peek";

/// Opens PostgreSQL connections.
#[derive(Debug, Clone)]
pub struct PostgresConnector {
    connect_timeout: Duration,
}

impl PostgresConnector {
    /// Creates a connector with the given connect timeout.
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for PostgresConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    async fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn DatabaseClient>> {
        let client = PostgresClient::connect(params, self.connect_timeout).await?;
        Ok(Box::new(client))
    }
}

/// PostgreSQL database client.
#[derive(Debug)]
pub struct PostgresClient {
    conn: PgConnection,
}

impl PostgresClient {
    /// Opens a single connection. There is no retry.
    pub async fn connect(params: &ConnectionParams, timeout: Duration) -> Result<Self> {
        let options = PgConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .database(&params.database)
            .username(&params.user)
            .password(params.password.expose())
            .application_name(APPLICATION_NAME);

        let conn = tokio::time::timeout(timeout, PgConnection::connect_with(&options))
            .await
            .map_err(|_| {
                PeekError::connection(format!(
                    "Connection to {}:{} timed out after {} seconds",
                    params.host,
                    params.port,
                    timeout.as_secs()
                ))
            })?
            .map_err(|e| map_connection_error(e, params))?;

        debug!("Successfully connected to database");
        Ok(Self { conn })
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    async fn fetch(&mut self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();

        // Preparing first gives column metadata even when no rows come back.
        let columns: Vec<ColumnInfo> = {
            let statement = (&mut self.conn)
                .prepare(sql)
                .await
                .map_err(|e| PeekError::query(format_query_error(e)))?;
            statement
                .columns()
                .iter()
                .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                .collect()
        };

        let rows: Vec<PgRow> = sqlx::query(sql)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| PeekError::query(format_query_error(e)))?;

        let execution_time = start.elapsed();
        debug!("Fetched {} rows in {:?}", rows.len(), execution_time);

        let rows = rows.iter().map(convert_row).collect::<Result<Vec<Row>>>()?;

        Ok(QueryResult::with_data(columns, rows).with_execution_time(execution_time))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| PeekError::connection(format!("Failed to close connection: {e}")))
    }
}

/// Converts a sqlx PgRow to our Row type.
///
/// A value that cannot be decoded is a query error naming the column, never
/// a silent NULL.
fn convert_row(row: &PgRow) -> Result<Row> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let type_name = col.type_info().name();
            convert_value(row, i, type_name).map_err(|e| {
                PeekError::query(format!(
                    "Cannot decode column \"{}\" of type {type_name}: {e}",
                    col.name()
                ))
            })
        })
        .collect()
}

type DecodeResult = std::result::Result<Value, BoxDynError>;

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> DecodeResult {
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => get(row, index, Value::Bool),
        "INT2" | "SMALLINT" => get(row, index, |v: i16| Value::Int(v.into())),
        "INT4" | "INT" | "INTEGER" => get(row, index, |v: i32| Value::Int(v.into())),
        "INT8" | "BIGINT" => get(row, index, Value::Int),
        "FLOAT4" | "REAL" => get(row, index, |v: f32| Value::Float(v.into())),
        "FLOAT8" | "DOUBLE PRECISION" => get(row, index, Value::Float),
        "NUMERIC" => numeric(row, index),
        "TIMESTAMP" => get(row, index, Value::Timestamp),
        "TIMESTAMPTZ" => get(row, index, Value::TimestampTz),
        "DATE" => get(row, index, Value::Date),
        "TIME" => get(row, index, |v: NaiveTime| {
            Value::String(v.format("%H:%M:%S%.f").to_string())
        }),
        "UUID" => get(row, index, |v: Uuid| Value::String(v.to_string())),
        "JSON" | "JSONB" => get(row, index, |v: serde_json::Value| Value::String(v.to_string())),
        "BYTEA" => get(row, index, Value::Bytes),
        _ => text(row, index),
    }
}

/// Decodes a nullable column and maps a present value with `into`.
fn get<'r, T>(row: &'r PgRow, index: usize, into: impl FnOnce(T) -> Value) -> DecodeResult
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    Ok(row
        .try_get::<Option<T>, _>(index)?
        .map(into)
        .unwrap_or(Value::Null))
}

/// Decodes NUMERIC from the wire without going through fixed-precision
/// arithmetic. Values `Decimal` cannot hold exactly, along with NaN and the
/// infinities, are kept as the server's text.
fn numeric(row: &PgRow, index: usize) -> DecodeResult {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let text = match raw.format() {
        PgValueFormat::Text => raw.as_str()?.to_string(),
        PgValueFormat::Binary => numeric_text(raw.as_bytes()?)?,
    };

    Ok(match Decimal::from_str(&text) {
        Ok(decimal) if decimal.to_string() == text => Value::Numeric(decimal),
        _ => Value::String(text),
    })
}

/// Renders PostgreSQL's binary NUMERIC (base-10000 digits) as text.
fn numeric_text(bytes: &[u8]) -> std::result::Result<String, BoxDynError> {
    const POSITIVE: u16 = 0x0000;
    const NEGATIVE: u16 = 0x4000;
    const NAN: u16 = 0xC000;
    const POS_INFINITY: u16 = 0xD000;
    const NEG_INFINITY: u16 = 0xF000;

    let word = |at: usize| -> Option<u16> {
        bytes
            .get(at..at + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
    };
    let (Some(ndigits), Some(weight), Some(sign), Some(dscale)) =
        (word(0), word(2), word(4), word(6))
    else {
        return Err("truncated NUMERIC header".into());
    };
    let weight = i64::from(weight as i16);
    let ndigits = usize::from(ndigits);

    match sign {
        NAN => return Ok("NaN".to_string()),
        POS_INFINITY => return Ok("Infinity".to_string()),
        NEG_INFINITY => return Ok("-Infinity".to_string()),
        POSITIVE | NEGATIVE => {}
        other => return Err(format!("invalid NUMERIC sign 0x{other:04X}").into()),
    }

    if bytes.len() != 8 + 2 * ndigits {
        return Err("NUMERIC length does not match its digit count".into());
    }
    let digits: Vec<u16> = (0..ndigits).filter_map(|i| word(8 + 2 * i)).collect();
    if digits.iter().any(|&d| d >= 10_000) {
        return Err("NUMERIC digit out of range".into());
    }
    let digit_at = |position: i64| -> u16 {
        usize::try_from(position)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NEGATIVE {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&digit_at(0).to_string());
        for position in 1..=weight {
            out.push_str(&format!("{:04}", digit_at(position)));
        }
    }

    let scale = usize::from(dscale);
    if scale > 0 {
        let mut fraction = String::with_capacity(scale + 4);
        let mut position = weight + 1;
        while fraction.len() < scale {
            fraction.push_str(&format!("{:04}", digit_at(position)));
            position += 1;
        }
        fraction.truncate(scale);
        out.push('.');
        out.push_str(&fraction);
    }

    Ok(out)
}

/// Text-like and otherwise unmapped types.
///
/// Binary values of a type with no mapping above cannot be rendered, so they
/// fail instead of showing up as NULL.
fn text(row: &PgRow, index: usize) -> DecodeResult {
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return Ok(value.map(Value::String).unwrap_or(Value::Null));
    }

    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    match raw.format() {
        PgValueFormat::Text => Ok(Value::String(raw.as_str()?.to_string())),
        PgValueFormat::Binary => Err("no text representation for this type".into()),
    }
}

/// Maps sqlx connection errors to a hint followed by the driver's message.
fn map_connection_error(error: sqlx::Error, params: &ConnectionParams) -> PeekError {
    let host = &params.host;
    let port = params.port;
    let driver_message = error.to_string();
    let error_str = driver_message.to_lowercase();

    let hint = if error_str.contains("connection refused") || error_str.contains("could not connect")
    {
        Some(format!(
            "Cannot connect to {host}:{port}. Check that the server is running"
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        Some(format!(
            "Authentication failed for user '{}'. Check your credentials",
            params.user
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        Some(format!("Database '{}' does not exist", params.database))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        Some(format!("Connection to {host}:{port} timed out"))
    } else {
        None
    };

    match hint {
        Some(hint) => PeekError::connection(format!("{hint} ({driver_message})")),
        None => PeekError::connection(driver_message),
    }
}

/// Formats a query error with Postgres detail and hint when available.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }

        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }

    result
}
