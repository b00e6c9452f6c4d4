//! Query execution integration tests.
//!
//! Each test creates its own schema and `lake_ysi_6920` table, inserts rows
//! in random order, and checks projection, ordering and the row cap.

use sonde_peek::app::{self, RunOptions};
use sonde_peek::config::{ConnectionParams, Settings};
use sonde_peek::db::{PostgresConnector, Session, Value};
use sonde_peek::error::PeekError;
use sonde_peek::query::{TableQuery, DEFAULT_COLUMNS, DEFAULT_ROW_LIMIT, DEFAULT_TABLE};
use sonde_peek::report::Reporter;
use sqlx::{Connection, Executor, PgConnection};

/// Helper to get test database URL from environment.
fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

/// Creates `schema.lake_ysi_6920` with `rows` readings in shuffled order.
async fn seed_table(url: &str, schema: &str, rows: i32) {
    let mut conn = PgConnection::connect(url).await.unwrap();

    conn.execute(format!("CREATE SCHEMA IF NOT EXISTS \"{schema}\"").as_str())
        .await
        .unwrap();
    conn.execute(format!("DROP TABLE IF EXISTS \"{schema}\".{DEFAULT_TABLE}").as_str())
        .await
        .unwrap();
    conn.execute(
        format!(
            "CREATE TABLE \"{schema}\".{DEFAULT_TABLE} (
                id serial PRIMARY KEY,
                datetime timestamp NOT NULL UNIQUE,
                temperature double precision,
                dissolved_oxygen numeric(6, 2),
                ph double precision
            )"
        )
        .as_str(),
    )
    .await
    .unwrap();

    sqlx::query(&format!(
        "INSERT INTO \"{schema}\".{DEFAULT_TABLE} (datetime, temperature, dissolved_oxygen, ph)
         SELECT timestamp '2023-06-01 00:00:00' + g * interval '15 minutes',
                12.0 + g * 0.01,
                (8.0 + g * 0.01)::numeric(6, 2),
                7.2
         FROM generate_series(1, $1) AS g
         ORDER BY random()"
    ))
    .bind(rows)
    .execute(&mut conn)
    .await
    .unwrap();

    conn.close().await.unwrap();
}

/// Creates `schema.lake_ysi_6920` with custom column types and literal rows.
async fn seed_typed_table(url: &str, schema: &str, columns: &str, rows: &str) {
    let mut conn = PgConnection::connect(url).await.unwrap();

    conn.execute(format!("CREATE SCHEMA IF NOT EXISTS \"{schema}\"").as_str())
        .await
        .unwrap();
    conn.execute(format!("DROP TABLE IF EXISTS \"{schema}\".{DEFAULT_TABLE}").as_str())
        .await
        .unwrap();
    conn.execute(format!("CREATE TABLE \"{schema}\".{DEFAULT_TABLE} ({columns})").as_str())
        .await
        .unwrap();
    conn.execute(format!("INSERT INTO \"{schema}\".{DEFAULT_TABLE} VALUES {rows}").as_str())
        .await
        .unwrap();

    conn.close().await.unwrap();
}

async fn collect_default(params: &ConnectionParams) -> sonde_peek::db::QueryResult {
    let connector = PostgresConnector::default();
    let mut session = Session::open(&connector, params).await.unwrap();

    let result = TableQuery::new(&params.schema, DEFAULT_TABLE)
        .select(DEFAULT_COLUMNS)
        .order_by(DEFAULT_COLUMNS[0])
        .limit(DEFAULT_ROW_LIMIT)
        .collect(session.client().unwrap())
        .await;

    session.release().await.unwrap();
    result.unwrap()
}

fn assert_sorted_ascending(rows: &[Vec<Value>]) {
    let keys: Vec<_> = rows
        .iter()
        .map(|row| match &row[0] {
            Value::Timestamp(ts) => *ts,
            other => panic!("Expected Timestamp for datetime, got {:?}", other),
        })
        .collect();
    assert!(
        keys.windows(2).all(|w| w[0] < w[1]),
        "rows are not strictly ascending"
    );
}

#[tokio::test]
async fn test_large_table_is_capped_and_sorted() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    seed_table(&url, "test_schema", 150).await;
    let params = ConnectionParams::from_connection_string(&url)
        .unwrap()
        .with_schema("test_schema");

    let result = collect_default(&params).await;

    assert_eq!(result.row_count(), 100);
    assert_eq!(result.column_names(), DEFAULT_COLUMNS.to_vec());
    assert!(result.rows.iter().all(|row| row.len() == 3));
    assert_sorted_ascending(&result.rows);

    // The earliest reading comes first
    assert_eq!(
        result.rows[0][0].to_display_string(),
        "2023-06-01 00:15:00"
    );
    assert!(matches!(result.rows[0][1], Value::Float(_)));
    assert!(matches!(result.rows[0][2], Value::Numeric(_)));
}

#[tokio::test]
async fn test_small_table_returns_all_rows() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    seed_table(&url, "test_schema_small", 7).await;
    let params = ConnectionParams::from_connection_string(&url)
        .unwrap()
        .with_schema("test_schema_small");

    let result = collect_default(&params).await;

    assert_eq!(result.row_count(), 7);
    assert_sorted_ascending(&result.rows);
}

#[tokio::test]
async fn test_empty_table_keeps_column_metadata() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    seed_table(&url, "test_schema_empty", 0).await;
    let params = ConnectionParams::from_connection_string(&url)
        .unwrap()
        .with_schema("test_schema_empty");

    let result = collect_default(&params).await;

    assert!(result.is_empty());
    assert_eq!(result.column_names(), DEFAULT_COLUMNS.to_vec());
}

#[tokio::test]
async fn test_unknown_table_is_query_error() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let params = ConnectionParams::from_connection_string(&url).unwrap();

    let settings = Settings {
        host: Some(params.host.clone()),
        port: Some(params.port.to_string()),
        database: Some(params.database.clone()),
        user: Some(params.user.clone()),
        password: Some(params.password.expose().to_string()),
        schema: Some("public".to_string()),
    };
    let options = RunOptions {
        table: "nonexistent_table_xyz".to_string(),
        ..RunOptions::default()
    };
    let mut out = Vec::new();

    let result = app::run(
        &settings,
        &options,
        &PostgresConnector::default(),
        &Reporter::default(),
        &mut out,
    )
    .await;

    let err = result.unwrap_err();
    assert!(matches!(err, PeekError::Query(_)), "{err}");
    assert!(err.to_string().contains("nonexistent_table_xyz"));
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_unknown_column_is_query_error() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    seed_table(&url, "test_schema_columns", 3).await;
    let params = ConnectionParams::from_connection_string(&url)
        .unwrap()
        .with_schema("test_schema_columns");

    let connector = PostgresConnector::default();
    let mut session = Session::open(&connector, &params).await.unwrap();
    let result = TableQuery::new(&params.schema, DEFAULT_TABLE)
        .select(["datetime", "salinity"])
        .order_by("datetime")
        .collect(session.client().unwrap())
        .await;
    session.release().await.unwrap();

    let err = result.unwrap_err();
    assert!(matches!(err, PeekError::Query(_)));
    assert!(err.to_string().contains("salinity"));
}

#[tokio::test]
async fn test_wide_and_special_numeric_values_are_kept() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    seed_typed_table(
        &url,
        "test_schema_numeric",
        "datetime timestamp, temperature numeric, dissolved_oxygen numeric",
        "('2023-01-01', 123456789012345678901234567890.5, 'NaN'),
         ('2023-01-02', 8.25, NULL),
         ('2023-01-03', -0.0012, 0.00001234)",
    )
    .await;
    let params = ConnectionParams::from_connection_string(&url)
        .unwrap()
        .with_schema("test_schema_numeric");

    let result = collect_default(&params).await;

    assert_eq!(result.row_count(), 3);
    assert_eq!(
        result.rows[0][1],
        Value::String("123456789012345678901234567890.5".to_string())
    );
    assert_eq!(result.rows[0][2], Value::String("NaN".to_string()));
    assert!(matches!(result.rows[1][1], Value::Numeric(_)));
    assert_eq!(result.rows[1][1].to_display_string(), "8.25");
    assert_eq!(result.rows[1][2], Value::Null);
    assert_eq!(result.rows[2][1].to_display_string(), "-0.0012");
    assert_eq!(result.rows[2][2].to_display_string(), "0.00001234");
}

#[tokio::test]
async fn test_timestamptz_key_nulls_and_time_values() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    seed_typed_table(
        &url,
        "test_schema_tz",
        "datetime timestamptz, temperature real, dissolved_oxygen time",
        "('2023-06-01 13:00:00+00', NULL, '12:30:15'),
         ('2023-06-01 12:00:00+00', 12.5, '10:00')",
    )
    .await;
    let params = ConnectionParams::from_connection_string(&url)
        .unwrap()
        .with_schema("test_schema_tz");

    let result = collect_default(&params).await;

    assert_eq!(result.row_count(), 2);
    assert!(matches!(result.rows[0][0], Value::TimestampTz(_)));
    assert_eq!(
        result.rows[0][0].to_display_string(),
        "2023-06-01T12:00:00+00:00"
    );
    assert_eq!(result.rows[0][1], Value::Float(12.5));
    assert_eq!(result.rows[0][2], Value::String("10:00:00".to_string()));
    assert_eq!(result.rows[1][1], Value::Null);
    assert_eq!(result.rows[1][2], Value::String("12:30:15".to_string()));
}

#[tokio::test]
async fn test_undecodable_column_is_query_error() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    seed_typed_table(
        &url,
        "test_schema_array",
        "datetime timestamp, temperature double precision, dissolved_oxygen integer[]",
        "('2023-01-01', 12.5, '{1,2}')",
    )
    .await;
    let params = ConnectionParams::from_connection_string(&url)
        .unwrap()
        .with_schema("test_schema_array");

    let connector = PostgresConnector::default();
    let mut session = Session::open(&connector, &params).await.unwrap();
    let result = TableQuery::new(&params.schema, DEFAULT_TABLE)
        .select(DEFAULT_COLUMNS)
        .order_by(DEFAULT_COLUMNS[0])
        .collect(session.client().unwrap())
        .await;
    session.release().await.unwrap();

    let err = result.unwrap_err();
    assert!(matches!(err, PeekError::Query(_)), "{err}");
    assert!(err.to_string().contains("dissolved_oxygen"), "{err}");
    assert!(!session.is_open());
}
