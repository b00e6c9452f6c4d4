//! Connection integration tests.
//!
//! Tests database connectivity and error handling.

use sonde_peek::config::{ConnectionParams, Password};
use sonde_peek::db::{DatabaseClient, PostgresClient, PostgresConnector, Session};
use sonde_peek::error::PeekError;
use std::time::Duration;

/// Helper to get test database URL from environment.
fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

#[tokio::test]
async fn test_connect_with_valid_credentials() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let params = ConnectionParams::from_connection_string(&url).unwrap();

    let mut session = Session::open(&PostgresConnector::default(), &params)
        .await
        .unwrap();
    let result = session.client().unwrap().fetch("SELECT 1 AS num").await.unwrap();

    assert_eq!(result.column_names(), vec!["num"]);
    session.release().await.unwrap();
    assert!(!session.is_open());
}

#[tokio::test]
async fn test_connect_with_wrong_password() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let mut params = ConnectionParams::from_connection_string(&url).unwrap();
    params.password = Password::new("definitely-not-the-password");

    let result = Session::open(&PostgresConnector::default(), &params).await;

    // Servers configured with trust auth accept any password
    if let Err(err) = result {
        assert!(matches!(err, PeekError::Connection(_)), "{err}");
    }
}

#[tokio::test(flavor = "current_thread")]
async fn test_connect_with_invalid_host() {
    let params = ConnectionParams {
        host: "invalid.host.that.does.not.exist.local".to_string(),
        port: 5432,
        database: "testdb".to_string(),
        user: "testuser".to_string(),
        password: Password::new("testpass"),
        schema: "public".to_string(),
    };

    let result = PostgresClient::connect(&params, Duration::from_secs(10)).await;

    // The specific error message varies by system
    let error = result.unwrap_err();
    assert!(matches!(error, PeekError::Connection(_)));
}

#[tokio::test(flavor = "current_thread")]
async fn test_connect_with_invalid_port() {
    let params = ConnectionParams {
        host: "localhost".to_string(),
        port: 59999, // Unlikely to be in use
        database: "testdb".to_string(),
        user: "testuser".to_string(),
        password: Password::new("testpass"),
        schema: "public".to_string(),
    };

    let result = PostgresClient::connect(&params, Duration::from_secs(5)).await;
    assert!(matches!(result, Err(PeekError::Connection(_))));
}
