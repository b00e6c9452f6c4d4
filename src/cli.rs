//! Command-line argument parsing for sonde-peek.
//!
//! Flags override the `DB_*` environment variables. The password is only
//! read from the environment so it never shows up in the process list.

use crate::app::RunOptions;
use crate::config::Settings;
use crate::error::Result;
use crate::query::{DEFAULT_COLUMNS, DEFAULT_ROW_LIMIT, DEFAULT_TABLE};
use crate::report::{OutputFormat, DEFAULT_PREVIEW_ROWS};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Preview the first rows of a sensor table in PostgreSQL.
#[derive(Parser, Debug)]
#[command(name = "sonde-peek")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Database host (overrides DB_HOST)
    #[arg(short = 'H', long, value_name = "HOST")]
    pub host: Option<String>,

    /// Database port (overrides DB_PORT)
    #[arg(short = 'p', long, value_name = "PORT")]
    pub port: Option<String>,

    /// Database name (overrides DB_NAME)
    #[arg(short = 'd', long, value_name = "DATABASE")]
    pub database: Option<String>,

    /// Database user (overrides DB_USER)
    #[arg(short = 'U', long, value_name = "USER")]
    pub user: Option<String>,

    /// Schema containing the table (overrides DB_SCHEMA)
    #[arg(short = 's', long, value_name = "SCHEMA")]
    pub schema: Option<String>,

    /// Table to read
    #[arg(short = 't', long, value_name = "TABLE", default_value = DEFAULT_TABLE)]
    pub table: String,

    /// Comma-separated columns to select; the first one is the sort key
    #[arg(
        long,
        value_name = "COLUMNS",
        value_delimiter = ',',
        default_values = DEFAULT_COLUMNS
    )]
    pub columns: Vec<String>,

    /// Maximum number of rows to retrieve
    #[arg(short = 'n', long, value_name = "ROWS", default_value_t = DEFAULT_ROW_LIMIT)]
    pub limit: u64,

    /// Number of rows to show in the preview
    #[arg(long, value_name = "ROWS", default_value_t = DEFAULT_PREVIEW_ROWS)]
    pub preview_rows: usize,

    /// Output format: text or json
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    pub output: String,

    /// Env file to load before reading DB_* variables (defaults to ./.env if present)
    #[arg(long, value_name = "PATH", env = "SONDE_PEEK_ENV_FILE")]
    pub env_file: Option<PathBuf>,

    /// Seconds to wait for the connection to be established
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub connect_timeout: u64,

    /// Print the SQL that would run and exit without connecting
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Connection settings given on the command line.
    pub fn to_settings(&self) -> Settings {
        Settings {
            host: self.host.clone(),
            port: self.port.clone(),
            database: self.database.clone(),
            user: self.user.clone(),
            password: None,
            schema: self.schema.clone(),
        }
    }

    /// What to read.
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            table: self.table.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| c.trim().to_string())
                .collect(),
            limit: self.limit,
            dry_run: self.dry_run,
        }
    }

    /// Parses the output format from the --output argument.
    pub fn parse_output_format(&self) -> Result<OutputFormat> {
        self.output.parse()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}
