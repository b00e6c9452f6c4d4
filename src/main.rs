//! sonde-peek - preview the first rows of a sensor table in PostgreSQL.

use sonde_peek::app;
use sonde_peek::cli::Cli;
use sonde_peek::config::{self, Settings};
use sonde_peek::db::PostgresConnector;
use sonde_peek::error::Result;
use sonde_peek::logging;
use sonde_peek::report::Reporter;
use tracing::{error, Level};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    logging::init_stderr_logging();

    if let Err(e) = run().await {
        // The failure is reported even when RUST_LOG silences this crate
        if tracing::enabled!(Level::ERROR) {
            error!("{}: {}", e.category(), e);
        } else {
            eprintln!("{}: {}", e.category(), e);
        }
        std::process::exit(e.exit_code());
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse_args();

    config::load_env_file(cli.env_file.as_deref())?;

    // CLI flags take precedence over the environment
    let mut settings = Settings::from_env();
    settings.merge(&cli.to_settings());

    let reporter = Reporter::new(cli.parse_output_format()?, cli.preview_rows);
    let connector = PostgresConnector::new(cli.connect_timeout());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    app::run(&settings, &cli.run_options(), &connector, &reporter, &mut out).await
}
