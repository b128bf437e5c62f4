//! sql-bridge - Main entry point.
//!
//! Connects to a source and an optional target endpoint and reports on them.
//! All SQL goes through the library's dialects; this binary only calls them.

use clap::Parser;
use sql_bridge::config::{Command, Config, Endpoint};
use sql_bridge::db::{DbConnection, connect};
use sql_bridge::error::DbError;
use std::error::Error;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

/// Open a session to `endpoint`, bounded by the configured timeout.
async fn open(
    config: &Config,
    label: &str,
    endpoint: &Endpoint,
) -> Result<DbConnection, Box<dyn Error>> {
    info!(side = label, db_type = %endpoint.db_type, "Connecting");
    let conn = tokio::time::timeout(
        config.connect_timeout_duration(),
        connect(endpoint.db_type, &endpoint.credentials),
    )
    .await
    .map_err(|_| {
        format!(
            "{label}: connection timed out after {}s",
            config.connect_timeout
        )
    })??;
    Ok(conn)
}

async fn check(config: &Config, endpoints: &[(&str, Endpoint)]) -> Result<(), Box<dyn Error>> {
    for (label, endpoint) in endpoints {
        let mut conn = open(config, label, endpoint).await?;
        conn.ping().await?;
        let version = conn.server_version().await?;
        println!("{label}: {} {version}", endpoint.db_type.display_name());
        conn.close().await;
    }
    Ok(())
}

async fn fields(
    config: &Config,
    endpoints: &[(&str, Endpoint)],
    table: &str,
) -> Result<(), Box<dyn Error>> {
    let mut listings = Vec::with_capacity(endpoints.len());
    for (label, endpoint) in endpoints {
        let mut conn = open(config, label, endpoint).await?;
        let columns = conn.get_fields(table).await?;
        conn.close().await;

        println!("{label} ({}): {}", endpoint.db_type.display_name(), columns.join(", "));
        listings.push(columns);
    }

    if let [source, target] = listings.as_slice() {
        let missing: Vec<&str> = source
            .iter()
            .filter(|col| !target.iter().any(|t| t.eq_ignore_ascii_case(col)))
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            println!("target has every source column");
        } else {
            println!("missing on target: {}", missing.join(", "));
        }
    }
    Ok(())
}

async fn run(config: &Config) -> Result<(), Box<dyn Error>> {
    let mut endpoints = vec![("source", config.source_endpoint()?)];
    if let Some(target) = config.target_endpoint()? {
        endpoints.push(("target", target));
    }

    match &config.command {
        Command::Check => check(config, &endpoints).await,
        Command::Fields { table } => fields(config, &endpoints, table).await,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    info!("Starting sql-bridge v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&config).await {
        let suggestion = e.downcast_ref::<DbError>().and_then(DbError::suggestion);
        error!(error = %e, suggestion = suggestion.unwrap_or_default(), "Command failed");
        return Err(e);
    }

    Ok(())
}
