// src/main.rs

//! Command-line entry point: runs a single API command against a router and prints
//! the reply.
//!
//! Usage: `rosapi [--config <path>] <command> [name=value | ?query=value ...]`

use anyhow::{Result, anyhow};
use rosapi::ApiClient;
use rosapi::config::Config;
use std::env;
use tracing::{error, info};
use tracing_subscriber::filter::EnvFilter;

const USAGE: &str = "Usage: rosapi [--config <path>] <command> [name=value ...]";

#[tokio::main]
async fn main() -> Result<()> {
    const VERSION: &str = env!("ROSAPI_BUILD_VERSION");

    let args: Vec<String> = env::args().skip(1).collect();

    if args.iter().any(|arg| arg == "--version") {
        println!("rosapi version {VERSION}");
        return Ok(());
    }

    // Split `--config <path>` from the positional arguments.
    let mut config_path = "rosapi.toml".to_string();
    let mut positional = Vec::new();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            match iter.next() {
                Some(path) => config_path = path,
                None => {
                    eprintln!("--config flag requires a value");
                    std::process::exit(1);
                }
            }
        } else {
            positional.push(arg);
        }
    }

    let Some((command, attribute_args)) = positional.split_first() else {
        eprintln!("{USAGE}");
        std::process::exit(1);
    };

    let config = match Config::from_file(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from \"{config_path}\": {e:#}");
            std::process::exit(1);
        }
    };

    // Get initial log level from env var or config.
    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .compact()
        .with_ansi(true)
        .init();

    let attributes = parse_attributes(attribute_args)?;
    if let Err(e) = run_command(&config, command, &attributes).await {
        error!("Command failed: {e}");
        return Err(e);
    }
    Ok(())
}

/// Parses `name=value` arguments. The name keeps any leading `?` so query words pass
/// through unchanged.
fn parse_attributes(args: &[String]) -> Result<Vec<(String, String)>> {
    args.iter()
        .map(|arg| {
            arg.split_once('=')
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .ok_or_else(|| anyhow!("Invalid attribute '{arg}', expected name=value"))
        })
        .collect()
}

async fn run_command(config: &Config, command: &str, attributes: &[(String, String)]) -> Result<()> {
    let client = ApiClient::with_options(config.session_options());
    client
        .connect_with_validator(
            &config.host,
            config.port,
            config.tls.enabled,
            &config.username,
            &config.password,
            config.certificate_validator()?,
        )
        .await?;

    let borrowed: Vec<(&str, &str)> = attributes
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();
    let response = client.execute_ex(command, &borrowed).await;
    client.close();
    let response = response?;

    for (index, row) in response.rows.iter().enumerate() {
        println!("#{index}");
        for (name, value) in row.iter() {
            println!("  {name}={value}");
        }
    }
    if !response.attributes.is_empty() {
        println!("!done");
        for (name, value) in &response.attributes {
            println!("  {name}={value}");
        }
    }
    info!("{} row(s) returned.", response.rows.len());
    Ok(())
}
