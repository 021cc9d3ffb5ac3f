//! Main entry point for the mailer service.
//!
//! Loads the configuration, assembles the order lifecycle service from the
//! configured storage, identity and notification implementations, and serves
//! the HTTP API.

use clap::Parser;
use mailer_config::Config;
use std::path::PathBuf;

mod apis;
mod factory_registry;
mod server;

/// Command-line arguments for the mailer service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml", env = "MAILER_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started mailer");

	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let api_config = config.api.clone();
	let handles = factory_registry::build_service_from_config(config)?;

	match api_config {
		Some(api) if api.enabled => {
			tokio::select! {
				result = server::start_server(api, handles) => {
					tracing::info!("API server finished");
					result?;
				}
				_ = tokio::signal::ctrl_c() => {
					tracing::info!("Shutdown requested");
				}
			}
		}
		_ => {
			tracing::warn!("API disabled in configuration, nothing to serve");
		}
	}

	tracing::info!("Stopped mailer");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_args_defaults() {
		let args = Args::parse_from(["mailer"]);
		assert_eq!(args.log_level, "info");
	}

	#[test]
	fn test_args_custom_values() {
		let args = Args::parse_from(["mailer", "--config", "custom.toml", "-l", "debug"]);
		assert_eq!(args.config, PathBuf::from("custom.toml"));
		assert_eq!(args.log_level, "debug");
	}
}
