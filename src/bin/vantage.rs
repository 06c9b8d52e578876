//! Vantage CLI Binary
//!
//! Command-line diagnostics for perspective-aware content resolution.

use clap::Parser;
use vantage::cli::{map_error, Cli, CommandOutput, RunContext};
use vantage::logging::init_logging;
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let context = match RunContext::new(cli.config.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    };

    // CLI flags override the config file
    let mut logging_config = context.config().logging.clone();
    if let Some(level) = &cli.log_level {
        logging_config.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        logging_config.format = format.clone();
    }
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("Vantage CLI starting");

    match context.execute(&cli.command).await {
        Ok(CommandOutput::Text(output)) => {
            info!("Command completed successfully");
            println!("{}", output);
        }
        Ok(CommandOutput::NotFound(message)) => {
            info!("Command completed: not found");
            println!("null");
            eprintln!("{}", message);
            process::exit(2);
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    }
}
