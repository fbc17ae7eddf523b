use std::sync::Arc;

use authsession::config::{load_config, load_config_from, print_schema};
use authsession::startup::{self, Cli, Command};
use authsession::utils::init_logging;
use clap::Parser;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.command == Command::Schema {
        if let Err(e) = print_schema() {
            eprintln!("Failed to print schema: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let config = match cli.config {
        Some(path) => load_config_from(&path).unwrap_or_else(|e| {
            eprintln!("Error loading configuration from '{}': {}", path, e);
            std::process::exit(1);
        }),
        None => load_config(),
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let state = match startup::build(Arc::new(config)) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to start: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = startup::run(&state, cli.command).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
