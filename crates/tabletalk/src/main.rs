// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TableTalk - a voice-driven, intent-guided dialogue orchestrator.
//!
//! This is the binary entry point for the TableTalk server.

mod serve;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// TableTalk - a voice-driven, intent-guided dialogue orchestrator.
#[derive(Parser, Debug)]
#[command(name = "tabletalk", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the TableTalk dialogue server.
    Serve,
    /// Manage TableTalk configuration.
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },
}

/// Config management subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Validate the configuration file and report any errors.
    Validate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load and validate configuration at startup.
    let config = match tabletalk_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            tabletalk_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.agent.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config { action }) => match action {
            Some(ConfigCommands::Validate) => {
                println!("Configuration is valid.");
            }
            None => {
                println!("tabletalk config: use --help for available config commands");
            }
        },
        None => {
            println!("tabletalk: use --help for available commands");
        }
    }
}
