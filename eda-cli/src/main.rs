//! `eda` - command line front end for exploratory data analysis.

mod banner;
mod cli;
mod commands;
mod markdown;

use std::process::ExitCode;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use colored::Colorize;
use eda_core::config::EdaConfig;
use eda_core::logging::setup::{init_logging, LoggingConfig};

use crate::cli::{AuthCommand, Cli, Command};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let logging = LoggingConfig::from_verbosity(cli.verbose).with_json_format(cli.log_json);
    if let Err(e) = init_logging(logging) {
        eprintln!("Failed to initialize logging: {e}");
    }

    banner::print_banner();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", format!("{e:#}").red());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = EdaConfig::from_env();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Command::Analyze(args) => commands::analyze(&config, args, !cli.no_color).await,
        Command::Sheets { source } => commands::sheets(&config, &source).await,
        Command::Auth { command } => match command {
            AuthCommand::Setup { client_secrets } => commands::auth_setup(&config, &client_secrets),
            AuthCommand::Login => commands::auth_login(&config).await,
            AuthCommand::Status => commands::auth_status(&config),
        },
    }
}
