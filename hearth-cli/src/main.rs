//! Hearth CLI - wallet shell in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{accounts, logs, net, plugin, status};

/// Hearth - wallet shell: accounts, plugins and node settings
#[derive(Parser)]
#[command(name = "hearth", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show node activity, plugins and balances
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage accounts and their encrypted keys
    Accounts {
        #[command(subcommand)]
        command: accounts::AccountsCommands,
    },

    /// Manage plugins
    Plugin {
        #[command(subcommand)]
        command: plugin::PluginCommands,
    },

    /// Network preferences and peers
    Net {
        #[command(subcommand)]
        command: net::NetCommands,
    },

    /// View and manage application logs
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Status { .. } => "status",
            Commands::Accounts { .. } => "accounts",
            Commands::Plugin { .. } => "plugin",
            Commands::Net { .. } => "net",
            Commands::Logs { .. } => "logs",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let name = cli.command.name();

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is::<commands::Reported>() => ExitCode::FAILURE,
        Err(e) => {
            output::error(&format!("Error: {:#}", e));
            commands::log_failure(name, &e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Status { json } => status::run(json),
        Commands::Accounts { command } => accounts::run(command),
        Commands::Plugin { command } => plugin::run(command),
        Commands::Net { command } => net::run(command),
        Commands::Logs { command } => logs::run(command),
    }
}
