//! Logs command - query the event log and replay the shell log pane

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;

use hearth_core::services::{LogEntry, LogLevel, LogStats};
use hearth_core::{EntryPoint, LogFilter, LoggingService};

use super::{get_context, get_hearth_dir};
use crate::output;

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show stored events, newest first
    List {
        /// Maximum number of events
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Only events from this plugin
        #[arg(long)]
        plugin: Option<String>,
        /// Only events for this account (address or address prefix)
        #[arg(long)]
        account: Option<String>,
        /// Only events for this operation, e.g. reencrypt or load
        #[arg(long)]
        operation: Option<String>,
        /// Only events carrying an error
        #[arg(long)]
        errors: bool,
        /// Only warnings raised in the shell log pane
        #[arg(long, conflicts_with = "errors")]
        warnings: bool,
        /// Only events from the last N days
        #[arg(long)]
        days: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the shell, stop it again, and print what its log pane showed
    Pane {
        /// Include debug lines
        #[arg(long)]
        debug: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete stored events older than N days
    Clear {
        #[arg(long, default_value = "30")]
        older_than_days: u32,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Totals, busiest plugins and database location
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn open_log() -> Result<LoggingService> {
    let hearth_dir = get_hearth_dir()?;
    std::fs::create_dir_all(&hearth_dir)
        .with_context(|| format!("Failed to create hearth directory: {:?}", hearth_dir))?;
    LoggingService::new(&hearth_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
}

fn days_ago(days: u32) -> chrono::DateTime<Utc> {
    Utc::now() - Duration::days(i64::from(days))
}

/// Plugin, account and operation in one cell; accounts are shortened
fn subject(entry: &LogEntry) -> String {
    let mut parts = Vec::new();
    if let Some(plugin) = &entry.plugin {
        parts.push(plugin.clone());
    }
    if let Some(account) = &entry.account {
        parts.push(account.chars().take(10).collect::<String>() + "…");
    }
    if let Some(operation) = &entry.operation {
        parts.push(operation.clone());
    }
    parts.join(" · ")
}

fn print_entries(entries: &[LogEntry]) {
    let mut table = output::table();
    table.set_header(vec!["Time", "From", "Event", "Subject", "Error"]);
    for entry in entries {
        let event = if entry.is_shell_warning() {
            "warning".yellow().to_string()
        } else {
            entry.event.clone()
        };
        let error = match &entry.error_message {
            Some(message) if entry.is_shell_warning() => message.clone(),
            Some(message) => message.red().to_string(),
            None => String::new(),
        };
        table.add_row(vec![
            output::local_time(entry.timestamp),
            entry.entry_point.clone(),
            event,
            subject(entry),
            error,
        ]);
    }
    println!("{}", table);
}

fn print_stats(stats: &LogStats, log: &LoggingService) {
    let size = std::fs::metadata(log.db_path()).map(|m| m.len()).unwrap_or(0);

    println!("{}", "Event log".bold());
    println!("  Events:         {}", stats.total);
    println!("  With errors:    {}", stats.errors);
    println!("  Shell warnings: {}", stats.shell_warnings);
    if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
        println!(
            "  Span:           {} to {}",
            output::local_time(oldest),
            output::local_time(newest)
        );
    }
    println!("  Database:       {} ({})", log.db_path().display(), output::file_size(size));

    if !stats.by_plugin.is_empty() {
        println!();
        let mut table = output::table();
        table.set_header(vec!["Plugin", "Events"]);
        for (plugin, count) in &stats.by_plugin {
            table.add_row(vec![plugin.clone(), count.to_string()]);
        }
        println!("{}", table);
    }
}

pub fn run(command: LogsCommands) -> Result<()> {
    match command {
        LogsCommands::List {
            limit,
            plugin,
            account,
            operation,
            errors,
            warnings,
            days,
            json,
        } => {
            let filter = LogFilter {
                plugin,
                account,
                operation,
                errors_only: errors,
                warnings_only: warnings,
                since: days.map(days_ago),
                limit: Some(limit),
            };
            let entries = open_log()?.query(&filter)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No matching events.");
            } else {
                print_entries(&entries);
            }
        }

        LogsCommands::Pane { debug, json } => {
            let ctx = get_context()?;
            let pane = Arc::clone(&ctx.log);
            let closed = ctx.shutdown();

            let lines: Vec<_> = pane
                .lines()
                .into_iter()
                .filter(|line| debug || line.level != LogLevel::Debug)
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&lines)?);
            } else {
                for line in &lines {
                    println!(
                        "{} {:>5} {} {}",
                        line.at.format("%H:%M:%S%.3f").to_string().dimmed(),
                        output::level_label(line.level),
                        format!("[{}]", line.source).cyan(),
                        line.message
                    );
                }
            }
            closed?;
        }

        LogsCommands::Clear {
            older_than_days,
            force,
            json,
        } => {
            if !force
                && !json
                && !Confirm::new()
                    .with_prompt(format!("Delete events older than {} days?", older_than_days))
                    .default(false)
                    .interact()?
            {
                println!("Cancelled.");
                return Ok(());
            }

            let removed = open_log()?.prune(days_ago(older_than_days))?;
            if json {
                println!("{}", serde_json::json!({ "deleted": removed }));
            } else {
                output::success(&format!("✓ Deleted {} event(s)", removed));
            }
        }

        LogsCommands::Stats { json } => {
            let log = open_log()?;
            let stats = log.stats()?;
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "stats": stats,
                        "database": log.db_path().to_string_lossy(),
                    })
                );
            } else {
                print_stats(&stats, &log);
            }
        }
    }

    Ok(())
}
