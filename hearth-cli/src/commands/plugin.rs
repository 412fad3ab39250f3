//! Plugin command - list, enable and disable shell plugins

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use serde::Serialize;

use hearth_core::{OperationResult, ShellContext};

use super::{get_context, report};
use crate::output;

#[derive(Subcommand)]
pub enum PluginCommands {
    /// List available plugins and whether they are enabled
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load a plugin now and on every start
    Enable {
        /// Plugin name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Unload a plugin and stop loading it on start
    Disable {
        /// Plugin name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the settings pages in display order
    Pages {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct PluginRow {
    name: String,
    enabled: bool,
    state: Option<String>,
    settings_pages: usize,
}

#[derive(Serialize)]
struct PageRow {
    category: String,
    owner: String,
    title: String,
    fields: Vec<(String, String)>,
}

pub fn run(command: PluginCommands) -> Result<()> {
    let mut ctx = get_context()?;
    let outcome = execute(&mut ctx, command);
    let closed = ctx.shutdown();
    outcome.and(closed)
}

fn execute(ctx: &mut ShellContext, command: PluginCommands) -> Result<()> {
    match command {
        PluginCommands::List { json } => {
            let infos = ctx.plugins.plugin_infos();
            let rows: Vec<PluginRow> = ctx
                .plugins
                .available()
                .into_iter()
                .map(|name| {
                    let info = infos.iter().find(|i| i.name == name);
                    PluginRow {
                        enabled: ctx.config.is_plugin_enabled(&name),
                        state: info.map(|i| i.state.to_string()),
                        settings_pages: info.map(|i| i.settings_pages).unwrap_or(0),
                        name,
                    }
                })
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                let mut table = output::table();
                table.set_header(vec!["Plugin", "Enabled", "State", "Pages"]);
                for row in &rows {
                    let enabled = if row.enabled {
                        "yes".green().to_string()
                    } else {
                        "no".dimmed().to_string()
                    };
                    table.add_row(vec![
                        row.name.clone(),
                        enabled,
                        row.state.clone().unwrap_or_else(|| "-".to_string()),
                        row.settings_pages.to_string(),
                    ]);
                }
                println!("{}", table);
            }
        }

        PluginCommands::Enable { name, json } => {
            let result = ctx.enable_plugin(&name).map(|_| name.clone());
            report(OperationResult::for_operation("enable plugin", &name, result), json, |name| {
                output::success(&format!("✓ Enabled plugin {}", name));
            })?;
        }

        PluginCommands::Disable { name, json } => {
            let result = ctx.disable_plugin(&name).map(|_| name.clone());
            report(OperationResult::for_operation("disable plugin", &name, result), json, |name| {
                output::success(&format!("✓ Disabled plugin {}", name));
            })?;
        }

        PluginCommands::Pages { json } => {
            let owners = ctx.settings.entries();
            let rows: Vec<PageRow> = ctx
                .settings
                .pages()
                .zip(owners)
                .map(|((category, page), info)| PageRow {
                    category,
                    owner: info.owner.to_string(),
                    title: page.title(),
                    fields: page.fields(),
                })
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if rows.is_empty() {
                println!("No settings pages.");
            } else {
                for row in &rows {
                    println!("{} {}", row.category.bold(), format!("({})", row.owner).dimmed());
                    for (label, value) in &row.fields {
                        println!("  {:<20} {}", label, value);
                    }
                    println!();
                }
            }
        }
    }

    Ok(())
}
