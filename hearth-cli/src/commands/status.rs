//! Status command - node activity, plugins and balances

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use hearth_core::services::LogLevel;
use hearth_core::ShellContext;

use super::get_context;
use crate::output;

fn yes_no(flag: bool) -> String {
    if flag {
        "on".green().to_string()
    } else {
        "off".dimmed().to_string()
    }
}

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let outcome = show(&ctx, json);
    let closed = ctx.shutdown();
    outcome.and(closed)
}

fn show(ctx: &ShellContext, json: bool) -> Result<()> {
    let status = ctx.refresh_all()?;

    if json {
        let plugins = ctx.plugins.plugin_names();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "status": status,
                "plugins": plugins,
            }))?
        );
        return Ok(());
    }

    println!("{}", "Hearth Status".bold());
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec!["Networking".to_string(), yes_no(status.networking)]);
    table.add_row(vec!["Peers".to_string(), status.peers.to_string()]);
    table.add_row(vec!["Mining".to_string(), yes_no(status.mining)]);
    table.add_row(vec!["Blocks".to_string(), status.block_count.to_string()]);
    table.add_row(vec!["Accounts".to_string(), status.balances.len().to_string()]);
    table.add_row(vec!["Plugins".to_string(), ctx.plugins.len().to_string()]);
    println!("{}", table);

    if !status.balances.is_empty() {
        println!();
        let mut balances = output::table();
        balances.set_header(vec!["Account", "Address", "Balance"]);
        for entry in &status.balances {
            balances.add_row(vec![
                entry.name.clone(),
                entry.address.to_string(),
                entry.balance.to_string(),
            ]);
        }
        println!("{}", balances);
    }

    let warnings: Vec<_> = ctx
        .log
        .lines()
        .into_iter()
        .filter(|l| l.level == LogLevel::Warn)
        .collect();
    if !warnings.is_empty() {
        println!();
        for line in warnings {
            output::warning(&format!("[{}] {}", line.source, line.message));
        }
    }

    Ok(())
}
