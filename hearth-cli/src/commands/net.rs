//! Net command - network preferences and peers

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use hearth_core::{NetworkPreferences, OperationResult, ShellContext};

use super::{get_context, report};
use crate::output;

#[derive(Subcommand)]
pub enum NetCommands {
    /// Show the network preferences
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change network preferences; unspecified fields keep their value
    Set {
        /// P2P listen port
        #[arg(long)]
        port: Option<u16>,
        /// Public IP to advertise ("auto" to detect)
        #[arg(long)]
        public_ip: Option<String>,
        /// Use UPnP port mapping
        #[arg(long)]
        upnp: Option<bool>,
        /// Allow peers on local networks
        #[arg(long)]
        local_networking: Option<bool>,
        /// Discover peers automatically
        #[arg(long)]
        discovery: Option<bool>,
        /// Client name sent to peers
        #[arg(long)]
        client_name: Option<String>,
        /// Bootstrap peer (host:port); repeat to replace the list
        #[arg(long = "bootstrap", value_delimiter = ',')]
        bootstrap: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start networking and dial a peer
    Connect {
        /// Peer address as host:port
        peer: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn print_preferences(prefs: &NetworkPreferences) {
    let mut table = output::table();
    table.add_row(vec!["Listen port".to_string(), prefs.listen_port.to_string()]);
    table.add_row(vec![
        "Public IP".to_string(),
        prefs.public_ip.clone().unwrap_or_else(|| "auto".to_string()),
    ]);
    table.add_row(vec!["UPnP".to_string(), prefs.upnp.to_string()]);
    table.add_row(vec!["Local networking".to_string(), prefs.local_networking.to_string()]);
    table.add_row(vec!["Discovery".to_string(), prefs.discovery.to_string()]);
    table.add_row(vec![
        "Client name".to_string(),
        prefs.client_name.clone().unwrap_or_default(),
    ]);
    table.add_row(vec!["Bootstrap peers".to_string(), prefs.bootstrap_peers.join("\n")]);
    println!("{}", "Network".bold());
    println!("{}", table);
}

pub fn run(command: NetCommands) -> Result<()> {
    let mut ctx = get_context()?;
    let outcome = execute(&mut ctx, command);
    let closed = ctx.shutdown();
    outcome.and(closed)
}

fn execute(ctx: &mut ShellContext, command: NetCommands) -> Result<()> {
    match command {
        NetCommands::Show { json } => {
            let prefs = ctx.network_preferences();
            if json {
                println!("{}", serde_json::to_string_pretty(&prefs)?);
            } else {
                print_preferences(&prefs);
            }
        }

        NetCommands::Set {
            port,
            public_ip,
            upnp,
            local_networking,
            discovery,
            client_name,
            bootstrap,
            json,
        } => {
            let mut prefs = ctx.network_preferences();
            if let Some(port) = port {
                prefs.listen_port = port;
            }
            if let Some(ip) = public_ip {
                prefs.public_ip = if ip == "auto" || ip.is_empty() { None } else { Some(ip) };
            }
            if let Some(upnp) = upnp {
                prefs.upnp = upnp;
            }
            if let Some(local) = local_networking {
                prefs.local_networking = local;
            }
            if let Some(discovery) = discovery {
                prefs.discovery = discovery;
            }
            if let Some(name) = client_name {
                prefs.client_name = if name.is_empty() { None } else { Some(name) };
            }
            if !bootstrap.is_empty() {
                prefs.bootstrap_peers = bootstrap;
            }

            let result = ctx.set_network_preferences(prefs.clone()).map(|_| prefs);
            report(OperationResult::for_operation("set network", "preferences", result), json, |prefs| {
                output::success("✓ Network preferences saved");
                print_preferences(prefs);
            })?;
        }

        NetCommands::Connect { peer, json } => {
            let result = ctx.connect_peer(&peer).map(|_| ctx.node.peer_count());
            report(OperationResult::for_operation("connect", &peer, result), json, |peers| {
                output::success(&format!("✓ Connected to {} ({} peer(s))", peer, peers));
            })?;
        }
    }

    Ok(())
}
