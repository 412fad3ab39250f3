//! Hearth Core - wallet shell core: plugin host and credential lifecycle
//!
//! This crate implements the core logic following hexagonal architecture:
//!
//! - **domain**: Core entities (Account, Address, NetworkPreferences, etc.)
//! - **ports**: Trait definitions for external collaborators (KeyStore, NodeClient, PasswordPrompt)
//! - **services**: Orchestration (CredentialController, PluginHost, SettingsRegistry, ...)
//! - **adapters**: Concrete implementations (file-backed key store, in-memory node)
//! - **plugins**: Built-in plugins

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod plugins;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use serde::Serialize;

use adapters::{DemoNode, FileKeyStore};
use config::{Config, ReadScope};
use ports::{KeyStore, NodeClient};
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, OperationResult};
pub use domain::{Account, Address, LockState, NetworkPreferences, SecretBytes};
pub use services::{EntryPoint, LogEvent, LogFilter, LoggingService};

/// Directory under the hearth dir holding one key file per account
pub const KEYS_DIR: &str = "keys";

/// Shell-owned settings pages sit before plugin pages
const NETWORK_PAGE_PRIORITY: i32 = 0;

/// Snapshot produced by [`ShellContext::refresh_all`]
#[derive(Debug, Clone, Serialize)]
pub struct ShellStatus {
    pub networking: bool,
    pub mining: bool,
    pub peers: usize,
    pub block_count: u64,
    pub balances: Vec<AccountBalance>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountBalance {
    pub address: Address,
    pub name: String,
    pub balance: u128,
}

/// Main context for shell operations
///
/// Composes the credential controller, plugin host and settings registry
/// around one key store and one node, and owns the settings read at startup.
pub struct ShellContext {
    hearth_dir: PathBuf,
    pub config: Config,
    pub network: Arc<RwLock<NetworkPreferences>>,
    pub log: Arc<ShellLog>,
    pub logger: Option<Arc<LoggingService>>,
    pub node: Arc<dyn NodeClient>,
    pub settings: Arc<SettingsRegistry>,
    pub plugins: Arc<PluginHost>,
    pub activity: Arc<ShellActivity>,
    pub credentials: CredentialController,
}

/// Network preferences page; reads the current preferences when opened
struct NetworkPage {
    prefs: NetworkPreferences,
}

impl SettingsPage for NetworkPage {
    fn title(&self) -> String {
        "Network".to_string()
    }

    fn fields(&self) -> Vec<(String, String)> {
        let p = &self.prefs;
        vec![
            ("Listen port".to_string(), p.listen_port.to_string()),
            (
                "Public IP".to_string(),
                p.public_ip.clone().unwrap_or_else(|| "auto".to_string()),
            ),
            ("UPnP".to_string(), p.upnp.to_string()),
            ("Local networking".to_string(), p.local_networking.to_string()),
            ("Discovery".to_string(), p.discovery.to_string()),
            (
                "Client name".to_string(),
                p.client_name.clone().unwrap_or_default(),
            ),
            ("Bootstrap peers".to_string(), p.bootstrap_peers.join(", ")),
        ]
    }
}

impl ShellContext {
    /// Open the shell with the file key store and the in-memory node
    pub fn new(hearth_dir: &Path, entry_point: EntryPoint) -> Result<Self> {
        let keys = FileKeyStore::open(&hearth_dir.join(KEYS_DIR))
            .context("Failed to open key store")?;
        Self::with_parts(
            hearth_dir,
            entry_point,
            Arc::new(keys),
            Arc::new(DemoNode::new()),
        )
    }

    /// Stored window geometry, read on its own so the window can be placed
    /// before the rest of the shell starts
    pub fn window_geometry(hearth_dir: &Path) -> Result<Option<String>> {
        Ok(Config::read_settings(hearth_dir, ReadScope::OnlyGeometry)?.geometry)
    }

    /// Open the shell around the given key store and node
    ///
    /// Reads settings.json once, pushes the network preferences to the node
    /// and loads every enabled plugin. A plugin that fails to load is logged
    /// and skipped. The CLI has no window, so it skips the geometry and never
    /// writes it back.
    pub fn with_parts(
        hearth_dir: &Path,
        entry_point: EntryPoint,
        store: Arc<dyn KeyStore>,
        node: Arc<dyn NodeClient>,
    ) -> Result<Self> {
        std::fs::create_dir_all(hearth_dir)
            .with_context(|| format!("Failed to create {}", hearth_dir.display()))?;
        let scope = match entry_point {
            EntryPoint::Cli => ReadScope::SkipGeometry,
            EntryPoint::Shell => ReadScope::All,
        };
        let config = Config::read_settings(hearth_dir, scope)?;

        // Event logging is best effort; the shell runs without it
        let logger = LoggingService::new(hearth_dir, entry_point, env!("CARGO_PKG_VERSION"))
            .ok()
            .map(Arc::new);
        let log = match &logger {
            Some(logger) => Arc::new(ShellLog::default().with_sink(Arc::clone(logger))),
            None => Arc::new(ShellLog::default()),
        };

        let network = Arc::new(RwLock::new(config.network.clone()));
        if let Err(e) = node.set_network_preferences(&config.network) {
            log.warn("shell", format!("could not apply network preferences: {}", e));
        }

        let settings = Arc::new(SettingsRegistry::new());
        {
            let network = Arc::clone(&network);
            settings.add_page(NETWORK_PAGE_PRIORITY, "Network", domain::PageOwner::Shell, move || {
                let prefs = network.read().map(|p| p.clone()).unwrap_or_default();
                Box::new(NetworkPage { prefs }) as Box<dyn SettingsPage>
            });
        }

        let plugins = Arc::new(
            PluginHost::new(Arc::clone(&settings), Arc::clone(&log)).with_node(Arc::clone(&node)),
        );
        plugins::register_builtins(&plugins);

        let activity = Arc::new(ShellActivity::new(
            Arc::clone(&plugins),
            Arc::clone(&node),
            Arc::clone(&log),
        ));
        let credentials = CredentialController::new(
            store,
            Arc::clone(&activity) as Arc<dyn ActivityControl>,
        )
        .with_log(Arc::clone(&log));

        let shell = Self {
            hearth_dir: hearth_dir.to_path_buf(),
            config,
            network,
            log,
            logger,
            node,
            settings,
            plugins,
            activity,
            credentials,
        };

        for name in shell.config.enabled_plugins.clone() {
            if let Err(e) = shell.plugins.load_named(&name) {
                shell.log.warn("shell", format!("plugin {} not loaded: {}", name, e));
            }
        }
        shell.log.note("shell", "ready");
        Ok(shell)
    }

    pub fn hearth_dir(&self) -> &Path {
        &self.hearth_dir
    }

    pub fn network_preferences(&self) -> NetworkPreferences {
        self.network.read().map(|p| p.clone()).unwrap_or_default()
    }

    /// Replace the network preferences and push them to the node
    pub fn set_network_preferences(&mut self, prefs: NetworkPreferences) -> domain::result::Result<()> {
        self.node.set_network_preferences(&prefs)?;
        if let Ok(mut current) = self.network.write() {
            *current = prefs.clone();
        }
        self.config.network = prefs;
        Ok(())
    }

    /// Load a plugin by name and remember it as enabled
    pub fn enable_plugin(&mut self, name: &str) -> domain::result::Result<()> {
        if !self.plugins.is_loaded(name) {
            self.plugins.load_named(name)?;
        }
        self.config.enable_plugin(name);
        Ok(())
    }

    /// Unload a plugin and forget it as enabled
    ///
    /// A plugin that is enabled in settings but not loaded is only forgotten.
    pub fn disable_plugin(&mut self, name: &str) -> domain::result::Result<()> {
        let was_enabled = self.config.disable_plugin(name);
        match self.plugins.unload(name) {
            Err(Error::NotFound(_)) if was_enabled => Ok(()),
            other => other,
        }
    }

    /// Suspend plugins, mining and networking
    pub fn all_stop(&self) {
        self.activity.all_stop()
    }

    /// Resume whatever `all_stop` suspended
    pub fn carry_on(&self) {
        self.activity.carry_on()
    }

    pub fn activity_stopped(&self) -> bool {
        self.activity.is_stopped()
    }

    /// Start networking, then dial `peer` (`host:port`)
    pub fn connect_peer(&self, peer: &str) -> domain::result::Result<()> {
        if !self.node.is_networking() {
            self.node.start_network()?;
        }
        self.node.connect(peer)?;
        self.log.note("shell", format!("connected to {}", peer));
        Ok(())
    }

    /// Refresh network, mining, block count and balances in one go
    pub fn refresh_all(&self) -> domain::result::Result<ShellStatus> {
        let balances = self
            .credentials
            .accounts()?
            .into_iter()
            .map(|a| AccountBalance {
                balance: self.node.balance_of(&a.address),
                address: a.address,
                name: a.name,
            })
            .collect();

        Ok(ShellStatus {
            networking: self.node.is_networking(),
            mining: self.node.is_mining(),
            peers: self.node.peer_count(),
            block_count: self.node.block_count(),
            balances,
        })
    }

    /// Write settings.json now
    pub fn save_settings(&self) -> Result<()> {
        self.config.save(&self.hearth_dir)
    }

    /// Stopping sequence: finalize every plugin, then write settings once
    pub fn shutdown(self) -> Result<()> {
        let finalized = self.plugins.finalize_all();
        self.log
            .debug("shell", format!("{} plugin(s) finalized", finalized));
        self.node.stop_mining();
        self.node.stop_network();
        self.save_settings()
    }
}
