//! Plugin host - lifecycle of feature modules loaded into the shell
//!
//! Each plugin goes Constructed -> Initialized -> Finalized. The host owns
//! every instance, tracks it by name and hands it a [`PluginHandle`] for the
//! few things a plugin may do to the shell: add settings pages, write to the
//! log pane and read node status.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::domain::result::{Error, Result};
use crate::domain::{PageOwner, PluginState};
use crate::ports::NodeClient;
use crate::services::logging::{LogEvent, ShellLog};
use crate::services::settings::{PageId, SettingsPage, SettingsRegistry};

const HOST: &str = "shell";

/// A feature module extending the shell
///
/// The host calls `initialize` exactly once right after construction and
/// `finalize` exactly once before the instance is dropped, including when
/// `initialize` failed.
pub trait Plugin: Send {
    /// Unique name; also the key in the enabled-plugins setting
    fn name(&self) -> &str;

    fn initialize(&mut self, handle: PluginHandle) -> anyhow::Result<()>;

    /// Release resources. Settings pages are removed by the host afterwards.
    fn finalize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Pause background work; called by `all_stop`
    fn suspend(&mut self) {}

    /// Resume after `suspend`; called by `carry_on`
    fn resume(&mut self) {}
}

/// Constructor for a registered plugin
pub type PluginFactory = Arc<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

/// Capability handle given to a plugin at initialize time
///
/// Pages added through the handle are tagged with the plugin's name. Once the
/// plugin is finalized the handle is retired and further page registrations
/// are refused.
#[derive(Clone)]
pub struct PluginHandle {
    name: String,
    settings: Arc<SettingsRegistry>,
    log: Arc<ShellLog>,
    node: Option<Arc<dyn NodeClient>>,
    retired: Arc<AtomicBool>,
}

impl PluginHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a settings page owned by this plugin; `None` once retired
    pub fn add_settings_page<F>(
        &self,
        priority: i32,
        category: impl Into<String>,
        factory: F,
    ) -> Option<PageId>
    where
        F: Fn() -> Box<dyn SettingsPage> + Send + Sync + 'static,
    {
        if self.is_retired() {
            self.log.warn(
                &self.name,
                "settings page registered after finalize was ignored",
            );
            return None;
        }
        Some(
            self.settings
                .add_page(priority, category, PageOwner::plugin(&self.name), factory),
        )
    }

    /// Remove every page this plugin registered
    pub fn remove_settings_pages(&self) -> usize {
        self.settings
            .remove_pages_of(&PageOwner::plugin(&self.name))
    }

    pub fn note(&self, message: impl Into<String>) {
        self.log.note(&self.name, message)
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log.debug(&self.name, message)
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log.warn(&self.name, message)
    }

    /// The shell log itself, for page factories that read it at open time
    pub fn shell_log(&self) -> Arc<ShellLog> {
        Arc::clone(&self.log)
    }

    /// Read access to the node, when the shell has one
    pub fn node(&self) -> Option<&Arc<dyn NodeClient>> {
        self.node.as_ref()
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }
}

struct Slot {
    name: String,
    plugin: Box<dyn Plugin>,
    state: PluginState,
    suspended: bool,
    retired: Arc<AtomicBool>,
}

/// Snapshot of one loaded plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub state: PluginState,
    pub suspended: bool,
    pub settings_pages: usize,
}

/// Owns loaded plugins and drives their lifecycle
///
/// Lock order is `busy` then `slots`. A name in `busy` is mid-load or
/// mid-finalize and not present in `slots`.
pub struct PluginHost {
    slots: Mutex<Vec<Slot>>,
    busy: Mutex<HashSet<String>>,
    stopped: AtomicBool,
    factories: Mutex<BTreeMap<String, PluginFactory>>,
    settings: Arc<SettingsRegistry>,
    log: Arc<ShellLog>,
    node: Option<Arc<dyn NodeClient>>,
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> Error {
    Error::Plugin(format!("Lock poisoned: {}", e))
}

impl PluginHost {
    pub fn new(settings: Arc<SettingsRegistry>, log: Arc<ShellLog>) -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
            busy: Mutex::new(HashSet::new()),
            stopped: AtomicBool::new(false),
            factories: Mutex::new(BTreeMap::new()),
            settings,
            log,
            node: None,
        }
    }

    /// Give plugins read access to the node through their handles
    pub fn with_node(mut self, node: Arc<dyn NodeClient>) -> Self {
        self.node = Some(node);
        self
    }

    pub fn settings(&self) -> &Arc<SettingsRegistry> {
        &self.settings
    }

    /// Make a plugin loadable by name
    pub fn register_factory<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        if let Ok(mut factories) = self.factories.lock() {
            factories.insert(name.into(), Arc::new(factory));
        }
    }

    /// Names of registered factories, sorted
    pub fn available(&self) -> Vec<String> {
        self.factories
            .lock()
            .map(|f| f.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Construct a plugin of type `P` and initialize it
    pub fn load<P>(&self) -> Result<()>
    where
        P: Plugin + Default + 'static,
    {
        self.load_boxed(Box::new(P::default()))
    }

    /// Construct a plugin from its registered factory and initialize it
    pub fn load_named(&self, name: &str) -> Result<()> {
        let factory = self
            .factories
            .lock()
            .map_err(poisoned)?
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("no plugin named '{}'", name)))?;

        self.load_boxed(factory())
    }

    /// Initialize an already constructed plugin and take ownership of it
    ///
    /// A name clash fails with a validation error and the new instance is
    /// dropped uninitialized. An initialize failure is logged, the plugin is
    /// finalized, any pages it managed to add are removed and it is dropped.
    pub fn load_boxed(&self, mut plugin: Box<dyn Plugin>) -> Result<()> {
        let name = plugin.name().to_string();
        if name.trim().is_empty() {
            return Err(Error::validation("plugin name must not be empty"));
        }

        {
            let mut busy = self.busy.lock().map_err(poisoned)?;
            let slots = self.slots.lock().map_err(poisoned)?;
            if busy.contains(&name) {
                return Err(Error::busy(format!("plugin '{}' is being loaded or unloaded", name)));
            }
            if slots.iter().any(|s| s.name == name) {
                return Err(Error::validation(format!("plugin '{}' is already loaded", name)));
            }
            busy.insert(name.clone());
        }

        let retired = Arc::new(AtomicBool::new(false));
        let handle = PluginHandle {
            name: name.clone(),
            settings: Arc::clone(&self.settings),
            log: Arc::clone(&self.log),
            node: self.node.clone(),
            retired: Arc::clone(&retired),
        };

        let mut state = PluginState::Constructed;
        debug_assert!(state.can_transition_to(PluginState::Initialized));

        if let Err(e) = plugin.initialize(handle) {
            if let Err(fin) = plugin.finalize() {
                self.log
                    .warn(HOST, format!("plugin {} failed to finalize: {:#}", name, fin));
            }
            retired.store(true, Ordering::SeqCst);
            self.settings.remove_pages_of(&PageOwner::plugin(&name));
            self.log.warn(HOST, format!("plugin {} failed to initialize: {:#}", name, e));
            self.release(&name);
            return Err(Error::Plugin(format!("{} failed to initialize: {}", name, e)));
        }
        state = PluginState::Initialized;

        {
            let mut busy = self.busy.lock().map_err(poisoned)?;
            let mut slots = self.slots.lock().map_err(poisoned)?;
            let mut suspended = false;
            if self.stopped.load(Ordering::SeqCst) {
                plugin.suspend();
                suspended = true;
            }
            slots.push(Slot {
                name: name.clone(),
                plugin,
                state,
                suspended,
                retired,
            });
            busy.remove(&name);
        }

        self.log.note(HOST, format!("plugin {} loaded", name));
        self.log
            .event(LogEvent::new("plugin_loaded").with_plugin(&name).with_operation("load"));
        Ok(())
    }

    /// Finalize and drop the plugin called `name`
    ///
    /// `NotFound` if no such plugin is loaded, `ResourceBusy` if it is being
    /// loaded or finalized on another thread. A failing `finalize` is logged
    /// and the plugin is still unloaded.
    pub fn unload(&self, name: &str) -> Result<()> {
        let slot = {
            let mut busy = self.busy.lock().map_err(poisoned)?;
            let mut slots = self.slots.lock().map_err(poisoned)?;
            if busy.contains(name) {
                return Err(Error::busy(format!("plugin '{}' is being loaded or unloaded", name)));
            }
            let pos = slots
                .iter()
                .position(|s| s.name == name)
                .ok_or_else(|| Error::not_found(format!("plugin '{}' is not loaded", name)))?;
            busy.insert(name.to_string());
            slots.remove(pos)
        };

        self.finalize_slot(slot);
        self.release(name);
        Ok(())
    }

    /// Finalize every plugin, most recently loaded first
    ///
    /// Part of the shutdown sequence; returns how many were finalized.
    pub fn finalize_all(&self) -> usize {
        let drained: Vec<Slot> = match (self.busy.lock(), self.slots.lock()) {
            (Ok(mut busy), Ok(mut slots)) => {
                for slot in slots.iter() {
                    busy.insert(slot.name.clone());
                }
                slots.drain(..).collect()
            }
            _ => return 0,
        };

        let count = drained.len();
        for slot in drained.into_iter().rev() {
            let name = slot.name.clone();
            self.finalize_slot(slot);
            self.release(&name);
        }
        count
    }

    fn finalize_slot(&self, mut slot: Slot) {
        debug_assert!(slot.state.can_transition_to(PluginState::Finalized));

        if let Err(e) = slot.plugin.finalize() {
            self.log
                .warn(HOST, format!("plugin {} failed to finalize: {:#}", slot.name, e));
        }
        slot.state = PluginState::Finalized;
        slot.retired.store(true, Ordering::SeqCst);

        let removed = self.settings.remove_pages_of(&PageOwner::plugin(&slot.name));
        self.log.debug(
            HOST,
            format!("plugin {} finalized, {} settings page(s) removed", slot.name, removed),
        );
        self.log.event(
            LogEvent::new("plugin_unloaded")
                .with_plugin(&slot.name)
                .with_operation("finalize"),
        );
    }

    fn release(&self, name: &str) {
        if let Ok(mut busy) = self.busy.lock() {
            busy.remove(name);
        }
    }

    /// Suspend every loaded plugin; plugins loaded while stopped start suspended
    pub fn all_stop(&self) {
        if let Ok(mut slots) = self.slots.lock() {
            self.stopped.store(true, Ordering::SeqCst);
            for slot in slots.iter_mut().filter(|s| !s.suspended) {
                slot.plugin.suspend();
                slot.suspended = true;
            }
        }
    }

    /// Resume every suspended plugin
    pub fn carry_on(&self) {
        if let Ok(mut slots) = self.slots.lock() {
            self.stopped.store(false, Ordering::SeqCst);
            for slot in slots.iter_mut().filter(|s| s.suspended) {
                slot.plugin.resume();
                slot.suspended = false;
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Loaded plugin names in load order
    pub fn plugin_names(&self) -> Vec<String> {
        self.slots
            .lock()
            .map(|slots| slots.iter().map(|s| s.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.state_of(name).is_some()
    }

    pub fn state_of(&self, name: &str) -> Option<PluginState> {
        self.slots
            .lock()
            .ok()?
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.state)
    }

    pub fn plugin_infos(&self) -> Vec<PluginInfo> {
        let snapshot: Vec<(String, PluginState, bool)> = self
            .slots
            .lock()
            .map(|slots| {
                slots
                    .iter()
                    .map(|s| (s.name.clone(), s.state, s.suspended))
                    .collect()
            })
            .unwrap_or_default();

        let pages = self.settings.entries();
        snapshot
            .into_iter()
            .map(|(name, state, suspended)| {
                let owner = PageOwner::plugin(&name);
                PluginInfo {
                    settings_pages: pages.iter().filter(|p| p.owner == owner).count(),
                    name,
                    state,
                    suspended,
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for PluginHost {
    fn drop(&mut self) {
        let remaining = self.finalize_all();
        if remaining > 0 {
            self.log
                .debug(HOST, format!("{} plugin(s) finalized on drop", remaining));
        }
    }
}
