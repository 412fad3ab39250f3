//! Node status - networking and mining state as a settings page
//!
//! The page is built when the settings dialog opens, so it always shows the
//! node as it is at that moment.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::anyhow;

use crate::services::{Plugin, PluginHandle, SettingsPage, StaticPage};

pub const NAME: &str = "node-status";

const PAGE_PRIORITY: i32 = 20;

#[derive(Default)]
pub struct NodeStatus {
    paused: Arc<AtomicBool>,
    handle: Option<PluginHandle>,
}

fn yes_no(flag: bool) -> String {
    let text = if flag { "yes" } else { "no" };
    text.to_string()
}

impl Plugin for NodeStatus {
    fn name(&self) -> &str {
        NAME
    }

    fn initialize(&mut self, handle: PluginHandle) -> anyhow::Result<()> {
        let node = handle
            .node()
            .cloned()
            .ok_or_else(|| anyhow!("no node attached to the shell"))?;
        let paused = Arc::clone(&self.paused);

        handle.add_settings_page(PAGE_PRIORITY, "Node", move || {
            let monitoring = if paused.load(Ordering::SeqCst) {
                "paused"
            } else {
                "active"
            };
            let fields = vec![
                ("Networking".to_string(), yes_no(node.is_networking())),
                ("Peers".to_string(), node.peer_count().to_string()),
                ("Mining".to_string(), yes_no(node.is_mining())),
                ("Blocks".to_string(), node.block_count().to_string()),
                ("Monitoring".to_string(), monitoring.to_string()),
            ];
            Box::new(StaticPage::new("Node", fields)) as Box<dyn SettingsPage>
        });
        self.handle = Some(handle);
        Ok(())
    }

    fn finalize(&mut self) -> anyhow::Result<()> {
        self.handle = None;
        Ok(())
    }

    fn suspend(&mut self) {
        self.paused.store(true, Ordering::SeqCst);
        if let Some(handle) = &self.handle {
            handle.debug("monitoring paused");
        }
    }

    fn resume(&mut self) {
        self.paused.store(false, Ordering::SeqCst);
        if let Some(handle) = &self.handle {
            handle.debug("monitoring resumed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::DemoNode;
    use crate::domain::result::Error;
    use crate::ports::NodeClient;
    use crate::services::{PluginHost, SettingsRegistry, ShellLog};

    fn field(page: &dyn SettingsPage, key: &str) -> String {
        page.fields()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
            .unwrap()
    }

    #[test]
    fn test_requires_node() {
        let host = PluginHost::new(Arc::new(SettingsRegistry::new()), Arc::new(ShellLog::default()));
        assert!(matches!(host.load::<NodeStatus>(), Err(Error::Plugin(_))));
        assert!(!host.is_loaded(NAME));
    }

    #[test]
    fn test_page_reads_node_and_pause_state() {
        let node = Arc::new(DemoNode::new());
        let settings = Arc::new(SettingsRegistry::new());
        let host = PluginHost::new(Arc::clone(&settings), Arc::new(ShellLog::default()))
            .with_node(Arc::clone(&node) as Arc<dyn NodeClient>);
        host.load::<NodeStatus>().unwrap();

        node.start_mining().unwrap();
        node.set_block_count(42);
        host.all_stop();

        let (_, page) = settings.pages().next().unwrap();
        assert_eq!(field(page.as_ref(), "Mining"), "yes");
        assert_eq!(field(page.as_ref(), "Blocks"), "42");
        assert_eq!(field(page.as_ref(), "Monitoring"), "paused");

        host.carry_on();
        let (_, page) = settings.pages().next().unwrap();
        assert_eq!(field(page.as_ref(), "Monitoring"), "active");
    }
}
