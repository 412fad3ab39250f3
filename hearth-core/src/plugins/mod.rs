//! Built-in plugins shipped with the shell

pub mod log_panel;
pub mod node_status;

pub use log_panel::LogPanel;
pub use node_status::NodeStatus;

use crate::services::PluginHost;

/// Make every built-in plugin loadable by name
pub fn register_builtins(host: &PluginHost) {
    host.register_factory(log_panel::NAME, || Box::new(LogPanel::default()));
    host.register_factory(node_status::NAME, || Box::new(NodeStatus::default()));
}
