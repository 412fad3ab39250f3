//! Plugin lifecycle state and settings page ownership

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of one plugin instance: Constructed -> Initialized -> Finalized.
/// Finalized is terminal; a finalized instance is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginState {
    Constructed,
    Initialized,
    Finalized,
}

impl PluginState {
    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(self, next: PluginState) -> bool {
        matches!(
            (self, next),
            (PluginState::Constructed, PluginState::Initialized)
                | (PluginState::Constructed, PluginState::Finalized)
                | (PluginState::Initialized, PluginState::Finalized)
        )
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PluginState::Constructed => "constructed",
            PluginState::Initialized => "initialized",
            PluginState::Finalized => "finalized",
        };
        f.write_str(s)
    }
}

/// Who registered a settings page, so it can be removed with its owner
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "name")]
pub enum PageOwner {
    Shell,
    Plugin(String),
}

impl PageOwner {
    pub fn plugin(name: impl Into<String>) -> Self {
        Self::Plugin(name.into())
    }
}

impl fmt::Display for PageOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageOwner::Shell => f.write_str("shell"),
            PageOwner::Plugin(name) => write!(f, "plugin:{}", name),
        }
    }
}
