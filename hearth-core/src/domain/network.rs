//! Network preferences - plain value, persisted in settings.json

use serde::{Deserialize, Serialize};

/// Default P2P listen port
pub const DEFAULT_LISTEN_PORT: u16 = 30303;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPreferences {
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default = "default_true")]
    pub upnp: bool,
    #[serde(default)]
    pub local_networking: bool,
    #[serde(default = "default_true")]
    pub discovery: bool,
    #[serde(default)]
    pub client_name: Option<String>,
    /// `host:port` entries dialled when networking starts
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
}

fn default_listen_port() -> u16 {
    DEFAULT_LISTEN_PORT
}

fn default_true() -> bool {
    true
}

impl Default for NetworkPreferences {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_LISTEN_PORT,
            public_ip: None,
            upnp: true,
            local_networking: false,
            discovery: true,
            client_name: None,
            bootstrap_peers: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let prefs: NetworkPreferences = serde_json::from_str(r#"{"listenPort": 30305}"#).unwrap();
        assert_eq!(prefs.listen_port, 30305);
        assert!(prefs.upnp);
        assert!(prefs.discovery);
        assert!(prefs.bootstrap_peers.is_empty());
    }
}
