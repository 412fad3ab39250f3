//! In-memory node used when no real client is attached
//!
//! Tracks network/mining flags and peers, and records every call so tests can
//! assert on the sequence of side effects the shell produced.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::result::{Error, Result};
use crate::domain::{Address, NetworkPreferences};
use crate::ports::NodeClient;

#[derive(Debug, Default)]
struct DemoState {
    networking: bool,
    mining: bool,
    peers: Vec<String>,
    block_count: u64,
    balances: HashMap<Address, u128>,
    prefs: NetworkPreferences,
    calls: Vec<String>,
}

#[derive(Debug, Default)]
pub struct DemoNode {
    state: Mutex<DemoState>,
}

impl DemoNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls made so far, e.g. `["start_network", "stop_mining"]`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().map(|s| s.calls.clone()).unwrap_or_default()
    }

    pub fn set_block_count(&self, count: u64) {
        if let Ok(mut s) = self.state.lock() {
            s.block_count = count;
        }
    }

    pub fn set_balance(&self, address: Address, balance: u128) {
        if let Ok(mut s) = self.state.lock() {
            s.balances.insert(address, balance);
        }
    }

    pub fn network_preferences(&self) -> NetworkPreferences {
        self.state.lock().map(|s| s.prefs.clone()).unwrap_or_default()
    }

    fn with_state<T>(&self, call: &str, f: impl FnOnce(&mut DemoState) -> T) -> Result<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| Error::Node(format!("Lock poisoned: {}", e)))?;
        state.calls.push(call.to_string());
        Ok(f(&mut *state))
    }

    fn read<T>(&self, f: impl FnOnce(&DemoState) -> T) -> Option<T> {
        self.state.lock().ok().map(|s| f(&*s))
    }
}

impl NodeClient for DemoNode {
    fn set_network_preferences(&self, prefs: &NetworkPreferences) -> Result<()> {
        self.with_state("set_network_preferences", |s| s.prefs = prefs.clone())
    }

    fn start_network(&self) -> Result<()> {
        self.with_state("start_network", |s| {
            s.networking = true;
            let bootstrap = s.prefs.bootstrap_peers.clone();
            for peer in bootstrap {
                if !s.peers.contains(&peer) {
                    s.peers.push(peer);
                }
            }
        })
    }

    fn stop_network(&self) {
        let _ = self.with_state("stop_network", |s| {
            s.networking = false;
            s.peers.clear();
        });
    }

    fn is_networking(&self) -> bool {
        self.read(|s| s.networking).unwrap_or(false)
    }

    fn start_mining(&self) -> Result<()> {
        self.with_state("start_mining", |s| s.mining = true)
    }

    fn stop_mining(&self) {
        let _ = self.with_state("stop_mining", |s| s.mining = false);
    }

    fn is_mining(&self) -> bool {
        self.read(|s| s.mining).unwrap_or(false)
    }

    fn connect(&self, peer: &str) -> Result<()> {
        let (host, port) = peer
            .rsplit_once(':')
            .ok_or_else(|| Error::validation(format!("peer '{}' is not host:port", peer)))?;
        if host.is_empty() || port.parse::<u16>().is_err() {
            return Err(Error::validation(format!("peer '{}' is not host:port", peer)));
        }

        self.with_state("connect", |s| {
            if !s.networking {
                return Err(Error::Node("network is not running".to_string()));
            }
            if !s.peers.iter().any(|p| p == peer) {
                s.peers.push(peer.to_string());
            }
            Ok(())
        })?
    }

    fn peer_count(&self) -> usize {
        self.read(|s| s.peers.len()).unwrap_or(0)
    }

    fn block_count(&self) -> u64 {
        self.read(|s| s.block_count).unwrap_or(0)
    }

    fn balance_of(&self, address: &Address) -> u128 {
        self.read(|s| s.balances.get(address).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}
