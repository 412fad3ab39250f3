//! Node/client port - opaque side-effecting operations on the blockchain client

use crate::domain::result::Result;
use crate::domain::{Address, NetworkPreferences};

/// The running node as seen by the shell
///
/// The shell never inspects chain semantics; it starts and stops activity,
/// dials peers and reads a few counters for display.
pub trait NodeClient: Send + Sync {
    /// Apply network preferences (takes effect on the next network start)
    fn set_network_preferences(&self, prefs: &NetworkPreferences) -> Result<()>;

    fn start_network(&self) -> Result<()>;
    fn stop_network(&self);
    fn is_networking(&self) -> bool;

    fn start_mining(&self) -> Result<()>;
    fn stop_mining(&self);
    fn is_mining(&self) -> bool;

    /// Dial a peer given as `host:port`
    fn connect(&self, peer: &str) -> Result<()>;
    fn peer_count(&self) -> usize;

    fn block_count(&self) -> u64;
    fn balance_of(&self, address: &Address) -> u128;
}
