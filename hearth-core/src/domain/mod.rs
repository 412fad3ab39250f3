//! Core domain entities
//!
//! Pure data structures with validation logic - no I/O.

mod account;
mod encryption;
mod network;
mod plugin;
pub mod result;

pub use account::{Account, Address, LockState, ADDRESS_LEN};
pub use encryption::{Argon2Params, KeyCrypto, KeyFile, SecretBytes, KEY_FILE_VERSION};
pub use network::{NetworkPreferences, DEFAULT_LISTEN_PORT};
pub use plugin::{PageOwner, PluginState};
