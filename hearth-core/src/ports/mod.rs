//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external collaborators. The core depends
//! only on these traits, not on concrete implementations.

mod key_store;
mod node;
mod prompt;

pub use key_store::KeyStore;
pub use node::NodeClient;
pub use prompt::{PasswordPrompt, PromptOutcome, PromptRecord, ScriptedPrompt};
