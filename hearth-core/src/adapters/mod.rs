//! Adapters - concrete implementations of ports
//!
//! Each adapter implements one or more port traits for a specific backend.

pub mod demo_node;
pub mod file_key_store;

pub use demo_node::DemoNode;
pub use file_key_store::FileKeyStore;
