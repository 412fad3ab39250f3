//! Encryption domain models: KDF parameters, key file layout, secret buffers

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::account::Address;

/// Default Argon2id parameters
pub const DEFAULT_TIME_COST: u32 = 3;
pub const DEFAULT_MEMORY_COST: u32 = 65536; // 64 MiB
pub const DEFAULT_PARALLELISM: u32 = 4;
pub const DEFAULT_HASH_LEN: u32 = 32;

/// Current key file format version
pub const KEY_FILE_VERSION: u32 = 1;

/// Argon2id parameters for key derivation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2Params {
    pub time_cost: u32,
    pub memory_cost: u32,
    pub parallelism: u32,
    pub hash_len: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            time_cost: DEFAULT_TIME_COST,
            memory_cost: DEFAULT_MEMORY_COST,
            parallelism: DEFAULT_PARALLELISM,
            hash_len: DEFAULT_HASH_LEN,
        }
    }
}

impl Argon2Params {
    /// Cheap parameters for tests and low-power devices
    pub fn light() -> Self {
        Self {
            time_cost: 1,
            memory_cost: 1024, // 1 MiB
            parallelism: 1,
            hash_len: DEFAULT_HASH_LEN,
        }
    }
}

/// Sealed secret inside a key file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyCrypto {
    pub kdf: String,
    pub argon2_params: Argon2Params,
    /// Base64-encoded random salt
    pub salt: String,
    pub cipher: String,
    /// Base64-encoded nonce followed by ciphertext and tag
    pub ciphertext: String,
}

/// On-disk record of one account, stored as `<address>.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFile {
    pub id: Uuid,
    pub version: u32,
    pub address: Address,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub hint: Option<String>,
    pub created_at: DateTime<Utc>,
    pub crypto: KeyCrypto,
}

/// Decrypted key material. Zeroed on drop, redacted in `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretBytes(Zeroizing<Vec<u8>>);

impl SecretBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.as_bytes()))
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretBytes")
            .field("len", &self.0.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = Argon2Params::default();
        assert_eq!(params.memory_cost, 65536);
        assert_eq!(params.hash_len, 32);
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = SecretBytes::new(vec![0xde, 0xad, 0xbe, 0xef]);
        let printed = format!("{:?}", secret);
        assert!(printed.contains("REDACTED"));
        assert!(!printed.contains("222"));
        assert_eq!(secret.to_hex().as_str(), "deadbeef");
    }
}
