//! Account domain model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::result::Error;

/// Length of an account address in bytes
pub const ADDRESS_LEN: usize = 20;

/// Fixed-size binary account identifier, displayed as `0x`-prefixed hex
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Abridged form for list rows, e.g. `0x1a2b3c…d4e5`
    pub fn abridged(&self) -> String {
        let full = hex::encode(self.0);
        format!("0x{}…{}", &full[..6], &full[full.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(digits)
            .map_err(|e| Error::validation(format!("invalid address '{}': {}", s, e)))?;
        let bytes: [u8; ADDRESS_LEN] = bytes.try_into().map_err(|_| {
            Error::validation(format!(
                "invalid address '{}': expected {} bytes",
                s, ADDRESS_LEN
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Whether the decrypted key is currently held in memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockState {
    Locked,
    Unlocked,
}

/// An address-identified account with an associated encrypted key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    pub name: String,
    pub lock_state: LockState,
    /// Password hint shown when prompting; never the password itself
    pub hint: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(address: Address, name: impl Into<String>) -> Self {
        Self {
            address,
            name: name.into(),
            lock_state: LockState::Locked,
            hint: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.lock_state == LockState::Locked
    }

    /// Label used in prompts and error messages
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            self.address.to_string()
        } else {
            format!("{} ({})", self.name, self.address.abridged())
        }
    }
}
