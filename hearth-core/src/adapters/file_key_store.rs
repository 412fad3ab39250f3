//! File-backed key store
//!
//! One JSON key file per account under the keys directory, named after the
//! account address. Writes go to a temp file in the same directory which is
//! then renamed over the old file, so a crash leaves either the old or the new
//! record, never a partial one. Mutations hold an advisory lock on
//! `<keys_dir>/.lock` so two processes cannot interleave writes.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use fs2::FileExt;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{
    Account, Address, Argon2Params, KeyFile, LockState, SecretBytes, ADDRESS_LEN,
    KEY_FILE_VERSION,
};
use crate::ports::KeyStore;
use crate::services::EncryptionService;

const LOCK_FILE: &str = ".lock";
const KEY_FILE_EXT: &str = "json";

/// Exclusive advisory lock on the keys directory, released on drop
struct DirLock {
    file: File,
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Key store keeping one sealed key file per account
pub struct FileKeyStore {
    keys_dir: PathBuf,
    encryption: EncryptionService,
    unlocked: Mutex<HashMap<Address, SecretBytes>>,
}

impl FileKeyStore {
    /// Open (creating if needed) a key store with default KDF parameters
    pub fn open(keys_dir: &Path) -> Result<Self> {
        Self::with_params(keys_dir, Argon2Params::default())
    }

    /// Open a key store sealing new keys with the given KDF parameters
    pub fn with_params(keys_dir: &Path, params: Argon2Params) -> Result<Self> {
        fs::create_dir_all(keys_dir)?;
        Ok(Self {
            keys_dir: keys_dir.to_path_buf(),
            encryption: EncryptionService::new(params),
            unlocked: Mutex::new(HashMap::new()),
        })
    }

    pub fn keys_dir(&self) -> &Path {
        &self.keys_dir
    }

    /// Address of a secret: the last 20 bytes of its SHA-256 digest
    pub fn address_for(secret: &SecretBytes) -> Address {
        let digest = Sha256::digest(secret.as_bytes());
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&digest[digest.len() - ADDRESS_LEN..]);
        Address::from_bytes(bytes)
    }

    pub(crate) fn key_path(&self, address: &Address) -> PathBuf {
        self.keys_dir
            .join(format!("{}.{}", hex::encode(address.as_bytes()), KEY_FILE_EXT))
    }

    fn dir_lock(&self) -> Result<DirLock> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(self.keys_dir.join(LOCK_FILE))?;
        file.lock_exclusive()?;
        Ok(DirLock { file })
    }

    fn read_key_file(&self, address: &Address) -> Result<KeyFile> {
        let path = self.key_path(address);
        if !path.exists() {
            return Err(Error::not_found(format!("account {}", address)));
        }
        Self::parse_key_file(&path)
    }

    fn parse_key_file(path: &Path) -> Result<KeyFile> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            Error::corruption(format!("unreadable key file {}: {}", path.display(), e))
        })
    }

    /// Write-new-then-swap
    fn write_key_file(&self, key_file: &KeyFile) -> Result<()> {
        let mut temp = NamedTempFile::new_in(&self.keys_dir)?;
        let content = serde_json::to_string_pretty(key_file)?;
        temp.write_all(content.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(self.key_path(&key_file.address))
            .map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    fn lock_state(&self, address: &Address) -> LockState {
        let unlocked = self
            .unlocked
            .lock()
            .map(|u| u.contains_key(address))
            .unwrap_or(false);
        if unlocked {
            LockState::Unlocked
        } else {
            LockState::Locked
        }
    }

    fn to_account(&self, key_file: &KeyFile) -> Account {
        Account {
            address: key_file.address,
            name: key_file.name.clone(),
            lock_state: self.lock_state(&key_file.address),
            hint: key_file.hint.clone(),
            created_at: key_file.created_at,
        }
    }

    fn open_secret(&self, key_file: &KeyFile, password: &str) -> Result<SecretBytes> {
        self.encryption
            .open(password, &key_file.crypto)?
            .ok_or_else(|| Error::wrong_password(key_file.address.to_string()))
    }

    fn forget(&self, address: &Address) -> Result<()> {
        let mut unlocked = self
            .unlocked
            .lock()
            .map_err(|e| Error::Other(format!("Lock poisoned: {}", e)))?;
        unlocked.remove(address);
        Ok(())
    }
}

impl KeyStore for FileKeyStore {
    fn enumerate(&self) -> Result<Vec<Account>> {
        let mut accounts = Vec::new();

        for entry in fs::read_dir(&self.keys_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(KEY_FILE_EXT) {
                continue;
            }
            match Self::parse_key_file(&path) {
                Ok(key_file) => accounts.push(self.to_account(&key_file)),
                Err(e) => eprintln!("[hearth] Skipping key file: {}", e),
            }
        }

        accounts.sort_by(|a, b| a.address.cmp(&b.address));
        Ok(accounts)
    }

    fn account(&self, address: &Address) -> Result<Account> {
        let key_file = self.read_key_file(address)?;
        Ok(self.to_account(&key_file))
    }

    fn verify(&self, address: &Address, password: &str) -> Result<bool> {
        let key_file = self.read_key_file(address)?;
        Ok(self.encryption.open(password, &key_file.crypto)?.is_some())
    }

    fn unlock(&self, address: &Address, password: &str) -> Result<()> {
        let key_file = self.read_key_file(address)?;
        let secret = self.open_secret(&key_file, password)?;
        let mut unlocked = self
            .unlocked
            .lock()
            .map_err(|e| Error::Other(format!("Lock poisoned: {}", e)))?;
        unlocked.insert(*address, secret);
        Ok(())
    }

    fn lock(&self, address: &Address) -> Result<()> {
        // Make sure the account exists so an unknown address is reported
        self.read_key_file(address)?;
        self.forget(address)
    }

    fn reencrypt(&self, address: &Address, old_password: &str, new_password: &str) -> Result<()> {
        let _guard = self.dir_lock()?;

        let key_file = self.read_key_file(address)?;
        let secret = self.open_secret(&key_file, old_password)?;
        let crypto = self.encryption.seal(new_password, &secret)?;

        self.write_key_file(&KeyFile {
            crypto,
            ..key_file
        })?;

        // The swapped-in record must open under the new password to the same secret
        let stored = self.read_key_file(address).map_err(|e| {
            Error::corruption(format!("account {} after re-encryption: {}", address, e))
        })?;
        match self.encryption.open(new_password, &stored.crypto) {
            Ok(Some(reopened)) if reopened == secret => Ok(()),
            _ => Err(Error::corruption(format!(
                "account {} did not verify after re-encryption",
                address
            ))),
        }
    }

    fn delete_account(&self, address: &Address) -> Result<()> {
        let _guard = self.dir_lock()?;

        let path = self.key_path(address);
        if !path.exists() {
            return Err(Error::not_found(format!("account {}", address)));
        }
        fs::remove_file(&path)?;
        self.forget(address)
    }

    fn export_secret(&self, address: &Address, password: &str) -> Result<SecretBytes> {
        let key_file = self.read_key_file(address)?;
        self.open_secret(&key_file, password)
    }

    fn insert(
        &self,
        name: &str,
        secret: &SecretBytes,
        password: &str,
        hint: Option<&str>,
    ) -> Result<Account> {
        if secret.is_empty() {
            return Err(Error::validation("secret must not be empty"));
        }

        let _guard = self.dir_lock()?;

        let address = Self::address_for(secret);
        if self.key_path(&address).exists() {
            return Err(Error::validation(format!("account {} already exists", address)));
        }

        let key_file = KeyFile {
            id: Uuid::new_v4(),
            version: KEY_FILE_VERSION,
            address,
            name: name.to_string(),
            hint: hint.filter(|h| !h.is_empty()).map(str::to_string),
            created_at: Utc::now(),
            crypto: self.encryption.seal(password, secret)?,
        };
        self.write_key_file(&key_file)?;

        Ok(self.to_account(&key_file))
    }
}
