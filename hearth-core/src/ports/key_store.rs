//! KeyStore port - the component holding encrypted key material

use crate::domain::result::Result;
use crate::domain::{Account, Address, SecretBytes};

/// Encrypted key storage abstraction
///
/// Implementations own the key material and perform verification and
/// re-encryption. Every failure is a typed error; nothing fails silently.
pub trait KeyStore: Send + Sync {
    /// All accounts, in a fixed order (ascending address)
    fn enumerate(&self) -> Result<Vec<Account>>;

    /// One account by address, `NotFound` if unknown
    fn account(&self, address: &Address) -> Result<Account>;

    /// Password hint stored with the account, if any
    fn hint(&self, address: &Address) -> Result<Option<String>> {
        Ok(self.account(address)?.hint)
    }

    /// Check a password against the stored blob without changing anything
    fn verify(&self, address: &Address, password: &str) -> Result<bool>;

    /// Decrypt and hold the key in memory; `WrongPassword` leaves the blob untouched
    fn unlock(&self, address: &Address, password: &str) -> Result<()>;

    /// Drop any in-memory copy of the key
    fn lock(&self, address: &Address) -> Result<()>;

    /// Replace the blob with one sealed under `new_password`.
    ///
    /// Either the old or the new blob must survive any failure.
    fn reencrypt(&self, address: &Address, old_password: &str, new_password: &str) -> Result<()>;

    /// Permanently delete the account's key material
    fn delete_account(&self, address: &Address) -> Result<()>;

    /// Decrypt and hand out the raw secret
    fn export_secret(&self, address: &Address, password: &str) -> Result<SecretBytes>;

    /// Seal a new secret and store it as a new account
    fn insert(
        &self,
        name: &str,
        secret: &SecretBytes,
        password: &str,
        hint: Option<&str>,
    ) -> Result<Account>;
}
