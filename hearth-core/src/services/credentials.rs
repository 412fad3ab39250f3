//! Credential controller - user-facing key operations
//!
//! Orchestrates kill / re-encrypt / export / unlock against a [`KeyStore`],
//! runs password prompts with the shell stopped, and tells the UI list model
//! when the set of keys changed.
//!
//! Mutations of one account are serialized by a per-account mutex. `kill` and
//! `reencrypt_all` take the whole store exclusively.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use rand::RngCore;
use serde::Serialize;
use zeroize::Zeroizing;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, Address, SecretBytes};
use crate::ports::{KeyStore, PasswordPrompt, PromptOutcome};
use crate::services::activity::{ActivityControl, SuspendGuard};
use crate::services::logging::{LogEvent, ShellLog};

/// Size of a freshly generated account secret
pub const NEW_SECRET_LEN: usize = 32;

const REENCRYPT_TITLE: &str = "Re-encrypt key";

/// Called with the current account list after keys were added, removed or re-encrypted
pub type KeysChanged = Box<dyn Fn(&[Account]) + Send + Sync>;

/// Accounts re-encrypted by a successful `reencrypt_all`, in processing order
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReencryptReport {
    pub reencrypted: Vec<Address>,
}

/// `reencrypt_all` stopped early
///
/// Accounts in `completed` keep their new password; `failed` and every
/// account after it are untouched. `failed` is `None` when the batch failed
/// before reaching any account.
#[derive(Debug)]
pub struct ReencryptAllError {
    pub completed: Vec<Address>,
    pub failed: Option<Address>,
    pub source: Error,
}

impl fmt::Display for ReencryptAllError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.failed {
            Some(address) => write!(
                f,
                "re-encryption stopped at account {} after {} account(s): {}",
                address,
                self.completed.len(),
                self.source
            ),
            None => write!(f, "re-encryption did not start: {}", self.source),
        }
    }
}

impl std::error::Error for ReencryptAllError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

pub struct CredentialController {
    store: Arc<dyn KeyStore>,
    activity: Arc<dyn ActivityControl>,
    log: Arc<ShellLog>,
    store_lock: RwLock<()>,
    account_locks: Mutex<HashMap<Address, Arc<Mutex<()>>>>,
    listeners: Mutex<Vec<KeysChanged>>,
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> Error {
    Error::Other(format!("Lock poisoned: {}", e))
}

fn check_new_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(Error::validation("new password must not be empty"));
    }
    Ok(())
}

impl CredentialController {
    pub fn new(store: Arc<dyn KeyStore>, activity: Arc<dyn ActivityControl>) -> Self {
        Self {
            store,
            activity,
            log: Arc::new(ShellLog::default()),
            store_lock: RwLock::new(()),
            account_locks: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Share the shell's log so operations show up in the log pane and event log
    pub fn with_log(mut self, log: Arc<ShellLog>) -> Self {
        self.log = log;
        self
    }

    pub fn store(&self) -> &Arc<dyn KeyStore> {
        &self.store
    }

    /// Register a keys-changed listener
    pub fn on_keys_changed<F>(&self, listener: F)
    where
        F: Fn(&[Account]) + Send + Sync + 'static,
    {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(Box::new(listener));
        }
    }

    /// Rows for the account list, ascending by address
    pub fn accounts(&self) -> Result<Vec<Account>> {
        self.store.enumerate()
    }

    pub fn account(&self, address: &Address) -> Result<Account> {
        self.store.account(address)
    }

    fn account_lock(&self, address: &Address) -> Result<Arc<Mutex<()>>> {
        let mut locks = self.account_locks.lock().map_err(poisoned)?;
        Ok(Arc::clone(locks.entry(*address).or_default()))
    }

    fn keys_changed(&self) {
        let accounts = match self.store.enumerate() {
            Ok(accounts) => accounts,
            Err(e) => {
                self.log.warn("keys", format!("could not refresh account list: {}", e));
                return;
            }
        };
        if let Ok(listeners) = self.listeners.lock() {
            for listener in listeners.iter() {
                listener(&accounts);
            }
        }
    }

    fn record<T>(&self, operation: &str, address: Option<&Address>, result: &Result<T>) {
        let mut event = LogEvent::new(operation).with_operation(operation);
        if let Some(address) = address {
            event = event.with_account(address.to_string());
        }
        if let Err(e) = result {
            event = event.with_error(e.kind());
            let subject = address.map(|a| a.to_string()).unwrap_or_else(|| "keys".into());
            self.log.note("keys", format!("{} failed for {}: {}", operation, subject, e));
        }
        self.log.event(event);
    }

    /// Permanently delete an account's key material
    ///
    /// Confirmation is the caller's job; once called the deletion is final.
    pub fn kill(&self, address: &Address) -> Result<()> {
        let result = (|| {
            let _store = self.store_lock.write().map_err(poisoned)?;
            self.store.delete_account(address)
        })();

        self.record("kill", Some(address), &result);
        if result.is_ok() {
            if let Ok(mut locks) = self.account_locks.lock() {
                locks.remove(address);
            }
            self.keys_changed();
        }
        result
    }

    /// Seal the account's key under `new_password`
    ///
    /// `WrongPassword` leaves the stored key unchanged.
    pub fn reencrypt(&self, address: &Address, old_password: &str, new_password: &str) -> Result<()> {
        let result = (|| {
            check_new_password(new_password)?;
            let _store = self.store_lock.read().map_err(poisoned)?;
            let lock = self.account_lock(address)?;
            let _account = lock.lock().map_err(poisoned)?;
            self.store.reencrypt(address, old_password, new_password)
        })();

        self.record("reencrypt", Some(address), &result);
        if result.is_ok() {
            self.keys_changed();
        }
        result
    }

    /// Prompt for the old password (showing the stored hint) and re-encrypt
    pub fn reencrypt_interactive(
        &self,
        address: &Address,
        new_password: &str,
        prompt: &dyn PasswordPrompt,
    ) -> Result<()> {
        check_new_password(new_password)?;
        let account = self.store.account(address)?;
        let old = self
            .get_password(
                REENCRYPT_TITLE,
                &format!("account {}", account.label()),
                account.hint.as_deref(),
                prompt,
            )
            .into_result(&format!("re-encrypting {}", address))?;
        self.reencrypt(address, &old, new_password)
    }

    /// Re-encrypt every account under `new_password`, ascending by address
    ///
    /// The old password of each account is asked for through `prompt` with
    /// the shell stopped for the whole batch. The first wrong password or
    /// cancelled prompt ends the batch; accounts already done stay done.
    pub fn reencrypt_all(
        &self,
        new_password: &str,
        prompt: &dyn PasswordPrompt,
    ) -> std::result::Result<ReencryptReport, ReencryptAllError> {
        let mut completed = Vec::new();
        let outcome = self.reencrypt_batch(new_password, prompt, &mut completed);

        if !completed.is_empty() {
            self.keys_changed();
        }

        match outcome {
            Ok(()) => {
                self.log.event(
                    LogEvent::new("reencrypt_all").with_operation("reencrypt_all"),
                );
                Ok(ReencryptReport {
                    reencrypted: completed,
                })
            }
            Err((failed, source)) => {
                let mut event = LogEvent::new("reencrypt_all")
                    .with_operation("reencrypt_all")
                    .with_error(source.kind())
                    .with_error_details(format!("{} account(s) completed", completed.len()));
                if let Some(address) = &failed {
                    event = event.with_account(address.to_string());
                }
                self.log.event(event);
                Err(ReencryptAllError {
                    completed,
                    failed,
                    source,
                })
            }
        }
    }

    fn reencrypt_batch(
        &self,
        new_password: &str,
        prompt: &dyn PasswordPrompt,
        completed: &mut Vec<Address>,
    ) -> std::result::Result<(), (Option<Address>, Error)> {
        check_new_password(new_password).map_err(|e| (None, e))?;
        let _store = self
            .store_lock
            .write()
            .map_err(|e| (None, poisoned(e)))?;
        let accounts = self.store.enumerate().map_err(|e| (None, e))?;

        let _suspended = SuspendGuard::new(self.activity.as_ref());
        for account in accounts {
            let address = account.address;
            let old = prompt
                .get_password(
                    REENCRYPT_TITLE,
                    &format!("account {}", account.label()),
                    account.hint.as_deref(),
                )
                .into_result(&format!("re-encrypting {}", address))
                .map_err(|e| (Some(address), e))?;

            self.store
                .reencrypt(&address, &old, new_password)
                .map_err(|e| (Some(address), e))?;
            completed.push(address);
        }
        Ok(())
    }

    /// Decrypt and hand over the raw secret
    ///
    /// The controller keeps no copy; the returned value is zeroed when dropped.
    pub fn export_key(&self, address: &Address, password: &str) -> Result<SecretBytes> {
        let result = (|| {
            let _store = self.store_lock.read().map_err(poisoned)?;
            let lock = self.account_lock(address)?;
            let _account = lock.lock().map_err(poisoned)?;
            self.store.export_secret(address, password)
        })();

        self.record("export", Some(address), &result);
        result
    }

    /// Blocking prompt with background activity stopped
    ///
    /// A cancelled prompt never carries a password; use
    /// [`PromptOutcome::into_parts`] for the `(password, ok)` view.
    pub fn get_password(
        &self,
        title: &str,
        for_what: &str,
        hint: Option<&str>,
        prompt: &dyn PasswordPrompt,
    ) -> PromptOutcome {
        let _suspended = SuspendGuard::new(self.activity.as_ref());
        prompt.get_password(title, for_what, hint)
    }

    /// Generate a fresh secret and store it as a new account
    pub fn create_account(&self, name: &str, password: &str, hint: Option<&str>) -> Result<Account> {
        let mut bytes = Zeroizing::new(vec![0u8; NEW_SECRET_LEN]);
        rand::thread_rng().fill_bytes(&mut bytes);
        let secret = SecretBytes::new(bytes.to_vec());
        self.insert("create", name, &secret, password, hint)
    }

    /// Store an existing secret as a new account
    pub fn import_secret(
        &self,
        name: &str,
        secret: &SecretBytes,
        password: &str,
        hint: Option<&str>,
    ) -> Result<Account> {
        self.insert("import", name, secret, password, hint)
    }

    fn insert(
        &self,
        operation: &str,
        name: &str,
        secret: &SecretBytes,
        password: &str,
        hint: Option<&str>,
    ) -> Result<Account> {
        let result = (|| {
            check_new_password(password)?;
            if hint.is_some_and(|h| !h.is_empty() && h == password) {
                return Err(Error::validation("hint must not be the password"));
            }
            let _store = self.store_lock.read().map_err(poisoned)?;
            self.store.insert(name, secret, password, hint)
        })();

        let address = result.as_ref().ok().map(|a| a.address);
        self.record(operation, address.as_ref(), &result);
        if result.is_ok() {
            self.keys_changed();
        }
        result
    }

    pub fn unlock(&self, address: &Address, password: &str) -> Result<()> {
        let result = (|| {
            let _store = self.store_lock.read().map_err(poisoned)?;
            let lock = self.account_lock(address)?;
            let _account = lock.lock().map_err(poisoned)?;
            self.store.unlock(address, password)
        })();

        self.record("unlock", Some(address), &result);
        if result.is_ok() {
            self.keys_changed();
        }
        result
    }

    pub fn lock(&self, address: &Address) -> Result<()> {
        let result = (|| {
            let _store = self.store_lock.read().map_err(poisoned)?;
            let lock = self.account_lock(address)?;
            let _account = lock.lock().map_err(poisoned)?;
            self.store.lock(address)
        })();

        self.record("lock", Some(address), &result);
        if result.is_ok() {
            self.keys_changed();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::FileKeyStore;
    use crate::domain::Argon2Params;
    use crate::ports::ScriptedPrompt;
    use crate::services::activity::NoActivity;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::{tempdir, TempDir};

    #[derive(Default)]
    struct CountingActivity {
        stops: AtomicUsize,
        resumes: AtomicUsize,
        stopped: Mutex<bool>,
    }

    impl ActivityControl for CountingActivity {
        fn all_stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
            *self.stopped.lock().unwrap() = true;
        }

        fn carry_on(&self) {
            self.resumes.fetch_add(1, Ordering::SeqCst);
            *self.stopped.lock().unwrap() = false;
        }

        fn is_stopped(&self) -> bool {
            *self.stopped.lock().unwrap()
        }
    }

    fn controller(dir: &TempDir, activity: Arc<dyn ActivityControl>) -> CredentialController {
        let store = FileKeyStore::with_params(dir.path(), Argon2Params::light()).unwrap();
        CredentialController::new(Arc::new(store), activity)
    }

    #[test]
    fn test_create_account_then_export() {
        let dir = tempdir().unwrap();
        let credentials = controller(&dir, Arc::new(NoActivity));

        let account = credentials.create_account("main", "pw", Some("the usual")).unwrap();
        let secret = credentials.export_key(&account.address, "pw").unwrap();
        assert_eq!(secret.len(), NEW_SECRET_LEN);
        assert_eq!(FileKeyStore::address_for(&secret), account.address);

        assert!(matches!(
            credentials.export_key(&account.address, "nope"),
            Err(Error::WrongPassword(_))
        ));
    }

    #[test]
    fn test_hint_equal_to_password_rejected() {
        let dir = tempdir().unwrap();
        let credentials = controller(&dir, Arc::new(NoActivity));
        assert!(matches!(
            credentials.create_account("main", "pw", Some("pw")),
            Err(Error::Validation(_))
        ));
        assert!(credentials.accounts().unwrap().is_empty());
    }

    #[test]
    fn test_keys_changed_fires_after_mutations() {
        let dir = tempdir().unwrap();
        let credentials = controller(&dir, Arc::new(NoActivity));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        credentials.on_keys_changed(move |accounts| sink.lock().unwrap().push(accounts.len()));

        let account = credentials.create_account("a", "pw", None).unwrap();
        credentials.reencrypt(&account.address, "pw", "pw2").unwrap();
        assert!(credentials.reencrypt(&account.address, "wrong", "pw3").is_err());
        credentials.kill(&account.address).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1, 1, 0]);
    }

    #[test]
    fn test_get_password_is_bracketed() {
        let dir = tempdir().unwrap();
        let activity = Arc::new(CountingActivity::default());
        let credentials = controller(&dir, Arc::clone(&activity) as Arc<dyn ActivityControl>);

        let prompt = ScriptedPrompt::new([Some("secret"), None]);
        let (password, ok) = credentials
            .get_password("Unlock", "account x", None, &prompt)
            .into_parts();
        assert!(ok);
        assert_eq!(password.as_str(), "secret");

        let (password, ok) = credentials
            .get_password("Unlock", "account x", None, &prompt)
            .into_parts();
        assert!(!ok);
        assert!(password.is_empty());

        assert_eq!(activity.stops.load(Ordering::SeqCst), 2);
        assert_eq!(activity.resumes.load(Ordering::SeqCst), 2);
        assert!(!activity.is_stopped());
    }

    #[test]
    fn test_reencrypt_interactive_shows_hint() {
        let dir = tempdir().unwrap();
        let credentials = controller(&dir, Arc::new(NoActivity));
        let account = credentials.create_account("a", "old", Some("first pet")).unwrap();

        let prompt = ScriptedPrompt::new([Some("old")]);
        credentials
            .reencrypt_interactive(&account.address, "new", &prompt)
            .unwrap();
        assert_eq!(prompt.seen()[0].hint.as_deref(), Some("first pet"));
        assert!(credentials.store().verify(&account.address, "new").unwrap());

        let cancelled = ScriptedPrompt::new([None::<String>]);
        assert!(matches!(
            credentials.reencrypt_interactive(&account.address, "newer", &cancelled),
            Err(Error::Cancelled(_))
        ));
        assert!(credentials.store().verify(&account.address, "new").unwrap());
    }

    #[test]
    fn test_empty_new_password_rejected() {
        let dir = tempdir().unwrap();
        let credentials = controller(&dir, Arc::new(NoActivity));
        let account = credentials.create_account("a", "pw", None).unwrap();

        assert!(matches!(
            credentials.reencrypt(&account.address, "pw", ""),
            Err(Error::Validation(_))
        ));
        let err = credentials
            .reencrypt_all("", &ScriptedPrompt::always("pw"))
            .unwrap_err();
        assert!(err.failed.is_none());
        assert!(err.completed.is_empty());
    }

    #[test]
    fn test_unknown_account_not_found() {
        let dir = tempdir().unwrap();
        let credentials = controller(&dir, Arc::new(NoActivity));
        let address: Address = "0x0000000000000000000000000000000000000001".parse().unwrap();

        assert!(matches!(credentials.kill(&address), Err(Error::NotFound(_))));
        assert!(matches!(credentials.unlock(&address, "pw"), Err(Error::NotFound(_))));
        assert!(matches!(
            credentials.reencrypt(&address, "pw", "new"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_lock_failure_reaches_the_log() {
        let dir = tempdir().unwrap();
        let log = Arc::new(ShellLog::default());
        let credentials = controller(&dir, Arc::new(NoActivity)).with_log(Arc::clone(&log));
        let address: Address = "0x0000000000000000000000000000000000000002".parse().unwrap();

        assert!(matches!(credentials.lock(&address), Err(Error::NotFound(_))));
        assert!(log
            .lines()
            .iter()
            .any(|l| l.source == "keys" && l.message.starts_with("lock failed for")));
    }
}
