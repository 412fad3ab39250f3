//! Encryption service - sealing key material under a password
//!
//! Argon2id derives a 256-bit key from the password and a random salt;
//! ChaCha20-Poly1305 seals the secret. A failed authentication tag is how a
//! wrong password shows up, so opening never needs a separate password hash.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use rand::Rng;
use zeroize::Zeroizing;

use crate::domain::result::{Error, Result};
use crate::domain::{Argon2Params, KeyCrypto, SecretBytes};

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

const KDF_NAME: &str = "argon2id";
const CIPHER_NAME: &str = "chacha20-poly1305";

/// Seals and opens secrets with a fixed set of KDF parameters
#[derive(Debug, Clone, Default)]
pub struct EncryptionService {
    params: Argon2Params,
}

impl EncryptionService {
    pub fn new(params: Argon2Params) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &Argon2Params {
        &self.params
    }

    /// Derive encryption key from password using Argon2id
    fn derive_key(
        &self,
        password: &str,
        salt: &[u8],
        params: &Argon2Params,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let argon2_params = Params::new(
            params.memory_cost,
            params.time_cost,
            params.parallelism,
            Some(params.hash_len as usize),
        )
        .map_err(|e| Error::Encryption(format!("Failed to create argon2 params: {:?}", e)))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

        let mut key = Zeroizing::new(vec![0u8; params.hash_len as usize]);
        argon2
            .hash_password_into(password.as_bytes(), salt, &mut key)
            .map_err(|e| Error::Encryption(format!("Failed to derive key: {:?}", e)))?;

        Ok(key)
    }

    /// Seal `secret` under `password` with a fresh salt and nonce
    pub fn seal(&self, password: &str, secret: &SecretBytes) -> Result<KeyCrypto> {
        let mut rng = rand::thread_rng();
        let salt: [u8; SALT_LEN] = rng.gen();
        let nonce_bytes: [u8; NONCE_LEN] = rng.gen();

        let key = self.derive_key(password, &salt, &self.params)?;
        let cipher = ChaCha20Poly1305::new_from_slice(&key)
            .map_err(|e| Error::Encryption(format!("Invalid key length: {}", e)))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), secret.as_bytes())
            .map_err(|e| Error::Encryption(format!("Failed to seal secret: {}", e)))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        let b64 = base64::engine::general_purpose::STANDARD;
        Ok(KeyCrypto {
            kdf: KDF_NAME.to_string(),
            argon2_params: self.params.clone(),
            salt: b64.encode(salt),
            cipher: CIPHER_NAME.to_string(),
            ciphertext: b64.encode(sealed),
        })
    }

    /// Open a sealed secret.
    ///
    /// `Ok(None)` means the password did not authenticate. `Err` means the
    /// record itself is malformed.
    pub fn open(&self, password: &str, crypto: &KeyCrypto) -> Result<Option<SecretBytes>> {
        if crypto.kdf != KDF_NAME || crypto.cipher != CIPHER_NAME {
            return Err(Error::corruption(format!(
                "unsupported key format {}/{}",
                crypto.kdf, crypto.cipher
            )));
        }

        let b64 = base64::engine::general_purpose::STANDARD;
        let salt = b64
            .decode(&crypto.salt)
            .map_err(|e| Error::corruption(format!("invalid salt: {}", e)))?;
        let sealed = b64
            .decode(&crypto.ciphertext)
            .map_err(|e| Error::corruption(format!("invalid ciphertext: {}", e)))?;
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::corruption("ciphertext too short"));
        }

        // Parameters stored with the record win over ours, so keys sealed
        // with older settings still open.
        let key = self.derive_key(password, &salt, &crypto.argon2_params)?;
        let cipher = ChaCha20Poly1305::new_from_slice(&key)
            .map_err(|e| Error::Encryption(format!("Invalid key length: {}", e)))?;
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

        match cipher.decrypt(Nonce::from_slice(nonce), ciphertext) {
            Ok(plaintext) => Ok(Some(SecretBytes::new(plaintext))),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> EncryptionService {
        EncryptionService::new(Argon2Params::light())
    }

    #[test]
    fn test_seal_then_open() {
        let svc = service();
        let secret = SecretBytes::new(vec![42u8; 32]);
        let crypto = svc.seal("hunter2", &secret).unwrap();

        assert_eq!(crypto.kdf, "argon2id");
        let opened = svc.open("hunter2", &crypto).unwrap().unwrap();
        assert_eq!(opened, secret);
    }

    #[test]
    fn test_wrong_password_does_not_open() {
        let svc = service();
        let crypto = svc.seal("right", &SecretBytes::new(vec![1, 2, 3])).unwrap();
        assert!(svc.open("wrong", &crypto).unwrap().is_none());
    }

    #[test]
    fn test_fresh_salt_per_seal() {
        let svc = service();
        let secret = SecretBytes::new(vec![9; 16]);
        let a = svc.seal("pw", &secret).unwrap();
        let b = svc.seal("pw", &secret).unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_truncated_record_is_corruption() {
        let svc = service();
        let mut crypto = svc.seal("pw", &SecretBytes::new(vec![5; 8])).unwrap();
        crypto.ciphertext = base64::engine::general_purpose::STANDARD.encode([0u8; 4]);
        assert!(matches!(
            svc.open("pw", &crypto),
            Err(Error::StorageCorruption(_))
        ));
    }

    #[test]
    fn test_stored_params_are_used_for_opening() {
        let sealer = service();
        let crypto = sealer.seal("pw", &SecretBytes::new(vec![7; 8])).unwrap();
        // A service configured with heavier defaults still opens it
        let opener = EncryptionService::new(Argon2Params {
            time_cost: 2,
            ..Argon2Params::light()
        });
        assert!(opener.open("pw", &crypto).unwrap().is_some());
    }
}
