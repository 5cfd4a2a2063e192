//! OS keychain backend built on the `keyring` crate.
//!
//! Each secret is one keychain item (`service = gogcli`, `user = <key>`).
//! Platform keychains cannot be enumerated through `keyring`, so the list of
//! keys is kept in an extra item, [`INDEX_KEY`], holding a JSON array.

use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::error::{SecretError, SecretResult};
use crate::keychain_error::translate_keychain_error;
use crate::selector::BackendKind;

use super::SecretBackend;

/// Keychain service name for every gog item.
pub const KEYCHAIN_SERVICE: &str = "gogcli";

/// Item holding the JSON list of stored keys.
pub const INDEX_KEY: &str = "__gog_index__";

/// Stores secrets in the platform keychain.
#[derive(Debug, Clone)]
pub struct KeychainBackend {
    service: String,
}

impl KeychainBackend {
    /// Opens the keychain for `service`.
    ///
    /// Reads the key index once so an unusable or locked keychain is
    /// reported here, before any write is attempted.
    pub fn open(service: impl Into<String>) -> SecretResult<Self> {
        let backend = Self {
            service: service.into(),
        };
        let keys = backend.read_index()?;
        debug!(service = %backend.service, keys = keys.len(), "opened keychain backend");
        Ok(backend)
    }

    fn entry(&self, key: &str) -> SecretResult<keyring::Entry> {
        keyring::Entry::new(&self.service, key).map_err(keychain_failure)
    }

    fn read_index(&self) -> SecretResult<BTreeSet<String>> {
        match self.entry(INDEX_KEY)?.get_secret() {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| {
                SecretError::backend("keychain", format!("key index is corrupt: {}", e))
            }),
            Err(keyring::Error::NoEntry) => Ok(BTreeSet::new()),
            Err(e) => Err(keychain_failure(e)),
        }
    }

    fn write_index(&self, keys: &BTreeSet<String>) -> SecretResult<()> {
        let raw = serde_json::to_vec(keys)?;
        self.entry(INDEX_KEY)?
            .set_secret(&raw)
            .map_err(keychain_failure)
    }
}

fn keychain_failure(err: keyring::Error) -> SecretError {
    translate_keychain_error(SecretError::from(err))
}

fn check_key(key: &str) -> SecretResult<()> {
    if key == INDEX_KEY {
        return Err(SecretError::backend(
            "keychain",
            format!("{:?} is reserved", INDEX_KEY),
        ));
    }
    Ok(())
}

impl SecretBackend for KeychainBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Keychain
    }

    fn set(&self, key: &str, value: &[u8]) -> SecretResult<()> {
        check_key(key)?;
        self.entry(key)?.set_secret(value).map_err(keychain_failure)?;

        let mut keys = self.read_index()?;
        if keys.insert(key.to_string()) {
            self.write_index(&keys)?;
        }
        trace!(key, "stored keychain item");
        Ok(())
    }

    fn get(&self, key: &str) -> SecretResult<Vec<u8>> {
        check_key(key)?;
        match self.entry(key)?.get_secret() {
            Ok(value) => Ok(value),
            Err(keyring::Error::NoEntry) => Err(SecretError::not_found(key)),
            Err(e) => Err(keychain_failure(e)),
        }
    }

    fn remove(&self, key: &str) -> SecretResult<()> {
        check_key(key)?;
        let removed = match self.entry(key)?.delete_credential() {
            Ok(()) => true,
            Err(keyring::Error::NoEntry) => false,
            Err(e) => return Err(keychain_failure(e)),
        };

        let mut keys = self.read_index()?;
        if keys.remove(key) {
            self.write_index(&keys)?;
        }

        if removed {
            Ok(())
        } else {
            Err(SecretError::not_found(key))
        }
    }

    fn keys(&self) -> SecretResult<Vec<String>> {
        Ok(self.read_index()?.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_key_is_reserved() {
        let err = check_key(INDEX_KEY).unwrap_err();
        assert!(err.to_string().contains("reserved"));
        assert!(check_key("token:a@b.com").is_ok());
    }

    #[test]
    fn missing_item_maps_through_translator() {
        let err = keychain_failure(keyring::Error::NoEntry);
        assert!(matches!(err, SecretError::Keychain { .. }));
    }
}
