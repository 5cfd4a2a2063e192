//! Storage mediums behind the secret store.
//!
//! Each backend can set, get, remove and enumerate opaque byte secrets by
//! key. The [`SecretStore`](crate::SecretStore) picks one at open time and
//! never inspects which one it holds afterwards.

mod file;
mod keychain;
mod memory;

pub use file::{Argon2Params, FileVaultBackend, VAULT_FILE_NAME};
pub use keychain::{INDEX_KEY, KEYCHAIN_SERVICE, KeychainBackend};
pub use memory::MemoryBackend;

use crate::error::SecretResult;
use crate::selector::BackendKind;

/// A secret storage medium.
pub trait SecretBackend: Send + Sync {
    /// Which medium this is.
    fn kind(&self) -> BackendKind;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> SecretResult<()>;

    /// Reads the value under `key`.
    ///
    /// Returns [`SecretError::NotFound`](crate::SecretError::NotFound) when
    /// the key is absent; never an empty success.
    fn get(&self, key: &str) -> SecretResult<Vec<u8>>;

    /// Removes `key`. Returns `NotFound` when it was not stored.
    fn remove(&self, key: &str) -> SecretResult<()>;

    /// Lists every stored key exactly once, in no particular order.
    fn keys(&self) -> SecretResult<Vec<String>>;
}
