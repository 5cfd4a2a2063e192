//! Encrypted file vault.
//!
//! All secrets live in one file, `keyring.vault`, inside the keyring
//! directory. The file is a JSON envelope:
//!
//! ```text
//! { "version": 1,
//!   "argon2": { "memory_kib": .., "iterations": .., "parallelism": .. },
//!   "salt": base64(16 bytes),
//!   "data": base64(nonce(12) || AES-256-GCM(json map key -> base64 value)) }
//! ```
//!
//! The AES key is derived from the vault password with Argon2id. The file is
//! rewritten atomically (temp file + rename) with mode 0600 on every change.
//!
//! Every operation holds an advisory lock on `keyring.vault.lock` and reads
//! the vault from disk inside it, so concurrent processes sharing one vault
//! never overwrite each other's entries.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use fs2::FileExt;
use rand::Rng as _;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::error::{SecretError, SecretResult};
use crate::password::{PasswordFunc, VAULT_PASSWORD_PROMPT};
use crate::selector::BackendKind;

use super::SecretBackend;

/// Name of the vault file inside the keyring directory.
pub const VAULT_FILE_NAME: &str = "keyring.vault";

const LOCK_FILE_NAME: &str = "keyring.vault.lock";
const VAULT_VERSION: u8 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Argon2id cost parameters, stored in the envelope so they can change
/// without breaking existing vaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct VaultEnvelope {
    version: u8,
    argon2: Argon2Params,
    salt: String,
    data: String,
}

/// Key derived for one salt and parameter set.
struct DerivedKey {
    salt: [u8; SALT_LEN],
    params: Argon2Params,
    key: Zeroizing<[u8; KEY_LEN]>,
}

/// Decrypted vault contents as read from disk.
struct Snapshot {
    entries: BTreeMap<String, String>,
    exists: bool,
}

/// Exclusive advisory lock, released on drop.
struct VaultLock(File);

impl Drop for VaultLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

/// Password-protected vault file.
pub struct FileVaultBackend {
    path: PathBuf,
    lock_path: PathBuf,
    password: Zeroizing<String>,
    /// Costs used when this process creates the vault.
    params: Argon2Params,
    key: Mutex<Option<DerivedKey>>,
}

impl std::fmt::Debug for FileVaultBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileVaultBackend")
            .field("path", &self.path)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl FileVaultBackend {
    /// Opens (or prepares) the vault in `dir` with default Argon2 costs.
    pub fn open(dir: &Path, password: &PasswordFunc) -> SecretResult<Self> {
        Self::open_with_params(dir, password, Argon2Params::default())
    }

    /// Opens the vault in `dir`.
    ///
    /// An existing vault is decrypted once to check the password and keeps
    /// the Argon2 parameters recorded in its envelope; `params` only applies
    /// to a new vault. A new vault is not written until the first secret is
    /// stored.
    pub fn open_with_params(
        dir: &Path,
        password: &PasswordFunc,
        params: Argon2Params,
    ) -> SecretResult<Self> {
        gog_core::ensure_private_dir(dir)?;
        let backend = Self {
            path: dir.join(VAULT_FILE_NAME),
            lock_path: dir.join(LOCK_FILE_NAME),
            password: Zeroizing::new(password(VAULT_PASSWORD_PROMPT)?),
            params,
            key: Mutex::new(None),
        };

        let _lock = backend.acquire()?;
        let snapshot = backend.load()?;
        if snapshot.exists {
            debug!(path = %backend.path.display(), entries = snapshot.entries.len(), "unlocked keyring vault");
        } else {
            info!(path = %backend.path.display(), "creating new keyring vault");
        }
        Ok(backend)
    }

    /// Path of the vault file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn acquire(&self) -> SecretResult<VaultLock> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = file.set_permissions(fs::Permissions::from_mode(0o600));
        }

        file.lock_exclusive().map_err(|e| {
            SecretError::vault(format!(
                "failed to lock {}: {}",
                self.lock_path.display(),
                e
            ))
        })?;
        Ok(VaultLock(file))
    }

    fn cached_key(&self) -> SecretResult<std::sync::MutexGuard<'_, Option<DerivedKey>>> {
        self.key
            .lock()
            .map_err(|_| SecretError::backend("file", "lock poisoned"))
    }

    /// Returns the key for `salt`, deriving it only when the salt or costs
    /// changed since the last call.
    fn key_for(
        &self,
        salt: [u8; SALT_LEN],
        params: Argon2Params,
    ) -> SecretResult<Zeroizing<[u8; KEY_LEN]>> {
        let mut cached = self.cached_key()?;
        if let Some(derived) = cached.as_ref()
            && derived.salt == salt
            && derived.params == params
        {
            return Ok(derived.key.clone());
        }
        let key = derive_key(&self.password, &salt, &params)?;
        *cached = Some(DerivedKey {
            salt,
            params,
            key: key.clone(),
        });
        Ok(key)
    }

    /// Reads and decrypts the vault. Callers hold the vault lock.
    fn load(&self) -> SecretResult<Snapshot> {
        if !self.path.exists() {
            return Ok(Snapshot {
                entries: BTreeMap::new(),
                exists: false,
            });
        }

        let raw = fs::read(&self.path)?;
        let envelope: VaultEnvelope = serde_json::from_slice(&raw)
            .map_err(|e| SecretError::vault(format!("unreadable vault envelope: {}", e)))?;
        if envelope.version != VAULT_VERSION {
            return Err(SecretError::vault(format!(
                "unsupported vault version {}",
                envelope.version
            )));
        }

        let salt = decode_salt(&envelope.salt)?;
        let key = self.key_for(salt, envelope.argon2)?;
        let blob = BASE64
            .decode(&envelope.data)
            .map_err(|e| SecretError::vault(format!("vault data is not base64: {}", e)))?;
        let plaintext = Zeroizing::new(decrypt(&key, &blob)?);
        let entries = serde_json::from_slice(&plaintext)
            .map_err(|e| SecretError::vault(format!("vault payload is corrupt: {}", e)))?;
        Ok(Snapshot {
            entries,
            exists: true,
        })
    }

    /// Runs `change` on a fresh read of the vault and writes the result, all
    /// under the vault lock.
    fn update<T>(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, String>) -> SecretResult<T>,
    ) -> SecretResult<T> {
        let _lock = self.acquire()?;
        let mut snapshot = self.load()?;
        let out = change(&mut snapshot.entries)?;
        self.flush(&snapshot.entries)?;
        Ok(out)
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> SecretResult<()> {
        // an existing vault keeps its salt and costs; a new one gets fresh ones
        let (salt, params) = match self.cached_key()?.as_ref() {
            Some(derived) if self.path.exists() => (derived.salt, derived.params),
            _ => {
                let mut salt = [0u8; SALT_LEN];
                rand::rng().fill(&mut salt);
                (salt, self.params)
            }
        };
        let key = self.key_for(salt, params)?;

        let plaintext = Zeroizing::new(serde_json::to_vec(entries)?);
        let blob = encrypt(&key, &plaintext)?;
        let envelope = VaultEnvelope {
            version: VAULT_VERSION,
            argon2: params,
            salt: BASE64.encode(salt),
            data: BASE64.encode(blob),
        };
        let content = serde_json::to_vec_pretty(&envelope)?;

        let temp_path = self.path.with_extension("vault.tmp");
        fs::write(&temp_path, &content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&temp_path, &self.path)?;
        debug!(path = %self.path.display(), entries = entries.len(), "saved keyring vault");
        Ok(())
    }
}

fn decode_salt(encoded: &str) -> SecretResult<[u8; SALT_LEN]> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| SecretError::vault(format!("vault salt is not base64: {}", e)))?;
    bytes
        .try_into()
        .map_err(|_| SecretError::vault("vault salt has the wrong length"))
}

fn derive_key(
    password: &str,
    salt: &[u8; SALT_LEN],
    params: &Argon2Params,
) -> SecretResult<Zeroizing<[u8; KEY_LEN]>> {
    let argon_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| SecretError::vault(format!("invalid argon2 parameters: {}", e)))?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params)
        .hash_password_into(password.as_bytes(), salt, &mut key[..])
        .map_err(|e| SecretError::vault(format!("key derivation failed: {}", e)))?;
    Ok(key)
}

fn cipher(key: &[u8; KEY_LEN]) -> SecretResult<Aes256Gcm> {
    Aes256Gcm::new_from_slice(key).map_err(|_| SecretError::vault("invalid vault key length"))
}

fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> SecretResult<Vec<u8>> {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill(&mut nonce);

    let ciphertext = cipher(key)?
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| SecretError::vault("encryption failed"))?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

fn decrypt(key: &[u8; KEY_LEN], blob: &[u8]) -> SecretResult<Vec<u8>> {
    if blob.len() < NONCE_LEN {
        return Err(SecretError::vault("vault data is truncated"));
    }
    let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
    cipher(key)?
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| SecretError::WrongPassword)
}

impl SecretBackend for FileVaultBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::File
    }

    fn set(&self, key: &str, value: &[u8]) -> SecretResult<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), BASE64.encode(value));
            Ok(())
        })
    }

    fn get(&self, key: &str) -> SecretResult<Vec<u8>> {
        let snapshot = {
            let _lock = self.acquire()?;
            self.load()?
        };
        let encoded = snapshot
            .entries
            .get(key)
            .ok_or_else(|| SecretError::not_found(key))?;
        BASE64
            .decode(encoded)
            .map_err(|e| SecretError::vault(format!("stored value for {} is corrupt: {}", key, e)))
    }

    fn remove(&self, key: &str) -> SecretResult<()> {
        self.update(|entries| match entries.remove(key) {
            Some(_) => Ok(()),
            None => Err(SecretError::not_found(key)),
        })
    }

    fn keys(&self) -> SecretResult<Vec<String>> {
        let _lock = self.acquire()?;
        Ok(self.load()?.entries.into_keys().collect())
    }
}
