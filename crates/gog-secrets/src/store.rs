//! Backend-agnostic secret store.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::{
    Argon2Params, FileVaultBackend, KEYCHAIN_SERVICE, KeychainBackend, MemoryBackend,
    SecretBackend,
};
use crate::error::{SecretError, SecretResult};
use crate::password::{PasswordSource, file_password_func};
use crate::selector::{BackendKind, KeyringBackendInfo, allowed_backends};

/// Everything needed to open a [`SecretStore`].
#[derive(Clone)]
pub struct StoreOptions {
    /// Requested backend and where that request came from.
    pub backend: KeyringBackendInfo,
    /// Directory of the encrypted file vault.
    pub file_dir: PathBuf,
    /// Configured vault password; an empty result means "ask".
    password: PasswordSource,
    /// Whether the vault password may be prompted for on a terminal.
    pub prompt_allowed: bool,
    /// Argon2 costs for a newly created vault.
    pub argon2: Argon2Params,
}

impl StoreOptions {
    /// Options for `backend` with the vault in `file_dir`.
    pub fn new(backend: KeyringBackendInfo, file_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            file_dir: file_dir.into(),
            password: Arc::new(|| Ok(String::new())),
            prompt_allowed: true,
            argon2: Argon2Params::default(),
        }
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        let password = password.into();
        self.password = Arc::new(move || Ok(password.clone()));
        self
    }

    /// Defers reading the password until the file vault is opened.
    #[must_use]
    pub fn with_password_source(
        mut self,
        source: impl Fn() -> SecretResult<String> + Send + Sync + 'static,
    ) -> Self {
        self.password = Arc::new(source);
        self
    }

    /// Reads the configured vault password.
    pub fn configured_password(&self) -> SecretResult<String> {
        (self.password)()
    }

    #[must_use]
    pub fn with_prompt_allowed(mut self, allowed: bool) -> Self {
        self.prompt_allowed = allowed;
        self
    }

    #[must_use]
    pub fn with_argon2(mut self, params: Argon2Params) -> Self {
        self.argon2 = params;
        self
    }
}

impl std::fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreOptions")
            .field("backend", &self.backend)
            .field("file_dir", &self.file_dir)
            .field("prompt_allowed", &self.prompt_allowed)
            .field("argon2", &self.argon2)
            .finish_non_exhaustive()
    }
}

/// Key/value store for opaque byte secrets.
///
/// The store is constructed explicitly and handed to whoever needs it; there
/// is no process-wide instance.
pub struct SecretStore {
    backend: Box<dyn SecretBackend>,
}

impl std::fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStore")
            .field("backend", &self.backend.kind())
            .finish()
    }
}

impl SecretStore {
    /// Opens the store, trying each allowed backend in order.
    ///
    /// The first backend that opens wins. Failures of earlier candidates are
    /// logged and only the last one is returned when nothing opens.
    pub fn open(options: &StoreOptions) -> SecretResult<Self> {
        Self::open_with(options, |kind| open_backend(kind, options))
    }

    /// Like [`SecretStore::open`], with `opener` constructing each candidate.
    pub fn open_with<F>(options: &StoreOptions, mut opener: F) -> SecretResult<Self>
    where
        F: FnMut(BackendKind) -> SecretResult<Box<dyn SecretBackend>>,
    {
        let candidates = allowed_backends(&options.backend)?;
        let mut last_error = None;

        for kind in candidates {
            match opener(kind) {
                Ok(backend) => {
                    debug!(backend = %kind, source = %options.backend.source, "opened secret store");
                    return Ok(Self { backend });
                }
                Err(e) => {
                    warn!(backend = %kind, error = %e, "keyring backend unavailable");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| SecretError::invalid_backend(options.backend.value.clone())))
    }

    /// Ephemeral store backed by process memory.
    pub fn in_memory() -> Self {
        Self::with_backend(MemoryBackend::new())
    }

    /// Wraps an already opened backend.
    pub fn with_backend(backend: impl SecretBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Which backend this store writes to.
    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn set(&self, key: &str, value: &[u8]) -> SecretResult<()> {
        self.backend.set(key, value)
    }

    /// Fails with [`SecretError::NotFound`] when `key` is absent.
    pub fn get(&self, key: &str) -> SecretResult<Vec<u8>> {
        self.backend.get(key)
    }

    pub fn remove(&self, key: &str) -> SecretResult<()> {
        self.backend.remove(key)
    }

    pub fn keys(&self) -> SecretResult<Vec<String>> {
        self.backend.keys()
    }
}

fn open_backend(kind: BackendKind, options: &StoreOptions) -> SecretResult<Box<dyn SecretBackend>> {
    Ok(match kind {
        BackendKind::Keychain => Box::new(KeychainBackend::open(KEYCHAIN_SERVICE)?),
        BackendKind::File => {
            let password =
                file_password_func(options.configured_password()?, options.prompt_allowed);
            Box::new(FileVaultBackend::open_with_params(
                &options.file_dir,
                &password,
                options.argon2,
            )?)
        }
        BackendKind::Memory => Box::new(MemoryBackend::new()),
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::selector::BackendSource;

    fn fast() -> Argon2Params {
        Argon2Params {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn memory_store_round_trip() {
        let store = SecretStore::in_memory();
        assert_eq!(store.kind(), BackendKind::Memory);

        store.set("a", b"1").unwrap();
        assert_eq!(store.get("a").unwrap(), b"1");
        assert!(store.get("b").unwrap_err().is_not_found());

        store.remove("a").unwrap();
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn opens_file_backend_with_password() {
        let tmp = tempfile::tempdir().unwrap();
        let options = StoreOptions::new(
            KeyringBackendInfo::new("file", BackendSource::Env),
            tmp.path().join("keyring"),
        )
        .with_password("testpass")
        .with_prompt_allowed(false)
        .with_argon2(fast());

        let store = SecretStore::open(&options).unwrap();
        assert_eq!(store.kind(), BackendKind::File);
        store.set("test/key", b"value").unwrap();

        let reopened = SecretStore::open(&options).unwrap();
        assert_eq!(reopened.get("test/key").unwrap(), b"value");
    }

    #[test]
    fn file_backend_without_password_reports_no_tty() {
        let tmp = tempfile::tempdir().unwrap();
        let options = StoreOptions::new(
            KeyringBackendInfo::new("file", BackendSource::Config),
            tmp.path(),
        )
        .with_prompt_allowed(false)
        .with_argon2(fast());

        let err = SecretStore::open(&options).unwrap_err();
        assert!(matches!(err, SecretError::NoTty));
    }

    #[test]
    fn invalid_backend_fails_before_opening() {
        let tmp = tempfile::tempdir().unwrap();
        let options = StoreOptions::new(
            KeyringBackendInfo::new("vault", BackendSource::Env),
            tmp.path().join("never-created"),
        );
        let err = SecretStore::open(&options).unwrap_err();
        assert!(matches!(err, SecretError::InvalidBackend { .. }));
        assert!(!tmp.path().join("never-created").exists());
    }

    #[test]
    fn auto_falls_back_to_file_when_keychain_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let options = StoreOptions::new(KeyringBackendInfo::default(), tmp.path())
            .with_password("pw")
            .with_argon2(fast());

        let tried = RefCell::new(Vec::new());
        let store = SecretStore::open_with(&options, |kind| {
            tried.borrow_mut().push(kind);
            match kind {
                BackendKind::Keychain => Err(SecretError::backend("keychain", "no session bus")),
                other => open_backend(other, &options),
            }
        })
        .unwrap();

        assert_eq!(store.kind(), BackendKind::File);
        assert_eq!(*tried.borrow(), vec![BackendKind::Keychain, BackendKind::File]);
    }

    #[test]
    fn all_candidates_failing_returns_the_last_error() {
        let options = StoreOptions::new(KeyringBackendInfo::default(), "/nonexistent");
        let tried = RefCell::new(Vec::new());
        let err = SecretStore::open_with(&options, |kind| {
            tried.borrow_mut().push(kind);
            match kind {
                BackendKind::Keychain => Err(SecretError::backend("keychain", "no session bus")),
                _ => Err(SecretError::NoTty),
            }
        })
        .unwrap_err();

        assert!(matches!(err, SecretError::NoTty));
        assert_eq!(*tried.borrow(), vec![BackendKind::Keychain, BackendKind::File]);
    }

    #[test]
    fn first_working_candidate_stops_the_search() {
        let options = StoreOptions::new(KeyringBackendInfo::default(), "/nonexistent");
        let tried = RefCell::new(Vec::new());
        let store = SecretStore::open_with(&options, |kind| {
            tried.borrow_mut().push(kind);
            Ok(Box::new(MemoryBackend::new()) as Box<dyn SecretBackend>)
        })
        .unwrap();

        assert_eq!(store.kind(), BackendKind::Memory);
        assert_eq!(*tried.borrow(), vec![BackendKind::Keychain]);
    }

    #[test]
    fn password_source_is_only_read_for_the_file_backend() {
        let options = StoreOptions::new(
            KeyringBackendInfo::new("memory", BackendSource::Config),
            "/nonexistent",
        )
        .with_password_source(|| {
            Err(SecretError::PasswordUnavailable {
                message: "pass entry missing".to_string(),
            })
        });
        assert_eq!(SecretStore::open(&options).unwrap().kind(), BackendKind::Memory);

        let tmp = tempfile::tempdir().unwrap();
        let mut file_options = options.clone().with_argon2(fast());
        file_options.backend = KeyringBackendInfo::new("file", BackendSource::Config);
        file_options.file_dir = tmp.path().to_path_buf();
        let err = SecretStore::open(&file_options).unwrap_err();
        assert!(matches!(err, SecretError::PasswordUnavailable { .. }));
    }

    #[test]
    fn memory_backend_by_name() {
        let options = StoreOptions::new(
            KeyringBackendInfo::new("memory", BackendSource::Env),
            "/nonexistent",
        );
        assert_eq!(SecretStore::open(&options).unwrap().kind(), BackendKind::Memory);
    }
}
