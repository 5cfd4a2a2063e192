//! Secret storage for gog.
//!
//! - [`SecretStore`] - key/value store for opaque byte secrets
//! - [`SecretBackend`] - the storage mediums behind it (OS keychain,
//!   encrypted file vault, memory)
//! - [`allowed_backends`] - validates the configured backend name
//! - [`file_password_func`] - password source for the file vault
//! - [`translate_keychain_error`] - locked-keychain rewrite
//! - [`TokenStore`] - per-account OAuth tokens and the default account
//!
//! # Example
//!
//! ```ignore
//! use gog_secrets::{KeyringBackendInfo, SecretStore, StoreOptions, TokenStore};
//!
//! let options = StoreOptions::new(KeyringBackendInfo::default(), gog_core::ensure_keyring_dir()?);
//! let tokens = TokenStore::new(SecretStore::open(&options)?);
//! let default = tokens.get_default_account()?;
//! ```

pub mod backend;
pub mod error;
pub mod keychain_error;
pub mod password;
pub mod selector;
pub mod store;
pub mod token;

pub use backend::{
    Argon2Params, FileVaultBackend, KeychainBackend, MemoryBackend, SecretBackend,
    VAULT_FILE_NAME,
};
pub use error::{SecretError, SecretResult};
pub use keychain_error::{
    LOCKED_KEYCHAIN_MARKER, is_locked_keychain_error, translate_keychain_error,
};
pub use password::{PasswordFunc, PasswordSource, VAULT_PASSWORD_PROMPT, file_password_func};
pub use selector::{
    BackendKind, BackendSource, DEFAULT_BACKEND, KeyringBackendInfo, allowed_backends,
};
pub use store::{SecretStore, StoreOptions};
pub use token::{
    DEFAULT_ACCOUNT_KEY, TOKEN_KEY_PREFIX, Token, TokenStore, format_token_key, parse_token_key,
};
