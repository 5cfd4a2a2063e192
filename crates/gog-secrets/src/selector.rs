//! Keyring backend selection.
//!
//! The configured backend name is validated once per process and resolved to
//! an ordered list of concrete backends. `auto` prefers the OS keychain and
//! falls back to the encrypted file vault; callers try the candidates in order
//! and keep the first one that opens.

use std::fmt;

use crate::error::{SecretError, SecretResult};

/// Backend name used when nothing is configured.
pub const DEFAULT_BACKEND: &str = "auto";

/// A concrete storage medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// OS keychain (macOS Keychain, Windows Credential Manager, Linux keyutils).
    Keychain,
    /// Password-protected vault file in the keyring directory.
    File,
    /// Process memory; nothing survives the process.
    Memory,
}

impl BackendKind {
    /// Returns the symbolic name of this backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keychain => "keychain",
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the backend name came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendSource {
    /// `GOG_KEYRING_BACKEND` or `--keyring-backend`.
    Env,
    /// `keyring.backend` in `config.toml`.
    Config,
    /// Nothing configured.
    #[default]
    Default,
}

impl BackendSource {
    /// Returns a short label for status output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Env => "env",
            Self::Config => "config",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for BackendSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The keyring backend requested by configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyringBackendInfo {
    /// Backend name as configured (`auto`, `keychain`, `file`, `memory`).
    pub value: String,
    /// Where `value` came from.
    pub source: BackendSource,
}

impl KeyringBackendInfo {
    /// Creates backend info with an explicit source.
    pub fn new(value: impl Into<String>, source: BackendSource) -> Self {
        Self {
            value: value.into(),
            source,
        }
    }

    /// Picks the first non-empty value: environment, then config, then `auto`.
    pub fn resolve(env_value: Option<&str>, config_value: Option<&str>) -> Self {
        fn non_empty(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|v| !v.is_empty())
        }

        if let Some(v) = non_empty(env_value) {
            Self::new(v, BackendSource::Env)
        } else if let Some(v) = non_empty(config_value) {
            Self::new(v, BackendSource::Config)
        } else {
            Self::new(DEFAULT_BACKEND, BackendSource::Default)
        }
    }

    /// Returns the trimmed, lowercased backend name; empty means `auto`.
    pub fn normalized(&self) -> String {
        let value = self.value.trim().to_ascii_lowercase();
        if value.is_empty() {
            DEFAULT_BACKEND.to_string()
        } else {
            value
        }
    }
}

impl Default for KeyringBackendInfo {
    fn default() -> Self {
        Self::new(DEFAULT_BACKEND, BackendSource::Default)
    }
}

/// Validates the requested backend and returns the candidates to try, in order.
///
/// # Errors
///
/// Returns [`SecretError::InvalidBackend`] for an unknown name.
pub fn allowed_backends(info: &KeyringBackendInfo) -> SecretResult<Vec<BackendKind>> {
    match info.normalized().as_str() {
        "auto" => Ok(vec![BackendKind::Keychain, BackendKind::File]),
        "keychain" => Ok(vec![BackendKind::Keychain]),
        "file" => Ok(vec![BackendKind::File]),
        "memory" => Ok(vec![BackendKind::Memory]),
        _ => Err(SecretError::invalid_backend(info.value.clone())),
    }
}
