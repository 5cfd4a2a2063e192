//! Command implementations.

pub mod auth;
pub mod config;

use std::path::PathBuf;
use std::sync::Arc;

use gog_secrets::{KeyringBackendInfo, SecretStore, TokenStore};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// State shared by every command of one invocation.
#[derive(Clone)]
pub struct Context {
    pub config: ClientConfig,
    /// The file `config` was loaded from, or would be.
    pub config_path: PathBuf,
    /// Resolved keyring backend and where it came from.
    pub backend: KeyringBackendInfo,
    /// `GOG_KEYRING_PASSWORD`, when set.
    pub env_password: Option<String>,
    /// Whether the vault password may be prompted for.
    pub prompt_allowed: bool,
}

impl Context {
    pub fn new(
        config: ClientConfig,
        config_path: PathBuf,
        backend_override: Option<&str>,
        env_password: Option<String>,
        prompt_allowed: bool,
    ) -> Self {
        let backend = config.keyring_backend_info(backend_override);
        Self {
            config,
            config_path,
            backend,
            env_password,
            prompt_allowed,
        }
    }

    /// Opens the token store on the configured keyring backend.
    pub fn open_tokens(&self) -> ClientResult<Arc<TokenStore>> {
        let options = self.config.store_options(
            self.backend.clone(),
            self.env_password.as_deref(),
            self.prompt_allowed,
        );
        let secrets = SecretStore::open(&options)?;
        debug!(backend = %secrets.kind(), "token store ready");
        Ok(Arc::new(TokenStore::new(secrets)))
    }
}
