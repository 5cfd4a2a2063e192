//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/gogcli/config.toml` by default:
//!
//! ```toml
//! [keyring]
//! backend = "auto"            # auto, keychain, file, memory
//! password = "env::VAULT_PW"  # file backend password; pass:: and env:: supported
//! dir = "/custom/keyring"     # file vault directory
//!
//! [auth]
//! services = ["gmail", "calendar"]
//! timeout_secs = 300
//! port_range = [8085, 8099]
//! ```
//!
//! `GOG_KEYRING_BACKEND` and `GOG_KEYRING_PASSWORD` override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use gog_secrets::{KeyringBackendInfo, SecretError, StoreOptions};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Environment variable holding the file vault password.
pub const KEYRING_PASSWORD_ENV: &str = "GOG_KEYRING_PASSWORD";

/// Environment variable selecting the keyring backend.
pub const KEYRING_BACKEND_ENV: &str = "GOG_KEYRING_BACKEND";

/// Configuration for the gog client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Keyring settings.
    pub keyring: KeyringSettings,

    /// Login settings.
    pub auth: AuthSettings,
}

/// Where OAuth refresh tokens are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyringSettings {
    /// Backend name.
    pub backend: Option<String>,

    /// File vault password (supports `pass::` and `env::` prefixes).
    pub password: Option<String>,

    /// File vault directory.
    pub dir: Option<PathBuf>,
}

/// Login settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Services requested by `gog auth add` without `--services`.
    pub services: Vec<String>,

    /// Seconds the login page waits for the browser.
    pub timeout_secs: u64,

    /// Loopback ports tried for the login server, inclusive.
    pub port_range: (u16, u16),
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            services: Vec::new(),
            timeout_secs: 300,
            port_range: (8085, 8099),
        }
    }
}

impl AuthSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Services as a comma separated list; empty means all.
    pub fn services_arg(&self) -> String {
        self.services.join(",")
    }
}

impl ClientConfig {
    /// Loads configuration from the default path.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("failed to read config: {}", e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        gog_core::config_file_path()
    }

    /// Resolves the keyring backend: `env_value` (flag or environment), then
    /// the config file, then `auto`.
    pub fn keyring_backend_info(&self, env_value: Option<&str>) -> KeyringBackendInfo {
        KeyringBackendInfo::resolve(env_value, self.keyring.backend.as_deref())
    }

    /// Directory of the file vault.
    pub fn keyring_dir(&self) -> PathBuf {
        self.keyring
            .dir
            .clone()
            .unwrap_or_else(gog_core::keyring_dir)
    }

    /// Resolves the file vault password: `env_value` wins, then
    /// `keyring.password` with secret references expanded. Empty when
    /// neither is set.
    pub fn keyring_password(&self, env_value: Option<&str>) -> ClientResult<String> {
        if let Some(password) = env_value.filter(|v| !v.is_empty()) {
            return Ok(password.to_string());
        }
        match self.keyring.password.as_deref() {
            Some(raw) if !raw.is_empty() => crate::secret::resolve(raw)
                .map_err(|e| ClientError::Config(format!("failed to resolve keyring.password: {}", e))),
            _ => Ok(String::new()),
        }
    }

    /// Builds the secret store options.
    ///
    /// The password is resolved only if the file vault gets opened, so a
    /// `pass::` entry is never read for the keychain.
    pub fn store_options(
        &self,
        backend: KeyringBackendInfo,
        env_password: Option<&str>,
        prompt_allowed: bool,
    ) -> StoreOptions {
        let config = self.clone();
        let env_password = env_password.map(str::to_string);
        StoreOptions::new(backend, self.keyring_dir())
            .with_password_source(move || {
                config
                    .keyring_password(env_password.as_deref())
                    .map_err(|e| SecretError::PasswordUnavailable {
                        message: e.to_string(),
                    })
            })
            .with_prompt_allowed(prompt_allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gog_secrets::BackendSource;

    #[test]
    fn empty_file_uses_defaults() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config.auth.timeout_secs, 300);
        assert_eq!(config.auth.port_range, (8085, 8099));
        assert!(config.keyring.backend.is_none());
        assert_eq!(config.keyring_dir(), gog_core::keyring_dir());
    }

    #[test]
    fn parses_full_file() {
        let config: ClientConfig = toml::from_str(
            r#"
[keyring]
backend = "file"
password = "plain"
dir = "/tmp/gog-keyring"

[auth]
services = ["gmail", "tasks"]
timeout_secs = 60
port_range = [9000, 9001]
"#,
        )
        .unwrap();
        assert_eq!(config.keyring.backend.as_deref(), Some("file"));
        assert_eq!(config.keyring_dir(), PathBuf::from("/tmp/gog-keyring"));
        assert_eq!(config.auth.services_arg(), "gmail,tasks");
        assert_eq!(config.auth.timeout(), Duration::from_secs(60));
        assert_eq!(config.auth.port_range, (9000, 9001));
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[keyring\n").unwrap();
        let err = ClientConfig::load_from(&path).unwrap_err();
        assert!(err.contains("failed to parse config"));
    }

    #[test]
    fn backend_source_tracking() {
        let config: ClientConfig = toml::from_str("[keyring]\nbackend = \"keychain\"\n").unwrap();

        let info = config.keyring_backend_info(None);
        assert_eq!(info, KeyringBackendInfo::new("keychain", BackendSource::Config));

        let info = config.keyring_backend_info(Some("file"));
        assert_eq!(info, KeyringBackendInfo::new("file", BackendSource::Env));

        let info = ClientConfig::default().keyring_backend_info(None);
        assert_eq!(info.value, "auto");
        assert_eq!(info.source, BackendSource::Default);
    }

    #[test]
    fn password_precedence() {
        let config: ClientConfig = toml::from_str("[keyring]\npassword = \"from-config\"\n").unwrap();
        assert_eq!(config.keyring_password(Some("from-env")).unwrap(), "from-env");
        assert_eq!(config.keyring_password(Some("")).unwrap(), "from-config");
        assert_eq!(config.keyring_password(None).unwrap(), "from-config");
        assert_eq!(ClientConfig::default().keyring_password(None).unwrap(), "");
    }

    #[test]
    fn password_reference_failure_is_config_error() {
        let config: ClientConfig =
            toml::from_str("[keyring]\npassword = \"env::_GOG_MISSING_PW_VAR_98765\"\n").unwrap();
        let err = config.keyring_password(None).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn store_options_carry_settings() {
        let config: ClientConfig =
            toml::from_str("[keyring]\ndir = \"/tmp/k\"\npassword = \"pw\"\n").unwrap();
        let options = config.store_options(config.keyring_backend_info(Some("file")), None, false);
        assert_eq!(options.file_dir, PathBuf::from("/tmp/k"));
        assert_eq!(options.configured_password().unwrap(), "pw");
        assert!(!options.prompt_allowed);
        assert_eq!(options.backend.value, "file");

        let options = config.store_options(config.keyring_backend_info(None), Some("env-pw"), true);
        assert_eq!(options.configured_password().unwrap(), "env-pw");
    }

    #[test]
    fn unresolvable_password_does_not_block_other_backends() {
        let config: ClientConfig = toml::from_str(
            "[keyring]\nbackend = \"memory\"\npassword = \"env::_GOG_MISSING_PW_VAR_24680\"\n",
        )
        .unwrap();
        let options = config.store_options(config.keyring_backend_info(None), None, false);
        let store = gog_secrets::SecretStore::open(&options).unwrap();
        assert_eq!(store.kind(), gog_secrets::BackendKind::Memory);

        let err = options.configured_password().unwrap_err();
        assert!(matches!(err, SecretError::PasswordUnavailable { .. }));
        assert!(err.to_string().contains("keyring.password"));
    }
}
