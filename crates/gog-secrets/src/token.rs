//! OAuth refresh tokens on top of the secret store.
//!
//! Every account's token lives under `token:<email>`. A single extra key,
//! [`DEFAULT_ACCOUNT_KEY`], names the account used when a command does not
//! pick one explicitly.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{SecretError, SecretResult};
use crate::store::SecretStore;

/// Prefix of every token key.
pub const TOKEN_KEY_PREFIX: &str = "token:";

/// Key holding the default account's email.
pub const DEFAULT_ACCOUNT_KEY: &str = "default_account";

/// Credential bundle for one authorized Google account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    #[serde(default)]
    pub email: String,
    pub refresh_token: String,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Token {
    /// Creates a token stamped with the current time.
    pub fn new(
        email: impl Into<String>,
        refresh_token: impl Into<String>,
        services: Vec<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            email: email.into(),
            refresh_token: refresh_token.into(),
            services,
            scopes,
            created_at: Utc::now(),
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("email", &self.email)
            .field("refresh_token", &"[REDACTED]")
            .field("services", &self.services)
            .field("scopes", &self.scopes)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Returns the secret key for `email`'s token.
pub fn format_token_key(email: &str) -> String {
    format!("{}{}", TOKEN_KEY_PREFIX, email)
}

/// Extracts the email from a token key.
///
/// Only keys starting with the exact `token:` prefix and carrying a
/// non-empty email match.
pub fn parse_token_key(key: &str) -> Option<&str> {
    key.strip_prefix(TOKEN_KEY_PREFIX)
        .filter(|email| !email.is_empty())
}

/// Per-account token CRUD and the default-account pointer.
#[derive(Debug)]
pub struct TokenStore {
    secrets: SecretStore,
}

impl TokenStore {
    pub fn new(secrets: SecretStore) -> Self {
        Self { secrets }
    }

    /// Token store over an in-memory secret store.
    pub fn in_memory() -> Self {
        Self::new(SecretStore::in_memory())
    }

    /// The underlying secret store.
    pub fn secrets(&self) -> &SecretStore {
        &self.secrets
    }

    /// Stores `token` for `email`, replacing any previous token.
    ///
    /// The stored token always carries `email`. Empty emails and empty
    /// refresh tokens are rejected with [`SecretError::InvalidToken`].
    pub fn set_token(&self, email: &str, token: &Token) -> SecretResult<()> {
        let email = email.trim();
        if email.is_empty() {
            return Err(SecretError::invalid_token("email is empty"));
        }
        if token.refresh_token.is_empty() {
            return Err(SecretError::invalid_token("refresh token is empty"));
        }

        let mut stored = token.clone();
        stored.email = email.to_string();
        let raw = serde_json::to_vec(&stored)?;
        self.secrets.set(&format_token_key(email), &raw)?;
        info!(email, backend = %self.secrets.kind(), "stored token");
        Ok(())
    }

    /// Reads the token for `email`.
    ///
    /// A stored value that no longer decodes is reported as not found.
    pub fn get_token(&self, email: &str) -> SecretResult<Token> {
        let key = format_token_key(email.trim());
        let raw = self.secrets.get(&key)?;
        serde_json::from_slice(&raw).map_err(|e| {
            warn!(key = %key, error = %e, "stored token does not decode");
            SecretError::not_found(key)
        })
    }

    /// Returns every stored token, in no particular order.
    ///
    /// Entries that do not decode are skipped.
    pub fn list_tokens(&self) -> SecretResult<Vec<Token>> {
        let mut tokens = Vec::new();
        for key in self.secrets.keys()? {
            let Some(email) = parse_token_key(&key) else {
                continue;
            };
            match self.get_token(email) {
                Ok(token) => tokens.push(token),
                Err(e) if e.is_not_found() => {
                    debug!(key = %key, "skipping unreadable token");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(tokens)
    }

    /// Removes `email`'s token. Removing an absent token succeeds.
    pub fn delete_token(&self, email: &str) -> SecretResult<()> {
        let email = email.trim();
        match self.secrets.remove(&format_token_key(email)) {
            Ok(()) => {
                info!(email, "deleted token");
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn set_default_account(&self, email: &str) -> SecretResult<()> {
        let email = email.trim();
        if email.is_empty() {
            return Err(SecretError::invalid_token("email is empty"));
        }
        self.secrets.set(DEFAULT_ACCOUNT_KEY, email.as_bytes())?;
        debug!(email, "set default account");
        Ok(())
    }

    /// Returns the default account, or an empty string when none is set.
    pub fn get_default_account(&self) -> SecretResult<String> {
        match self.secrets.get(DEFAULT_ACCOUNT_KEY) {
            Ok(raw) => Ok(String::from_utf8_lossy(&raw).trim().to_string()),
            Err(e) if e.is_not_found() => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    /// Forgets the default account. Succeeds when none was set.
    pub fn clear_default_account(&self) -> SecretResult<()> {
        match self.secrets.remove(DEFAULT_ACCOUNT_KEY) {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Raw keys of the underlying store.
    pub fn keys(&self) -> SecretResult<Vec<String>> {
        self.secrets.keys()
    }
}
