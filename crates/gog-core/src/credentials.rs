//! OAuth client credentials (`credentials.json`).
//!
//! Google requires every desktop client to bring its own OAuth client. The
//! user downloads the JSON from Google Cloud Console and registers it with
//! `gog auth credentials <file>`, which copies it to [`credentials_path`].
//!
//! [`credentials_path`]: crate::paths::credentials_path

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The OAuth client credentials file is absent or unreadable.
///
/// Carries the path gog looked at so the CLI can tell the user where to put
/// the file, and the underlying cause for `--debug` output.
#[derive(Debug)]
pub struct CredentialsMissingError {
    /// Where the credentials file was expected.
    pub path: PathBuf,
    /// Why it could not be read.
    pub cause: BoxError,
}

impl CredentialsMissingError {
    /// Creates the error for `path`.
    pub fn new(path: impl Into<PathBuf>, cause: impl Into<BoxError>) -> Self {
        Self {
            path: path.into(),
            cause: cause.into(),
        }
    }
}

impl fmt::Display for CredentialsMissingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OAuth client credentials missing at {} (run `gog auth credentials <file>`)",
            self.path.display()
        )
    }
}

impl std::error::Error for CredentialsMissingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

/// Errors loading OAuth client credentials.
#[derive(Debug, Error)]
pub enum CredentialsError {
    /// The file does not exist.
    #[error(transparent)]
    Missing(#[from] CredentialsMissingError),

    /// The file exists but could not be read.
    #[error("failed to read credentials file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The JSON is not a Google OAuth client.
    #[error("invalid credentials file: {0}")]
    Invalid(String),
}

/// OAuth 2.0 client credentials for Google API access.
#[derive(Clone)]
pub struct OAuthCredentials {
    /// The OAuth 2.0 client ID from Google Cloud Console.
    pub client_id: String,
    /// The OAuth 2.0 client secret from Google Cloud Console.
    pub client_secret: String,
}

impl fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Structure of Google's OAuth credentials JSON file.
///
/// Accepts the Cloud Console format (`installed` or `web` section) and the
/// flat format with `client_id`/`client_secret` at the root.
#[derive(Debug, Deserialize)]
struct GoogleCredentialsFile {
    installed: Option<NestedCredentials>,
    web: Option<NestedCredentials>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedCredentials {
    client_id: String,
    client_secret: String,
}

impl OAuthCredentials {
    /// Creates new OAuth credentials.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Loads credentials from `path`.
    ///
    /// A missing file maps to [`CredentialsError::Missing`] so the CLI can
    /// print setup instructions instead of a bare IO error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CredentialsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                CredentialsError::Missing(CredentialsMissingError::new(path, e))
            } else {
                CredentialsError::Read {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        Self::from_json(&content)
    }

    /// Parses credentials from a Google credentials JSON string.
    pub fn from_json(json: &str) -> Result<Self, CredentialsError> {
        let file: GoogleCredentialsFile = serde_json::from_str(json)
            .map_err(|e| CredentialsError::Invalid(format!("failed to parse JSON: {}", e)))?;

        let creds = if let Some(nested) = file.installed.or(file.web) {
            Self::new(nested.client_id, nested.client_secret)
        } else if let (Some(client_id), Some(client_secret)) = (file.client_id, file.client_secret)
        {
            Self::new(client_id, client_secret)
        } else {
            return Err(CredentialsError::Invalid(
                "expected an 'installed'/'web' section or 'client_id'/'client_secret' at the root"
                    .to_string(),
            ));
        };

        creds.validate()?;
        Ok(creds)
    }

    /// Checks that both fields are present.
    pub fn validate(&self) -> Result<(), CredentialsError> {
        if self.client_id.trim().is_empty() {
            return Err(CredentialsError::Invalid("client_id is required".to_string()));
        }
        if self.client_secret.trim().is_empty() {
            return Err(CredentialsError::Invalid(
                "client_secret is required".to_string(),
            ));
        }
        Ok(())
    }
}
