//! Client error types.

use std::fmt;

use gog_auth::AuthError;
use gog_core::CredentialsError;
use gog_secrets::SecretError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// Bad command-line usage.
    Usage(String),
    /// IO error.
    Io(std::io::Error),
    /// OAuth client credentials missing or invalid.
    Credentials(CredentialsError),
    /// Keyring or token store failure.
    Secrets(SecretError),
    /// Login flow failure.
    Auth(AuthError),
    /// The login did not complete.
    Login(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Usage(msg) => write!(f, "{}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Credentials(err) => write!(f, "{}", err),
            Self::Secrets(err) => write!(f, "{}", err),
            Self::Auth(err) => write!(f, "{}", err),
            Self::Login(msg) => write!(f, "login failed: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Credentials(err) => Some(err),
            Self::Secrets(err) => Some(err),
            Self::Auth(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<CredentialsError> for ClientError {
    fn from(err: CredentialsError) -> Self {
        Self::Credentials(err)
    }
}

impl From<SecretError> for ClientError {
    fn from(err: SecretError) -> Self {
        Self::Secrets(err)
    }
}

impl From<AuthError> for ClientError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Credentials(inner) => Self::Credentials(inner),
            AuthError::Secrets(inner) => Self::Secrets(inner),
            other => Self::Auth(other),
        }
    }
}
