//! Error types for secret storage.
//!
//! The variants map one-to-one onto the conditions the CLI renders for the
//! user. Only [`translate_keychain_error`](crate::translate_keychain_error)
//! rewrites an error; everything else is propagated as-is with its cause
//! attached.

use thiserror::Error;

/// Result type for secret store operations.
pub type SecretResult<T> = Result<T, SecretError>;

/// Errors raised by the secret store, its backends and the token layer.
#[derive(Debug, Error)]
pub enum SecretError {
    /// The requested key is not stored.
    #[error("secret not found: {key}")]
    NotFound { key: String },

    /// Unsupported keyring backend name.
    #[error("invalid keyring backend {value:?} (expected one of: auto, keychain, file, memory)")]
    InvalidBackend { value: String },

    /// A password is needed for the file vault but none can be obtained.
    #[error(
        "no TTY available to prompt for the keyring password; set GOG_KEYRING_PASSWORD or keyring.password"
    )]
    NoTty,

    /// The configured vault password could not be read from where it points.
    #[error("cannot read the keyring password: {message}")]
    PasswordUnavailable { message: String },

    /// The OS keychain is reachable but locked.
    #[error(
        "macOS keychain is locked; unlock it (e.g. `security unlock-keychain ~/Library/Keychains/login.keychain-db`) and retry"
    )]
    LockedKeychain {
        #[source]
        source: Box<SecretError>,
    },

    /// Low-level failure from the OS keychain.
    #[error("keychain error: {source}")]
    Keychain {
        #[source]
        source: keyring::Error,
    },

    /// The encrypted file vault could not be decrypted with the password.
    #[error("keyring vault password is incorrect")]
    WrongPassword,

    /// The encrypted file vault is damaged or unreadable.
    #[error("keyring vault error: {message}")]
    Vault { message: String },

    /// A token was rejected before persistence.
    #[error("invalid token: {reason}")]
    InvalidToken { reason: String },

    /// A stored value could not be encoded or decoded.
    #[error("failed to encode secret: {0}")]
    Encoding(#[from] serde_json::Error),

    /// IO error on the vault file or directory.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure.
    #[error("{backend} backend error: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },
}

impl SecretError {
    /// Creates a not found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates an invalid backend error.
    pub fn invalid_backend(value: impl Into<String>) -> Self {
        Self::InvalidBackend {
            value: value.into(),
        }
    }

    /// Creates a vault error.
    pub fn vault(message: impl Into<String>) -> Self {
        Self::Vault {
            message: message.into(),
        }
    }

    /// Creates an invalid token error.
    pub fn invalid_token(reason: impl Into<String>) -> Self {
        Self::InvalidToken {
            reason: reason.into(),
        }
    }

    /// Creates a generic backend error.
    pub fn backend(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            message: message.into(),
        }
    }

    /// Returns true for [`SecretError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<keyring::Error> for SecretError {
    fn from(source: keyring::Error) -> Self {
        Self::Keychain { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn invalid_backend_message() {
        insta::assert_snapshot!(
            SecretError::invalid_backend("vault").to_string(),
            @r#"invalid keyring backend "vault" (expected one of: auto, keychain, file, memory)"#
        );
    }

    #[test]
    fn not_found_message_names_key() {
        let err = SecretError::not_found("token:a@b.com");
        assert!(err.is_not_found());
        insta::assert_snapshot!(err.to_string(), @"secret not found: token:a@b.com");
    }

    #[test]
    fn locked_keychain_keeps_cause() {
        let err = SecretError::LockedKeychain {
            source: Box::new(SecretError::backend("keychain", "code -25308")),
        };
        assert!(err.to_string().contains("keychain is locked"));
        let cause = err.source().expect("cause");
        assert!(cause.to_string().contains("-25308"));
    }
}
