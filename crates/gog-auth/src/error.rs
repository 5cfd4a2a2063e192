//! Error types for the login flow and the manage server.

use std::fmt;

use gog_core::CredentialsError;
use gog_secrets::SecretError;
use thiserror::Error;

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// The part of an identity token that could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdTokenPart {
    /// Not three dot-separated segments.
    Structure,
    /// The payload segment is not base64url.
    Encoding,
    /// The payload does not decode to a JSON object.
    Payload,
    /// The payload has no usable `email` claim.
    Email,
}

impl IdTokenPart {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structure => "structure",
            Self::Encoding => "encoding",
            Self::Payload => "payload",
            Self::Email => "email",
        }
    }
}

impl fmt::Display for IdTokenPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while authorizing an account.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The exchange produced no token at all.
    #[error("no OAuth token received")]
    MissingToken,

    /// The token has no access token.
    #[error("OAuth token has no access token")]
    MissingAccessToken,

    /// The token response carries no identity token.
    #[error("OAuth token has no id_token; was the openid scope requested?")]
    MissingIdToken,

    /// The identity token is unusable; names the failing part only.
    #[error("malformed id_token: bad {part}")]
    MalformedIdToken { part: IdTokenPart },

    /// The token endpoint answered with a non-success status.
    #[error("token exchange failed (HTTP {status}) {summary}")]
    Exchange { status: u16, summary: String },

    /// The token endpoint returned something that is not a token response.
    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    /// Transport failure talking to Google.
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The callback's `state` does not match the pending login.
    #[error("OAuth state mismatch; restart the login")]
    StateMismatch,

    /// The user (or Google) refused the authorization.
    #[error("authorization denied: {0}")]
    Denied(String),

    /// The token response has no refresh token.
    #[error("no refresh token returned; revoke gog's access at https://myaccount.google.com/permissions and retry")]
    MissingRefreshToken,

    /// Unknown service name.
    #[error("unknown service {0:?} (expected one of: gmail, calendar, tasks)")]
    UnknownService(String),

    /// No loopback port could be bound.
    #[error("no available port in range {start}-{end}")]
    NoPort { start: u16, end: u16 },

    /// OAuth client credentials could not be loaded.
    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    /// Token persistence failed.
    #[error(transparent)]
    Secrets(#[from] SecretError),

    /// IO error (listener, browser).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuthError {
    /// Creates a malformed identity token error.
    pub fn malformed(part: IdTokenPart) -> Self {
        Self::MalformedIdToken { part }
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_names_part() {
        insta::assert_snapshot!(
            AuthError::malformed(IdTokenPart::Encoding).to_string(),
            @"malformed id_token: bad encoding"
        );
    }

    #[test]
    fn exchange_message_has_summary_only() {
        let err = AuthError::Exchange {
            status: 400,
            summary: "response_sha256=abc".to_string(),
        };
        insta::assert_snapshot!(err.to_string(), @"token exchange failed (HTTP 400) response_sha256=abc");
    }
}
