//! Account identity from an OAuth token response.
//!
//! The email is read from the `id_token` that Google returns when the
//! `openid` and `email` scopes are granted. The token signature is not
//! checked: it arrives directly from the token endpoint over TLS.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::error::{AuthError, AuthResult, IdTokenPart};

/// Token endpoint response.
#[derive(Clone, Default, Deserialize)]
pub struct OAuthToken {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Space separated scopes actually granted.
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

impl OAuthToken {
    /// Granted scopes, split on whitespace.
    pub fn granted_scopes(&self) -> Vec<String> {
        self.scope
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

impl fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthToken")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Deserialize)]
struct IdTokenClaims {
    #[serde(default)]
    email: Option<String>,
}

/// Returns the authenticated email for `token`.
///
/// # Errors
///
/// - [`AuthError::MissingToken`] when there is no token
/// - [`AuthError::MissingAccessToken`] when it has no access token
/// - [`AuthError::MissingIdToken`] when it has no identity token
/// - [`AuthError::MalformedIdToken`] when the identity token is unusable
pub fn fetch_user_email(token: Option<&OAuthToken>) -> AuthResult<String> {
    let token = token.ok_or(AuthError::MissingToken)?;
    if token.access_token.is_empty() {
        return Err(AuthError::MissingAccessToken);
    }
    let id_token = token
        .id_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingIdToken)?;
    email_from_id_token(id_token)
}

/// Extracts the `email` claim from a `header.payload.signature` token.
pub fn email_from_id_token(id_token: &str) -> AuthResult<String> {
    let parts: Vec<&str> = id_token.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::malformed(IdTokenPart::Structure));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|_| AuthError::malformed(IdTokenPart::Encoding))?;
    let claims: IdTokenClaims = serde_json::from_slice(&payload)
        .map_err(|_| AuthError::malformed(IdTokenPart::Payload))?;

    claims
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .ok_or(AuthError::malformed(IdTokenPart::Email))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id_token(claims: &str) -> String {
        format!("x.{}.y", URL_SAFE_NO_PAD.encode(claims))
    }

    fn token_with(id_token: Option<String>) -> OAuthToken {
        OAuthToken {
            access_token: "access".to_string(),
            id_token,
            ..Default::default()
        }
    }

    #[test]
    fn missing_token_and_access_token() {
        assert!(matches!(fetch_user_email(None), Err(AuthError::MissingToken)));
        assert!(matches!(
            fetch_user_email(Some(&OAuthToken::default())),
            Err(AuthError::MissingAccessToken)
        ));
        assert!(matches!(
            fetch_user_email(Some(&token_with(None))),
            Err(AuthError::MissingIdToken)
        ));
    }

    #[test]
    fn extracts_email_from_id_token() {
        let tok = token_with(Some(id_token(r#"{"email":"a@b.com"}"#)));
        assert_eq!(fetch_user_email(Some(&tok)).unwrap(), "a@b.com");
    }

    #[test]
    fn tolerates_padding() {
        let padded = format!(
            "x.{}.y",
            base64::engine::general_purpose::URL_SAFE.encode(r#"{"email":"pad@b.com"}"#)
        );
        assert_eq!(email_from_id_token(&padded).unwrap(), "pad@b.com");
    }

    #[test]
    fn names_the_broken_part() {
        let part = |raw: &str| match email_from_id_token(raw) {
            Err(AuthError::MalformedIdToken { part }) => part,
            other => panic!("expected malformed id_token, got {:?}", other),
        };

        assert_eq!(part("only.two"), IdTokenPart::Structure);
        assert_eq!(part("a.b.c.d"), IdTokenPart::Structure);
        assert_eq!(part("x.!!!.y"), IdTokenPart::Encoding);
        assert_eq!(part(&id_token("[1,2]")), IdTokenPart::Payload);
        assert_eq!(part(&id_token(r#"{"sub":"1"}"#)), IdTokenPart::Email);
        assert_eq!(part(&id_token(r#"{"email":"  "}"#)), IdTokenPart::Email);
    }

    #[test]
    fn error_does_not_echo_token() {
        let secret_payload = id_token(r#"{"sub":"secret-subject"}"#);
        let err = email_from_id_token(&secret_payload).unwrap_err();
        assert!(!err.to_string().contains(&secret_payload));
        assert!(!err.to_string().contains("secret-subject"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let tok = OAuthToken {
            access_token: "ya29.secret".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            ..Default::default()
        };
        let rendered = format!("{:?}", tok);
        assert!(!rendered.contains("ya29.secret"));
        assert!(!rendered.contains("1//refresh"));
    }

    #[test]
    fn granted_scopes_split() {
        let tok = OAuthToken {
            scope: Some("openid email https://www.googleapis.com/auth/tasks".to_string()),
            ..Default::default()
        };
        assert_eq!(tok.granted_scopes().len(), 3);
    }
}
