//! OAuth 2.0 authorization code flow with PKCE for Google.
//!
//! 1. Generate a code verifier, its S256 challenge and a random state
//! 2. Send the browser to Google's consent page with the challenge
//! 3. Google redirects to the manage server's `/oauth2/callback`
//! 4. The code is exchanged (with the verifier) for tokens
//!
//! `access_type=offline` and `prompt=consent` make Google return a refresh
//! token on every login, which is the only thing gog keeps.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use gog_core::OAuthCredentials;
use rand::Rng as _;
use sha2::{Digest, Sha256};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::diagnostics::{BODY_SNIPPET_LIMIT, summarize_body};
use crate::error::{AuthError, AuthResult};
use crate::identity::OAuthToken;

/// Google OAuth endpoints.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Path Google redirects back to.
pub const CALLBACK_PATH: &str = "/oauth2/callback";

/// Random bytes behind the verifier and the state, before base64url.
const VERIFIER_BYTES: usize = 32;
const STATE_BYTES: usize = 16;

/// A boxed future, used to keep [`CodeExchanger`] object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One login attempt: PKCE verifier, its S256 challenge and the `state`
/// that ties Google's callback back to it.
#[derive(Debug, Clone)]
pub struct PkceFlow {
    pub verifier: String,
    pub challenge: String,
    pub state: String,
}

impl PkceFlow {
    pub fn new() -> Self {
        let verifier = random_token(VERIFIER_BYTES);
        Self {
            challenge: s256_challenge(&verifier),
            verifier,
            state: random_token(STATE_BYTES),
        }
    }

    /// Google consent page URL for this attempt.
    pub fn build_auth_url(&self, client_id: &str, redirect_uri: &str, scopes: &[String]) -> String {
        let scope = scopes.join(" ");
        let query = [
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("code_challenge", self.challenge.as_str()),
            ("code_challenge_method", "S256"),
            ("state", self.state.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("include_granted_scopes", "true"),
        ]
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

        format!("{}?{}", GOOGLE_AUTH_URL, query)
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn s256_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// URL-safe random string from `len` random bytes.
pub fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill(bytes.as_mut_slice());
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Exchanges an authorization code for tokens.
pub trait CodeExchanger: Send + Sync {
    fn exchange<'a>(
        &'a self,
        code: &'a str,
        verifier: &'a str,
        redirect_uri: &'a str,
    ) -> BoxFuture<'a, AuthResult<OAuthToken>>;
}

/// Token endpoint client for Google.
#[derive(Debug)]
pub struct GoogleOAuthClient {
    credentials: OAuthCredentials,
    http_client: reqwest::Client,
    token_url: String,
}

impl GoogleOAuthClient {
    /// Creates a client with the given credentials and request timeout.
    pub fn new(credentials: OAuthCredentials, timeout: Duration) -> AuthResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(AuthError::Network)?;

        Ok(Self {
            credentials,
            http_client,
            token_url: GOOGLE_TOKEN_URL.to_string(),
        })
    }

    /// Overrides the token endpoint.
    #[must_use]
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn client_id(&self) -> &str {
        &self.credentials.client_id
    }

    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> AuthResult<OAuthToken> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(AuthError::Network)?;

        let status = response.status();
        if !status.is_success() {
            let prefix = read_body_prefix(response, BODY_SNIPPET_LIMIT as usize).await;
            let summary = summarize_body(&prefix);
            warn!(status = status.as_u16(), %summary, "token exchange rejected");
            return Err(AuthError::Exchange {
                status: status.as_u16(),
                summary,
            });
        }

        let body = response.bytes().await.map_err(AuthError::Network)?;
        // serde_json messages can quote the offending value
        let token: OAuthToken = serde_json::from_slice(&body).map_err(|e| {
            AuthError::invalid_response(format!(
                "unexpected JSON at line {} column {}",
                e.line(),
                e.column()
            ))
        })?;

        info!("obtained OAuth tokens");
        Ok(token)
    }
}

/// Reads at most `limit` bytes of the body; the rest is never pulled off
/// the connection. A failing stream ends the read early.
async fn read_body_prefix(mut response: reqwest::Response, limit: usize) -> Vec<u8> {
    let mut prefix = Vec::new();
    while prefix.len() < limit {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(limit - prefix.len());
                prefix.extend_from_slice(&chunk[..take]);
            }
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "error body ended early");
                break;
            }
        }
    }
    prefix
}

impl CodeExchanger for GoogleOAuthClient {
    fn exchange<'a>(
        &'a self,
        code: &'a str,
        verifier: &'a str,
        redirect_uri: &'a str,
    ) -> BoxFuture<'a, AuthResult<OAuthToken>> {
        Box::pin(self.exchange_code(code, verifier, redirect_uri))
    }
}

/// Binds a loopback listener on the first free port in `port_range`.
///
/// A range of `(0, 0)` lets the OS pick the port.
pub async fn bind_loopback(port_range: (u16, u16)) -> AuthResult<(TcpListener, u16)> {
    let (start, end) = port_range;
    for port in start..=end {
        match TcpListener::bind(("127.0.0.1", port)).await {
            Ok(listener) => {
                let port = listener.local_addr()?.port();
                debug!(port, "bound loopback listener");
                return Ok((listener, port));
            }
            Err(e) => debug!(port, error = %e, "port unavailable"),
        }
    }
    Err(AuthError::NoPort { start, end })
}

/// Redirect URI for a listener on `port`.
pub fn redirect_uri_for(port: u16) -> String {
    format!("http://127.0.0.1:{}{}", port, CALLBACK_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkce_verifier_length() {
        let flow = PkceFlow::new();
        // 32 bytes -> 43 base64url characters
        assert_eq!(flow.verifier.len(), 43);
    }

    #[test]
    fn pkce_challenge_matches_rfc_example() {
        // RFC 7636 appendix B
        assert_eq!(
            s256_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn pkce_values_are_random() {
        let a = PkceFlow::new();
        let b = PkceFlow::new();
        assert_ne!(a.verifier, b.verifier);
        assert_ne!(a.state, b.state);
    }

    #[test]
    fn auth_url_format() {
        let flow = PkceFlow::new();
        let url = flow.build_auth_url(
            "test-client.apps.googleusercontent.com",
            &redirect_uri_for(8085),
            &["openid".to_string(), "email".to_string()],
        );

        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A8085%2Foauth2%2Fcallback"));
        assert!(url.contains("scope=openid%20email"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains(&format!("state={}", flow.state)));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("include_granted_scopes=true"));
    }

    #[tokio::test]
    async fn bind_picks_free_port() {
        let (listener, port) = bind_loopback((0, 0)).await.unwrap();
        assert_ne!(port, 0);
        assert_eq!(listener.local_addr().unwrap().port(), port);
    }

    /// Serves one token request with a 400 whose body is `sent` bytes of an
    /// announced `announced`, then keeps the connection open.
    async fn stalled_error_endpoint(sent: usize, announced: usize) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !String::from_utf8_lossy(&request).contains("grant_type") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let head = format!(
                "HTTP/1.1 400 Bad Request\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n",
                announced
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&vec![b'x'; sent]).await.unwrap();
            socket.flush().await.unwrap();
            std::future::pending::<()>().await;
        });
        format!("http://{}/token", addr)
    }

    fn client(token_url: String) -> GoogleOAuthClient {
        let credentials = OAuthCredentials {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
        };
        GoogleOAuthClient::new(credentials, Duration::from_secs(60))
            .unwrap()
            .with_token_url(token_url)
    }

    #[tokio::test]
    async fn rejected_exchange_reads_only_the_snippet() {
        let url = stalled_error_endpoint(8192, 1_000_000).await;
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            client(url).exchange_code("code", "verifier", "http://127.0.0.1/cb"),
        )
        .await
        .expect("error body read past the snippet limit");

        match result {
            Err(AuthError::Exchange { status, summary }) => {
                assert_eq!(status, 400);
                assert_eq!(summary, summarize_body(&[b'x'; 4096]));
            }
            other => panic!("expected exchange error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn short_error_body_is_fingerprinted_whole() {
        let url = stalled_error_endpoint(10, 10).await;
        let err = client(url)
            .exchange_code("code", "verifier", "http://127.0.0.1/cb")
            .await
            .unwrap_err();
        match err {
            AuthError::Exchange { summary, .. } => {
                assert_eq!(summary, summarize_body(b"xxxxxxxxxx"));
            }
            other => panic!("expected exchange error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn bind_skips_busy_port() {
        let (_busy, port) = bind_loopback((0, 0)).await.unwrap();
        let err = bind_loopback((port, port)).await.unwrap_err();
        assert!(matches!(err, AuthError::NoPort { .. }));
    }
}
