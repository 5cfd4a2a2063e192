//! Local account manage server.
//!
//! A short-lived loopback HTTP server for one login or management session:
//!
//! | route                  | purpose                                           |
//! |------------------------|---------------------------------------------------|
//! | `GET /`                | account page with the session CSRF token          |
//! | `GET /auth/start`      | 302 to Google's consent page with a fresh PKCE flow |
//! | `GET /oauth2/callback` | code exchange, email extraction, token persistence |
//! | `GET /api/accounts`    | JSON account summary (no secrets)                 |
//! | `POST /api/default`    | make an account the default (CSRF protected)      |
//! | `POST /api/remove`     | forget an account (CSRF protected)                |
//!
//! Everything else is a bare 404.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use gog_secrets::{Token, TokenStore};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::cancel::CancelHandle;
use crate::error::{AuthError, AuthResult};
use crate::identity::fetch_user_email;
use crate::oauth::{CALLBACK_PATH, CodeExchanger, PkceFlow, random_token};
use crate::pages::{render_accounts_page, render_error_page, render_success_page};
use crate::services::{Service, scopes_for, service_names};

/// Header carrying the CSRF token on state-changing requests.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// How long in-flight requests get to finish once the session ends.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Session settings.
#[derive(Debug, Clone)]
pub struct ManageConfig {
    /// OAuth client id sent to Google.
    pub client_id: String,
    /// Redirect URI registered for this session's listener.
    pub redirect_uri: String,
    /// Services requested on login.
    pub services: Vec<Service>,
    /// How long the session may stay open.
    pub timeout: Duration,
    /// End the session after the first successful login.
    pub exit_on_login: bool,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    LoggedIn { email: String, services: Vec<String> },
    Cancelled,
    TimedOut,
}

/// Account management and OAuth callback server.
///
/// Built per session and dropped afterwards; the CSRF token lives exactly
/// as long as the instance.
pub struct ManageServer {
    csrf_token: String,
    config: ManageConfig,
    tokens: Arc<TokenStore>,
    exchanger: Arc<dyn CodeExchanger>,
    /// OAuth state -> PKCE verifier for logins started in this session.
    pending: Mutex<HashMap<String, String>>,
    login_tx: watch::Sender<Option<SessionOutcome>>,
}

impl ManageServer {
    pub fn new(
        tokens: Arc<TokenStore>,
        exchanger: Arc<dyn CodeExchanger>,
        config: ManageConfig,
    ) -> Arc<Self> {
        let (login_tx, _) = watch::channel(None);
        Arc::new(Self {
            csrf_token: random_token(32),
            config,
            tokens,
            exchanger,
            pending: Mutex::new(HashMap::new()),
            login_tx,
        })
    }

    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    /// Builds the axum router for this session.
    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/", get(accounts_page))
            .route("/auth/start", get(auth_start))
            .route(CALLBACK_PATH, get(oauth_callback))
            .route("/api/accounts", get(list_accounts))
            .route("/api/default", post(set_default))
            .route("/api/remove", post(remove_account))
            .fallback(not_found)
            .with_state(Arc::clone(self))
    }

    /// Serves `listener` until a login completes (when `exit_on_login` is
    /// set), `cancel` fires, or the session times out.
    ///
    /// The listener is shut down gracefully on every exit path.
    pub async fn run(
        self: Arc<Self>,
        listener: TcpListener,
        cancel: CancelHandle,
    ) -> AuthResult<SessionOutcome> {
        let addr = listener.local_addr()?;
        info!(%addr, "manage server listening");

        let mut login_rx = self.login_tx.subscribe();
        let exit_on_login = self.config.exit_on_login;
        let timeout = self.config.timeout;

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let app = self.router();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.await;
                })
                .await
        });

        let outcome = tokio::select! {
            outcome = wait_for_login(&mut login_rx), if exit_on_login => outcome,
            _ = cancel.cancelled() => SessionOutcome::Cancelled,
            _ = tokio::time::sleep(timeout) => SessionOutcome::TimedOut,
        };
        debug!(?outcome, "manage session finished");

        let _ = stop_tx.send(());
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
            Ok(Ok(Ok(()))) => debug!(%addr, "manage server stopped"),
            Ok(Ok(Err(e))) => warn!(error = %e, "manage server exited with error"),
            Ok(Err(e)) => warn!(error = %e, "manage server task failed"),
            Err(_) => {
                warn!("manage server did not stop in time, aborting");
                server.abort();
            }
        }

        Ok(outcome)
    }

    fn check_csrf(&self, headers: &HeaderMap) -> Result<(), Response> {
        let presented = headers
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !presented.is_empty() && presented == self.csrf_token {
            Ok(())
        } else {
            warn!("rejected request with missing or wrong CSRF token");
            Err(api_error(StatusCode::FORBIDDEN, "invalid CSRF token"))
        }
    }

    async fn complete_login(&self, code: &str, verifier: &str) -> AuthResult<(String, Vec<String>)> {
        let token = self
            .exchanger
            .exchange(code, verifier, &self.config.redirect_uri)
            .await?;
        let email = fetch_user_email(Some(&token))?;
        let refresh_token = token
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingRefreshToken)?;

        let services = service_names(&self.config.services);
        let mut scopes = token.granted_scopes();
        if scopes.is_empty() {
            scopes = scopes_for(&self.config.services);
        }

        let stored = Token::new(&email, refresh_token, services.clone(), scopes);
        self.tokens.set_token(&email, &stored)?;
        if self.tokens.get_default_account()?.is_empty() {
            self.tokens.set_default_account(&email)?;
        }

        info!(email = %email, services = ?services, "account authorized");
        Ok((email, services))
    }
}

async fn wait_for_login(rx: &mut watch::Receiver<Option<SessionOutcome>>) -> SessionOutcome {
    let outcome = rx.wait_for(Option::is_some).await.ok().and_then(|o| o.clone());
    match outcome {
        Some(outcome) => outcome,
        // sender lives as long as the server
        None => std::future::pending().await,
    }
}

fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, axum::Json(json!({ "error": message.into() }))).into_response()
}

fn html_page(status: StatusCode, body: String) -> Response {
    (status, [(header::CACHE_CONTROL, "no-store")], Html(body)).into_response()
}

async fn accounts_page(State(server): State<Arc<ManageServer>>) -> Response {
    html_page(StatusCode::OK, render_accounts_page(&server.csrf_token))
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn auth_start(State(server): State<Arc<ManageServer>>) -> Response {
    let flow = PkceFlow::new();
    let scopes = scopes_for(&server.config.services);
    let url = flow.build_auth_url(&server.config.client_id, &server.config.redirect_uri, &scopes);

    match server.pending.lock() {
        Ok(mut pending) => {
            pending.insert(flow.state.clone(), flow.verifier.clone());
        }
        Err(_) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, "session state poisoned"),
    }

    debug!("redirecting to Google consent page");
    (StatusCode::FOUND, [(header::LOCATION, url)]).into_response()
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn oauth_callback(
    State(server): State<Arc<ManageServer>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(error) = params.error {
        warn!(error = %error, "authorization denied");
        return html_page(
            StatusCode::BAD_REQUEST,
            render_error_page(&AuthError::Denied(error).to_string()),
        );
    }

    let verifier = match server.pending.lock() {
        Ok(mut pending) => params.state.as_deref().and_then(|s| pending.remove(s)),
        Err(_) => None,
    };
    let Some(verifier) = verifier else {
        return html_page(
            StatusCode::BAD_REQUEST,
            render_error_page(&AuthError::StateMismatch.to_string()),
        );
    };
    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return html_page(
            StatusCode::BAD_REQUEST,
            render_error_page("missing authorization code in callback"),
        );
    };

    match server.complete_login(&code, &verifier).await {
        Ok((email, services)) => {
            let page = render_success_page(&email, &services);
            server.login_tx.send_replace(Some(SessionOutcome::LoggedIn { email, services }));
            html_page(StatusCode::OK, page)
        }
        Err(e) => {
            warn!(error = %e, "login failed");
            let status = match e {
                AuthError::Exchange { .. } | AuthError::Network(_) => StatusCode::BAD_GATEWAY,
                AuthError::Secrets(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            };
            html_page(status, render_error_page(&e.to_string()))
        }
    }
}

/// One row of `/api/accounts`.
#[derive(Debug, Serialize)]
struct AccountSummary {
    email: String,
    services: Vec<String>,
    created_at: DateTime<Utc>,
    default: bool,
}

async fn list_accounts(State(server): State<Arc<ManageServer>>) -> Response {
    let result = server.tokens.list_tokens().and_then(|tokens| {
        let default = server.tokens.get_default_account()?;
        Ok((tokens, default))
    });
    let (tokens, default) = match result {
        Ok(v) => v,
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let mut accounts: Vec<AccountSummary> = tokens
        .into_iter()
        .map(|t| AccountSummary {
            default: t.email == default,
            email: t.email,
            services: t.services,
            created_at: t.created_at,
        })
        .collect();
    accounts.sort_by(|a, b| a.email.cmp(&b.email));

    axum::Json(json!({ "accounts": accounts })).into_response()
}

#[derive(Debug, Deserialize)]
struct AccountRequest {
    email: String,
}

fn parse_account_request(body: &Bytes) -> Result<String, Response> {
    let request: AccountRequest = serde_json::from_slice(body)
        .map_err(|_| api_error(StatusCode::BAD_REQUEST, "expected {\"email\": \"...\"}"))?;
    let email = request.email.trim().to_string();
    if email.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "email is required"));
    }
    Ok(email)
}

async fn set_default(
    State(server): State<Arc<ManageServer>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(resp) = server.check_csrf(&headers) {
        return resp;
    }
    let email = match parse_account_request(&body) {
        Ok(email) => email,
        Err(resp) => return resp,
    };

    match server.tokens.get_token(&email) {
        Ok(_) => {}
        Err(e) if e.is_not_found() => {
            return api_error(StatusCode::NOT_FOUND, format!("no account {}", email));
        }
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
    if let Err(e) = server.tokens.set_default_account(&email) {
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    info!(email = %email, "default account changed");
    axum::Json(json!({ "ok": true })).into_response()
}

async fn remove_account(
    State(server): State<Arc<ManageServer>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(resp) = server.check_csrf(&headers) {
        return resp;
    }
    let email = match parse_account_request(&body) {
        Ok(email) => email,
        Err(resp) => return resp,
    };

    let result = server.tokens.delete_token(&email).and_then(|()| {
        if server.tokens.get_default_account()? == email {
            server.tokens.clear_default_account()?;
        }
        Ok(())
    });
    if let Err(e) = result {
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    info!(email = %email, "account removed");
    axum::Json(json!({ "ok": true })).into_response()
}
