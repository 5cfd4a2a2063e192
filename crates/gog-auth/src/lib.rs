//! Google OAuth login for gog.
//!
//! - [`ManageServer`] - loopback server for the account page and OAuth callback
//! - [`PkceFlow`] / [`GoogleOAuthClient`] - authorization URL and code exchange
//! - [`fetch_user_email`] - account email from the returned identity token
//! - [`read_http_body_snippet`] - log-safe fingerprint of HTTP bodies
//! - [`Service`] - services gog can be authorized for
//!
//! # Flow
//!
//! ```text
//!  gog auth add ──▶ bind 127.0.0.1:<port> ──▶ browser /auth/start
//!                                                  │ 302
//!                                                  ▼
//!                                       Google consent page
//!                                                  │ redirect
//!                                                  ▼
//!                                       /oauth2/callback?code&state
//!                                                  │ exchange + id_token
//!                                                  ▼
//!                                       TokenStore::set_token
//! ```

pub mod cancel;
pub mod diagnostics;
pub mod error;
pub mod identity;
pub mod manage;
pub mod oauth;
pub mod pages;
pub mod services;

pub use cancel::CancelHandle;
pub use diagnostics::{BODY_SNIPPET_LIMIT, read_http_body_snippet, summarize_body};
pub use error::{AuthError, AuthResult, IdTokenPart};
pub use identity::{OAuthToken, email_from_id_token, fetch_user_email};
pub use manage::{CSRF_HEADER, ManageConfig, ManageServer, SessionOutcome};
pub use oauth::{
    BoxFuture, CALLBACK_PATH, CodeExchanger, GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL, GoogleOAuthClient,
    PkceFlow, bind_loopback, redirect_uri_for,
};
pub use pages::{render_accounts_page, render_error_page, render_success_page};
pub use services::{
    IDENTITY_SCOPES, Service, parse_services, scopes_for, service_names, services_markdown_table,
};
