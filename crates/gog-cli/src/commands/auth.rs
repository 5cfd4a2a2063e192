//! `gog auth` commands.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use gog_auth::{
    CancelHandle, GoogleOAuthClient, ManageConfig, ManageServer, Service, SessionOutcome,
    bind_loopback, parse_services, redirect_uri_for, services_markdown_table,
};
use gog_core::OAuthCredentials;
use gog_secrets::{Token, TokenStore, format_token_key};
use serde_json::json;
use tracing::{info, warn};

use super::Context;
use crate::cli::help_description;
use crate::error::{ClientError, ClientResult};

/// Timeout of the authorization-code exchange request.
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Validates `file` and installs it as the OAuth client credentials.
pub fn credentials(file: &Path) -> ClientResult<()> {
    let content = std::fs::read_to_string(file)?;
    let creds = OAuthCredentials::from_json(&content)?;
    let dest = gog_core::credentials_path();
    install_credentials(&content, &dest)?;
    info!(path = %dest.display(), "installed OAuth client credentials");
    println!("Saved OAuth client {} to {}", creds.client_id, dest.display());
    Ok(())
}

/// Writes `content` to `dest` (mode 0600), replacing any previous file.
fn install_credentials(content: &str, dest: &Path) -> ClientResult<()> {
    if let Some(parent) = dest.parent() {
        gog_core::ensure_private_dir(parent)?;
    }
    let tmp = dest.with_extension("json.tmp");
    std::fs::write(&tmp, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp, dest)?;
    Ok(())
}

/// Authorizes one account through the browser.
pub async fn add(ctx: &Context, services: Option<String>, no_browser: bool) -> ClientResult<()> {
    let requested = services.unwrap_or_else(|| ctx.config.auth.services_arg());
    let services = parse_services(&requested)?;

    match run_session(ctx, services, true, "/auth/start", no_browser).await? {
        SessionOutcome::LoggedIn { email, services } => {
            println!("Authorized {} ({})", email, services.join(", "));
            Ok(())
        }
        SessionOutcome::Cancelled => Err(ClientError::Login("cancelled".to_string())),
        SessionOutcome::TimedOut => Err(ClientError::Login(format!(
            "no authorization received within {}s",
            ctx.config.auth.timeout_secs
        ))),
    }
}

/// Serves the account management page until Ctrl+C or the session timeout.
pub async fn manage(ctx: &Context, no_browser: bool) -> ClientResult<()> {
    let services = parse_services(&ctx.config.auth.services_arg())?;
    match run_session(ctx, services, false, "/", no_browser).await? {
        SessionOutcome::TimedOut => println!("Session timed out."),
        SessionOutcome::Cancelled | SessionOutcome::LoggedIn { .. } => {}
    }
    Ok(())
}

async fn run_session(
    ctx: &Context,
    services: Vec<Service>,
    exit_on_login: bool,
    path: &str,
    no_browser: bool,
) -> ClientResult<SessionOutcome> {
    let credentials = OAuthCredentials::load(gog_core::credentials_path())?;
    let tokens = ctx.open_tokens()?;

    let client = GoogleOAuthClient::new(credentials, EXCHANGE_TIMEOUT)?;
    let (listener, port) = bind_loopback(ctx.config.auth.port_range).await?;
    let config = ManageConfig {
        client_id: client.client_id().to_string(),
        redirect_uri: redirect_uri_for(port),
        services,
        timeout: ctx.config.auth.timeout(),
        exit_on_login,
    };
    let server = ManageServer::new(tokens, Arc::new(client), config);

    let url = format!("http://127.0.0.1:{}{}", port, path);
    open_or_print(&url, no_browser);

    let cancel = CancelHandle::new();
    cancel.cancel_on_ctrl_c();
    Ok(server.run(listener, cancel).await?)
}

fn open_or_print(url: &str, no_browser: bool) {
    if no_browser {
        println!("Open this URL in your browser:\n\n  {}\n", url);
        return;
    }
    println!("Opening {} in your browser...", url);
    if let Err(e) = open::that(url) {
        warn!(error = %e, "could not open browser");
        println!("Could not open a browser. Open this URL manually:\n\n  {}\n", url);
    }
}

/// Lists authorized accounts.
pub fn list(ctx: &Context, as_json: bool) -> ClientResult<()> {
    let tokens = ctx.open_tokens()?;
    let mut accounts = tokens.list_tokens()?;
    accounts.sort_by(|a, b| a.email.cmp(&b.email));
    let default = tokens.get_default_account()?;

    if as_json {
        println!("{}", render_accounts_json(&accounts, &default)?);
    } else if accounts.is_empty() {
        println!("No accounts. Run `gog auth add` to authorize one.");
    } else {
        print!("{}", render_accounts(&accounts, &default));
    }
    Ok(())
}

/// One line per account; the default account is marked with `*`.
fn render_accounts(accounts: &[Token], default: &str) -> String {
    let mut out = String::new();
    for token in accounts {
        let marker = if token.email == default { "*" } else { " " };
        let _ = writeln!(
            out,
            "{} {}\t{}\t{}",
            marker,
            token.email,
            token.services.join(","),
            token.created_at.format("%Y-%m-%d")
        );
    }
    out
}

fn render_accounts_json(accounts: &[Token], default: &str) -> ClientResult<String> {
    let accounts: Vec<_> = accounts
        .iter()
        .map(|t| {
            json!({
                "email": t.email,
                "services": t.services,
                "scopes": t.scopes,
                "created_at": t.created_at.to_rfc3339(),
                "default": t.email == default,
            })
        })
        .collect();
    serde_json::to_string_pretty(&json!({ "accounts": accounts, "default": default }))
        .map_err(|e| ClientError::Config(format!("failed to render accounts: {}", e)))
}

/// Forgets an account.
pub fn remove(ctx: &Context, email: &str) -> ClientResult<()> {
    let tokens = ctx.open_tokens()?;
    remove_account(&tokens, email)?;
    println!("Removed {}", email.trim());
    Ok(())
}

/// Deletes `email`'s token and clears the default pointer if it named
/// that account.
fn remove_account(tokens: &TokenStore, email: &str) -> ClientResult<()> {
    let email = email.trim();
    // unreadable tokens can still be removed
    if !tokens.keys()?.contains(&format_token_key(email)) {
        return Err(ClientError::Usage(format!("no account {}", email)));
    }

    tokens.delete_token(email)?;
    if tokens.get_default_account()? == email {
        tokens.clear_default_account()?;
        info!(email, "cleared default account");
    }
    Ok(())
}

/// Shows or sets the default account.
pub fn default(ctx: &Context, email: Option<String>) -> ClientResult<()> {
    let tokens = ctx.open_tokens()?;
    match email {
        Some(email) => {
            set_default(&tokens, &email)?;
            println!("Default account: {}", email.trim());
        }
        None => {
            let current = tokens.get_default_account()?;
            if current.is_empty() {
                println!("No default account.");
            } else {
                println!("{}", current);
            }
        }
    }
    Ok(())
}

/// Only accounts with a stored token can become the default.
fn set_default(tokens: &TokenStore, email: &str) -> ClientResult<()> {
    let email = email.trim();
    match tokens.get_token(email) {
        Ok(_) => Ok(tokens.set_default_account(email)?),
        Err(e) if e.is_not_found() => Err(ClientError::Usage(format!(
            "no account {}; run `gog auth add` first",
            email
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Prints configuration, credentials and keyring status.
pub fn status(ctx: &Context) -> ClientResult<()> {
    println!("{}", help_description(&ctx.config_path, &ctx.backend));

    let creds_path = gog_core::credentials_path();
    let creds_state = match OAuthCredentials::load(&creds_path) {
        Ok(_) => "ok".to_string(),
        Err(e) => e.to_string(),
    };
    println!("  credentials: {} ({})", creds_path.display(), creds_state);

    match ctx.open_tokens() {
        Ok(tokens) => {
            let accounts = tokens.list_tokens()?;
            let default = tokens.get_default_account()?;
            println!("  keyring: {}", tokens.secrets().kind());
            println!("  accounts: {}", accounts.len());
            if !default.is_empty() {
                println!("  default account: {}", default);
            }
        }
        Err(e) => println!("  keyring: unavailable ({})", e),
    }
    Ok(())
}

/// Lists services and their OAuth scopes.
pub fn services(markdown: bool) -> ClientResult<()> {
    if markdown {
        print!("{}", services_markdown_table());
        return Ok(());
    }
    for svc in Service::ALL {
        println!("{:<10} {}", svc.as_str(), svc.label());
        for scope in svc.scopes() {
            println!("           {}", scope);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn token(email: &str) -> Token {
        let mut token = Token::new(email, "rt", vec!["gmail".into(), "tasks".into()], vec![]);
        token.created_at = DateTime::parse_from_rfc3339("2025-03-04T05:06:07Z")
            .unwrap()
            .with_timezone(&Utc);
        token
    }

    fn store_with(emails: &[&str]) -> TokenStore {
        let store = TokenStore::in_memory();
        for email in emails {
            store.set_token(email, &token(email)).unwrap();
        }
        store
    }

    #[test]
    fn install_credentials_writes_private_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("gogcli").join("credentials.json");
        let content = r#"{"installed":{"client_id":"id","client_secret":"s"}}"#;

        install_credentials(content, &dest).unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), content);
        assert!(!dest.with_extension("json.tmp").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&dest).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        // replaces an existing file
        install_credentials("{}", &dest).unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "{}");
    }

    #[test]
    fn render_accounts_marks_default() {
        let accounts = vec![token("a@b.com"), token("c@d.com")];
        assert_eq!(
            render_accounts(&accounts, "c@d.com"),
            "  a@b.com\tgmail,tasks\t2025-03-04\n* c@d.com\tgmail,tasks\t2025-03-04\n"
        );
    }

    #[test]
    fn render_accounts_json_has_no_secrets() {
        let json = render_accounts_json(&[token("a@b.com")], "a@b.com").unwrap();
        assert!(!json.contains("\"rt\""));
        assert!(!json.contains("refresh_token"));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["default"], "a@b.com");
        assert_eq!(value["accounts"][0]["email"], "a@b.com");
        assert_eq!(value["accounts"][0]["default"], true);
        assert_eq!(value["accounts"][0]["created_at"], "2025-03-04T05:06:07+00:00");
    }

    #[test]
    fn remove_clears_matching_default() {
        let store = store_with(&["a@b.com", "c@d.com"]);
        store.set_default_account("a@b.com").unwrap();

        remove_account(&store, "c@d.com").unwrap();
        assert_eq!(store.get_default_account().unwrap(), "a@b.com");

        remove_account(&store, "a@b.com").unwrap();
        assert_eq!(store.get_default_account().unwrap(), "");
        assert!(store.list_tokens().unwrap().is_empty());
    }

    #[test]
    fn remove_deletes_undecodable_token() {
        let store = store_with(&[]);
        store.secrets().set("token:a@b.com", b"garbage").unwrap();
        remove_account(&store, "a@b.com").unwrap();
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn remove_unknown_account_is_usage_error() {
        let store = store_with(&[]);
        let err = remove_account(&store, "x@y.com").unwrap_err();
        assert!(matches!(err, ClientError::Usage(_)));
    }

    #[test]
    fn default_requires_stored_token() {
        let store = store_with(&["a@b.com"]);
        let err = set_default(&store, "x@y.com").unwrap_err();
        assert!(matches!(err, ClientError::Usage(_)));
        assert_eq!(store.get_default_account().unwrap(), "");

        set_default(&store, " a@b.com ").unwrap();
        assert_eq!(store.get_default_account().unwrap(), "a@b.com");
    }
}
