//! Password source for the encrypted file vault.

use std::io::IsTerminal;
use std::sync::Arc;

use tracing::debug;

use crate::error::{SecretError, SecretResult};

/// Prompt shown when the vault password has to be typed in.
pub const VAULT_PASSWORD_PROMPT: &str = "Password for gog keyring vault";

/// Supplies the vault password; called with a human-readable prompt.
pub type PasswordFunc = Box<dyn Fn(&str) -> SecretResult<String> + Send + Sync>;

/// Produces the configured vault password on demand; empty means none is
/// configured. Only called when the file backend is actually opened.
pub type PasswordSource = Arc<dyn Fn() -> SecretResult<String> + Send + Sync>;

/// Builds the password provider for the file backend.
///
/// A configured password always wins and no terminal is touched. Without
/// one, the provider prompts on the terminal when `prompt_allowed` is set and
/// stdin is a TTY; otherwise it fails with [`SecretError::NoTty`].
pub fn file_password_func(configured: impl Into<String>, prompt_allowed: bool) -> PasswordFunc {
    let configured = configured.into();
    Box::new(move |prompt: &str| {
        if !configured.is_empty() {
            return Ok(configured.clone());
        }
        if !prompt_allowed || !std::io::stdin().is_terminal() {
            debug!(prompt_allowed, "cannot prompt for keyring password");
            return Err(SecretError::NoTty);
        }
        prompt_password(prompt)
    })
}

fn prompt_password(prompt: &str) -> SecretResult<String> {
    dialoguer::Password::new()
        .with_prompt(prompt)
        .allow_empty_password(false)
        .interact()
        .map_err(|e| SecretError::backend("file", format!("failed to read password: {}", e)))
}
