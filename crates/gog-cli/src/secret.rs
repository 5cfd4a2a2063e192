//! References to secrets kept outside `config.toml`.
//!
//! `keyring.password` may name where the vault password lives instead of
//! holding it: `pass::<entry>` reads the first line of a password-store
//! entry, `env::<VAR>` reads an environment variable. Any other value is the
//! password itself.

use std::process::Command;

/// A parsed `keyring.password` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretRef<'a> {
    Pass(&'a str),
    Env(&'a str),
    Plain(&'a str),
}

impl<'a> SecretRef<'a> {
    pub fn parse(raw: &'a str) -> Self {
        if let Some(entry) = raw.strip_prefix("pass::") {
            Self::Pass(entry)
        } else if let Some(var) = raw.strip_prefix("env::") {
            Self::Env(var)
        } else {
            Self::Plain(raw)
        }
    }

    /// Whether the value points elsewhere rather than being the secret.
    pub fn is_reference(&self) -> bool {
        !matches!(self, Self::Plain(_))
    }

    pub fn resolve(&self) -> Result<String, String> {
        match *self {
            Self::Pass(entry) => read_pass_entry(entry),
            Self::Env(var) => {
                std::env::var(var).map_err(|_| format!("environment variable `{}` is not set", var))
            }
            Self::Plain(value) => Ok(value.to_string()),
        }
    }
}

/// Resolves `raw`, following a `pass::` or `env::` reference.
pub fn resolve(raw: &str) -> Result<String, String> {
    SecretRef::parse(raw).resolve()
}

// stderr is dropped: pass may print parts of the entry there
fn read_pass_entry(entry: &str) -> Result<String, String> {
    let output = Command::new("pass")
        .args(["show", entry])
        .output()
        .map_err(|e| format!("cannot run `pass`: {}", e))?;
    if !output.status.success() {
        return Err(format!("`pass show {}` exited with {}", entry, output.status));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    match stdout.lines().next() {
        Some(line) if !line.is_empty() => Ok(line.to_string()),
        _ => Err(format!("pass entry {} is empty", entry)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_prefixes() {
        assert_eq!(SecretRef::parse("pass::gog/vault"), SecretRef::Pass("gog/vault"));
        assert_eq!(SecretRef::parse("env::VAULT_PW"), SecretRef::Env("VAULT_PW"));
        assert_eq!(SecretRef::parse("hunter2"), SecretRef::Plain("hunter2"));
        // prefixes are case sensitive
        assert_eq!(SecretRef::parse("ENV::X"), SecretRef::Plain("ENV::X"));

        assert!(SecretRef::parse("env::X").is_reference());
        assert!(!SecretRef::parse("x").is_reference());
    }

    #[test]
    fn plain_value_is_the_secret() {
        assert_eq!(resolve("hunter2").unwrap(), "hunter2");
        assert_eq!(resolve("").unwrap(), "");
    }

    #[test]
    fn env_reference() {
        unsafe {
            std::env::set_var("_GOG_TEST_VAULT_PASSWORD", "from-env");
        }
        assert_eq!(resolve("env::_GOG_TEST_VAULT_PASSWORD").unwrap(), "from-env");
        unsafe {
            std::env::remove_var("_GOG_TEST_VAULT_PASSWORD");
        }

        let err = resolve("env::_GOG_NONEXISTENT_VAR_12345").unwrap_err();
        assert!(err.contains("not set"));
    }

    #[test]
    fn pass_reference_failure() {
        assert!(resolve("pass::nonexistent/gog/entry/12345").is_err());
    }
}
