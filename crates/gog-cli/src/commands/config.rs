//! Configuration commands.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::secret::SecretRef;

use super::Context;

/// Dump the current configuration to stdout.
///
/// `keyring.password` is masked unless it is a `pass::` or `env::` reference.
pub fn dump(ctx: &Context) -> ClientResult<()> {
    println!("# config.toml ({})", ctx.config_path.display());
    println!("{}", render(&ctx.config)?);
    Ok(())
}

fn render(config: &ClientConfig) -> ClientResult<String> {
    let mut config = config.clone();
    if let Some(password) = config.keyring.password.as_mut()
        && !SecretRef::parse(password).is_reference()
    {
        *password = "********".to_string();
    }
    toml::to_string_pretty(&config)
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))
}

/// Show the configuration file path.
pub fn path(ctx: &Context) -> ClientResult<()> {
    println!("config: {}", ctx.config_path.display());
    println!("credentials: {}", gog_core::credentials_path().display());
    println!("keyring: {}", ctx.config.keyring_dir().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_masks_plain_password() {
        let config: ClientConfig = toml::from_str("[keyring]\npassword = \"hunter2\"\n").unwrap();
        let out = render(&config).unwrap();
        assert!(!out.contains("hunter2"));
        assert!(out.contains("********"));
        assert!(out.contains("port_range"));
    }

    #[test]
    fn render_keeps_secret_references() {
        let config: ClientConfig =
            toml::from_str("[keyring]\npassword = \"env::GOG_VAULT\"\n").unwrap();
        assert!(render(&config).unwrap().contains("env::GOG_VAULT"));
    }
}
