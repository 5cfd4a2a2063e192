//! Command-line interface definition.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use gog_secrets::KeyringBackendInfo;

/// gog - Google Workspace from the terminal
#[derive(Debug, Parser)]
#[command(name = "gog")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, global = true, env = "GOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Log format for diagnostics on stderr (compact, pretty, json)
    #[arg(long, global = true, default_value = "compact")]
    pub log_format: String,

    /// Keyring backend: auto, keychain, file or memory
    #[arg(long, global = true, env = "GOG_KEYRING_BACKEND")]
    pub keyring_backend: Option<String>,

    /// Never prompt; fail instead of asking for the keyring password
    #[arg(long, global = true)]
    pub no_input: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Account and credential management
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// `gog auth` subcommands.
#[derive(Debug, Subcommand)]
pub enum AuthAction {
    /// Register the OAuth client JSON downloaded from Google Cloud Console
    Credentials {
        /// Path to the downloaded client_secret_*.json
        file: PathBuf,
    },

    /// Authorize a Google account
    Add {
        /// Comma separated services (gmail, calendar, tasks); default: all
        #[arg(long)]
        services: Option<String>,

        /// Print the login URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },

    /// Open the account management page in the browser
    Manage {
        /// Print the page URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },

    /// List authorized accounts
    List {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Forget an account
    Remove {
        /// Account email
        email: String,
    },

    /// Show or set the default account
    Default {
        /// Account email to make the default
        email: Option<String>,
    },

    /// Show configuration, credentials and keyring status
    Status,

    /// List services and the OAuth scopes they need
    Services {
        /// Render as a markdown table
        #[arg(long)]
        markdown: bool,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Show configuration file path
    Path,
}

/// Footer of `gog --help`: where configuration is read from and which
/// keyring backend is in effect.
pub fn help_description(config_path: &Path, backend: &KeyringBackendInfo) -> String {
    format!(
        "Config:\n  file: {}\n  keyring backend: {} (source: {})",
        config_path.display(),
        backend.value,
        backend.source
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_auth_add() {
        let cli = Cli::try_parse_from([
            "gog",
            "--no-input",
            "auth",
            "add",
            "--services",
            "gmail,tasks",
            "--no-browser",
        ])
        .unwrap();
        assert!(cli.no_input);
        match cli.command {
            Command::Auth {
                action: AuthAction::Add { services, no_browser },
            } => {
                assert_eq!(services.as_deref(), Some("gmail,tasks"));
                assert!(no_browser);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn help_description_names_config_and_backend() {
        let text = help_description(
            Path::new("/home/u/.config/gogcli/config.toml"),
            &KeyringBackendInfo::default(),
        );
        assert!(text.contains("Config:"));
        assert!(text.contains("keyring backend: auto"));
        insta::assert_snapshot!(text, @r"
        Config:
          file: /home/u/.config/gogcli/config.toml
          keyring backend: auto (source: default)
        ");
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["gog", "auth", "list", "--json", "--keyring-backend", "file"])
            .unwrap();
        assert_eq!(cli.keyring_backend.as_deref(), Some("file"));
    }
}
