//! gog CLI entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, FromArgMatches};

use gog_cli::cli::{AuthAction, Cli, Command, ConfigAction, help_description};
use gog_cli::commands::{self, Context};
use gog_cli::config::{ClientConfig, KEYRING_BACKEND_ENV, KEYRING_PASSWORD_ENV};
use gog_cli::error::{ClientError, ClientResult};
use gog_core::{TracingConfig, TracingOutputFormat, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::var_os("GOG_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(ClientConfig::default_path);
    let footer_config = ClientConfig::load_from(&config_path).unwrap_or_default();
    let footer = help_description(
        &config_path,
        &footer_config.keyring_backend_info(std::env::var(KEYRING_BACKEND_ENV).ok().as_deref()),
    );

    let matches = Cli::command().after_long_help(footer).get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    let tracing_config = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::cli()
    };
    let format = TracingOutputFormat::parse(&cli.log_format).unwrap_or_default();
    if let Err(e) = init_tracing(tracing_config.with_format(format)) {
        eprintln!("warning: could not initialize logging: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let (config, config_path) = match cli.config {
        Some(path) => (ClientConfig::load_from(&path).map_err(ClientError::Config)?, path),
        None => (
            ClientConfig::load().map_err(ClientError::Config)?,
            ClientConfig::default_path(),
        ),
    };

    let ctx = Context::new(
        config,
        config_path,
        cli.keyring_backend.as_deref(),
        std::env::var(KEYRING_PASSWORD_ENV).ok(),
        !cli.no_input,
    );

    match cli.command {
        Command::Auth { action } => match action {
            AuthAction::Credentials { file } => commands::auth::credentials(&file),
            AuthAction::Add {
                services,
                no_browser,
            } => commands::auth::add(&ctx, services, no_browser).await,
            AuthAction::Manage { no_browser } => commands::auth::manage(&ctx, no_browser).await,
            AuthAction::List { json } => commands::auth::list(&ctx, json),
            AuthAction::Remove { email } => commands::auth::remove(&ctx, &email),
            AuthAction::Default { email } => commands::auth::default(&ctx, email),
            AuthAction::Status => commands::auth::status(&ctx),
            AuthAction::Services { markdown } => commands::auth::services(markdown),
        },
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&ctx),
            ConfigAction::Path => commands::config::path(&ctx),
        },
    }
}
