//! The `gog` command-line client.
//!
//! Parses the command tree, loads `config.toml` and dispatches `gog auth`
//! commands onto the secret store and the login flow.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod secret;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
