//! Core helpers shared by the gog crates: tracing, on-disk locations,
//! OAuth client credentials and HTML escaping.

pub mod credentials;
pub mod html;
pub mod paths;
pub mod tracing;

pub use credentials::{CredentialsError, CredentialsMissingError, OAuthCredentials};
pub use html::html_escape;
pub use paths::{
    APP_DIR_NAME, config_dir, config_file_path, credentials_path, ensure_keyring_dir,
    ensure_private_dir, keyring_dir,
};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
