//! On-disk locations used by gog.
//!
//! Everything lives under the platform config directory
//! (`$XDG_CONFIG_HOME/gogcli` on Linux):
//!
//! - `config.toml`: CLI configuration
//! - `credentials.json`: the OAuth client downloaded from Google Cloud Console
//! - `keyring/`: the encrypted file vault used by the `file` keyring backend

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Name of the per-user application directory.
pub const APP_DIR_NAME: &str = "gogcli";

/// Returns the gog configuration directory.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Returns the default `config.toml` path.
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Returns the path where the OAuth client credentials are expected.
pub fn credentials_path() -> PathBuf {
    config_dir().join("credentials.json")
}

/// Returns the directory holding the encrypted file vault.
pub fn keyring_dir() -> PathBuf {
    config_dir().join("keyring")
}

/// Creates the keyring directory (mode 0700 on Unix) and returns its path.
pub fn ensure_keyring_dir() -> io::Result<PathBuf> {
    let dir = keyring_dir();
    ensure_private_dir(&dir)?;
    Ok(dir)
}

/// Creates `dir` and its parents, restricting `dir` itself to the owner.
pub fn ensure_private_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }

    debug!(dir = %dir.display(), "ensured private directory");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_share_app_dir() {
        let base = config_dir();
        assert!(base.ends_with(APP_DIR_NAME));
        assert_eq!(config_file_path(), base.join("config.toml"));
        assert_eq!(credentials_path(), base.join("credentials.json"));
        assert_eq!(keyring_dir(), base.join("keyring"));
    }

    #[test]
    fn ensure_private_dir_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("a").join("keyring");
        ensure_private_dir(&dir).unwrap();
        assert!(dir.is_dir());

        // idempotent
        ensure_private_dir(&dir).unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&dir).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }
}
