//! Rewrites platform keychain failures into actionable errors.
//!
//! On macOS a locked login keychain surfaces as `errSecInteractionNotAllowed`
//! (`-25308`) deep inside a generic platform failure. That is the only
//! rewrite performed here; on every other platform the function is a
//! pass-through.

use std::error::Error;

use crate::error::SecretError;

/// `errSecInteractionNotAllowed`, reported when the keychain is locked.
pub const LOCKED_KEYCHAIN_MARKER: &str = "-25308";

/// Message macOS attaches to `errSecInteractionNotAllowed`.
const LOCKED_KEYCHAIN_MESSAGE: &str = "User interaction is not allowed";

/// Whether `err`, or any error in its source chain, is the locked-keychain
/// status.
///
/// Security framework errors print only the OS message; the numeric status
/// shows up in their `Debug` form, so both renderings are checked.
pub fn is_locked_keychain_error(err: &(dyn Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        let display = e.to_string();
        if display.contains(LOCKED_KEYCHAIN_MARKER)
            || display.contains(LOCKED_KEYCHAIN_MESSAGE)
            || format!("{:?}", e).contains(LOCKED_KEYCHAIN_MARKER)
        {
            return true;
        }
        current = e.source();
    }
    false
}

/// Translates a keychain error, preserving it as the cause.
#[cfg(target_os = "macos")]
pub fn translate_keychain_error(err: SecretError) -> SecretError {
    if matches!(err, SecretError::LockedKeychain { .. }) {
        return err;
    }
    if is_locked_keychain_error(&err) {
        tracing::warn!("keychain is locked");
        return SecretError::LockedKeychain {
            source: Box::new(err),
        };
    }
    err
}

/// Translates a keychain error. Keychains cannot be locked this way outside
/// macOS, so the error is returned unchanged.
#[cfg(not(target_os = "macos"))]
pub fn translate_keychain_error(err: SecretError) -> SecretError {
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Shaped like a security framework status error: the code only shows up
    /// in `Debug`.
    #[allow(dead_code)]
    #[derive(Debug)]
    struct OsStatus {
        code: i32,
        message: &'static str,
    }

    impl std::fmt::Display for OsStatus {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.message)
        }
    }

    impl Error for OsStatus {}

    fn platform(code: i32, message: &'static str) -> SecretError {
        SecretError::Keychain {
            source: keyring::Error::PlatformFailure(Box::new(OsStatus { code, message })),
        }
    }

    fn locked() -> SecretError {
        platform(-25308, "User interaction is not allowed.")
    }

    #[test]
    fn locked_status_is_found_through_the_source_chain() {
        assert!(is_locked_keychain_error(&locked()));
        // code without the usual message
        assert!(is_locked_keychain_error(&platform(-25308, "locked")));
        assert!(!is_locked_keychain_error(&platform(-25300, "The specified item could not be found.")));
        assert!(!is_locked_keychain_error(&SecretError::not_found("token:a@b.com")));
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn locked_keychain_is_rewritten() {
        let translated = translate_keychain_error(locked());
        assert!(matches!(translated, SecretError::LockedKeychain { .. }));
        assert!(translated.to_string().contains("keychain is locked"));

        let cause = translated.source().expect("original error kept");
        assert!(matches!(
            cause.downcast_ref::<SecretError>(),
            Some(SecretError::Keychain { .. })
        ));
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn locked_signature_passes_through() {
        let original = locked();
        let message = original.to_string();
        let translated = translate_keychain_error(original);
        assert!(matches!(translated, SecretError::Keychain { .. }));
        assert_eq!(translated.to_string(), message);
    }

    #[test]
    fn unrelated_errors_pass_through() {
        let translated = translate_keychain_error(SecretError::not_found("token:a@b.com"));
        assert!(translated.is_not_found());
    }
}
