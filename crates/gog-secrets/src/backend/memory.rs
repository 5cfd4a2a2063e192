//! In-memory backend for tests and ephemeral sessions.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{SecretError, SecretResult};
use crate::selector::BackendKind;

use super::SecretBackend;

/// Keeps secrets in a process-local map.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> SecretError {
    SecretError::backend("memory", "lock poisoned")
}

impl SecretBackend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn set(&self, key: &str, value: &[u8]) -> SecretResult<()> {
        self.entries
            .write()
            .map_err(|_| poisoned())?
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> SecretResult<Vec<u8>> {
        self.entries
            .read()
            .map_err(|_| poisoned())?
            .get(key)
            .cloned()
            .ok_or_else(|| SecretError::not_found(key))
    }

    fn remove(&self, key: &str) -> SecretResult<()> {
        self.entries
            .write()
            .map_err(|_| poisoned())?
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| SecretError::not_found(key))
    }

    fn keys(&self) -> SecretResult<Vec<String>> {
        Ok(self
            .entries
            .read()
            .map_err(|_| poisoned())?
            .keys()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let backend = MemoryBackend::new();
        backend.set("k", b"v").unwrap();
        assert_eq!(backend.get("k").unwrap(), b"v");

        backend.set("k", b"v2").unwrap();
        assert_eq!(backend.get("k").unwrap(), b"v2");
        assert_eq!(backend.keys().unwrap(), vec!["k".to_string()]);

        backend.remove("k").unwrap();
        assert!(backend.get("k").unwrap_err().is_not_found());
        assert!(backend.remove("k").unwrap_err().is_not_found());
        assert!(backend.keys().unwrap().is_empty());
    }

    #[test]
    fn empty_value_is_stored() {
        let backend = MemoryBackend::new();
        backend.set("empty", b"").unwrap();
        assert_eq!(backend.get("empty").unwrap(), Vec::<u8>::new());
    }
}
