// =============================================================================
// Persistence - abstract key-value store for engine state
// =============================================================================
//
// The engine persists the ledger (balance, open trades, closed history)
// through this interface so restarts pick up where the process left off.
// Values are opaque bytes; the caller owns the serialisation.
// =============================================================================

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use parking_lot::RwLock;

/// Minimal key-value persistence collaborator.
pub trait KvStore: Send + Sync {
    /// Load the value for `key`, or `None` if it was never saved.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Save `bytes` under `key`, replacing any previous value.
    fn save(&self, key: &str, bytes: &[u8]) -> Result<()>;
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// Stores each key as `<root>/<key>.json`, written atomically
/// (tmp + rename) so a crash mid-write never corrupts existing state.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are engine-internal identifiers; flatten anything
        // path-hostile rather than erroring.
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            })
            .collect();
        self.root.join(format!("{safe}.json"))
    }
}

impl KvStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("failed to read state from {}", path.display()))
            }
        }
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create state dir {}", self.root.display()))?;

        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, bytes)
            .with_context(|| format!("failed to write tmp state to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, &path)
            .with_context(|| format!("failed to rename tmp state to {}", path.display()))?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Volatile store for tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.map.write().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.load("ledger").unwrap().is_none());

        store.save("ledger", b"{\"balance\":1}").unwrap();
        assert_eq!(
            store.load("ledger").unwrap().as_deref(),
            Some(&b"{\"balance\":1}"[..])
        );

        store.save("ledger", b"{\"balance\":2}").unwrap();
        assert_eq!(
            store.load("ledger").unwrap().as_deref(),
            Some(&b"{\"balance\":2}"[..])
        );
    }

    #[test]
    fn file_store_roundtrip_and_overwrite() {
        let root = std::env::temp_dir().join(format!("vega_store_test_{}", uuid::Uuid::new_v4()));
        let store = FileStore::new(&root);

        assert!(store.load("ledger").unwrap().is_none());

        store.save("ledger", b"first").unwrap();
        assert_eq!(store.load("ledger").unwrap().as_deref(), Some(&b"first"[..]));

        store.save("ledger", b"second").unwrap();
        assert_eq!(
            store.load("ledger").unwrap().as_deref(),
            Some(&b"second"[..])
        );

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn file_store_sanitises_hostile_keys() {
        let root = std::env::temp_dir().join(format!("vega_store_test_{}", uuid::Uuid::new_v4()));
        let store = FileStore::new(&root);

        store.save("../escape/attempt", b"x").unwrap();
        assert_eq!(
            store.load("../escape/attempt").unwrap().as_deref(),
            Some(&b"x"[..])
        );
        // Nothing escaped the root directory.
        assert!(root.join("___escape_attempt.json").exists());

        std::fs::remove_dir_all(&root).ok();
    }
}
