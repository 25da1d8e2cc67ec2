//! Cross-invocation bearer token cache.
//!
//! The client never reads ambient process state for tokens; whatever store
//! should outlive a client is handed in explicitly through [`TokenCache`].
//! Every implementation is a best-effort hint: a stale or missing entry only
//! costs an extra login.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use anyhow::Context;

/// Key/value store used to share a bearer token between client instances.
pub trait TokenCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// Cache that remembers nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTokenCache;

impl TokenCache for NoopTokenCache {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// In-process cache; clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenCache {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenCache for MemoryTokenCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow::anyhow!("token cache lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON file cache shared by separate invocations of the binary.
///
/// Reads and writes use blocking `std::fs`; the client runs writes on the
/// blocking pool and reads once, when the cache is attached.
#[derive(Debug, Clone)]
pub struct FileTokenCache {
    path: PathBuf,
}

impl FileTokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> anyhow::Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read token cache {}", self.path.display()))?;
        if contents.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse token cache {}", self.path.display()))
    }
}

impl TokenCache for FileTokenCache {
    fn get(&self, key: &str) -> Option<String> {
        match self.load() {
            Ok(mut entries) => entries.remove(key).filter(|v| !v.trim().is_empty()),
            Err(e) => {
                tracing::warn!("Ignoring unreadable token cache: {:#}", e);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut entries = self.load().unwrap_or_default();
        entries.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create token cache dir {}", parent.display())
                })?;
            }
        }

        let contents = serde_json::to_string_pretty(&entries)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write token cache {}", self.path.display()))
    }
}
