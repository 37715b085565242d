// In-memory resolution cache

use std::collections::HashMap;
use std::path::PathBuf;

use parking_lot::RwLock;

/// Process-lifetime map from reference key to resolved artifact path.
///
/// Entries are never evicted. All access goes through `get`/`put`.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: RwLock<HashMap<String, PathBuf>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<PathBuf> {
        self.entries.read().get(key).cloned()
    }

    /// Insert or overwrite.
    pub fn put(&self, key: impl Into<String>, path: PathBuf) {
        self.entries.write().insert(key.into(), path);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
