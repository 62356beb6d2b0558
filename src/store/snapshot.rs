//! Snapshot persistence for the member map.
//!
//! The map is always written whole. There is no append log, so a snapshot
//! is either the previous complete map or the new complete map.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{MemberMap, SubscriptionRecord};
use crate::error::{Result, TollgateError};

/// Durable storage for the member map.
///
/// Calls are synchronous: the event lane waits for the write before running
/// any side effect of the event that caused it.
pub trait SnapshotStore: Send + Sync {
    /// Load the last saved map. A missing snapshot is an empty map.
    fn load(&self) -> Result<MemberMap>;

    /// Replace the stored map with `members`.
    fn save(&self, members: &MemberMap) -> Result<()>;
}

/// JSON file snapshot, one object keyed by subscriber id.
#[derive(Debug, Clone)]
pub struct JsonFileSnapshot {
    path: PathBuf,
}

impl JsonFileSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "members.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotStore for JsonFileSnapshot {
    fn load(&self) -> Result<MemberMap> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No snapshot found, starting empty");
                return Ok(MemberMap::new());
            }
            Err(e) => {
                return Err(TollgateError::storage(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        if raw.trim().is_empty() {
            return Ok(MemberMap::new());
        }

        serde_json::from_str(&raw).map_err(|e| {
            TollgateError::storage(format!("failed to parse {}: {}", self.path.display(), e))
        })
    }

    fn save(&self, members: &MemberMap) -> Result<()> {
        // Sorted keys keep the file diffable
        let ordered: BTreeMap<&String, &SubscriptionRecord> = members.iter().collect();
        let bytes = serde_json::to_vec_pretty(&ordered)
            .map_err(|e| TollgateError::storage(format!("failed to encode snapshot: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                TollgateError::storage(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let temp = self.temp_path();
        std::fs::write(&temp, &bytes)
            .and_then(|_| std::fs::rename(&temp, &self.path))
            .map_err(|e| {
                TollgateError::storage(format!("failed to write {}: {}", self.path.display(), e))
            })?;

        tracing::debug!(path = %self.path.display(), members = members.len(), "Snapshot saved");
        Ok(())
    }
}

/// In-memory snapshot for testing.
#[cfg(any(test, feature = "test-platform"))]
pub mod test {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, RwLock};

    /// In-memory snapshot store.
    ///
    /// Wraps data in Arc so a test can keep a handle after giving a clone to
    /// the member store.
    #[derive(Default, Clone)]
    pub struct InMemorySnapshot {
        inner: Arc<InMemorySnapshotInner>,
    }

    #[derive(Default)]
    struct InMemorySnapshotInner {
        members: RwLock<MemberMap>,
        saves: AtomicUsize,
        fail_writes: AtomicBool,
    }

    impl InMemorySnapshot {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Start from an existing map.
        #[must_use]
        pub fn with_members(members: MemberMap) -> Self {
            let snapshot = Self::default();
            *snapshot.inner.members.write().unwrap() = members;
            snapshot
        }

        /// The last saved map.
        pub fn contents(&self) -> MemberMap {
            self.inner.members.read().unwrap().clone()
        }

        /// Number of successful saves.
        pub fn save_count(&self) -> usize {
            self.inner.saves.load(Ordering::SeqCst)
        }

        /// Make every following save fail.
        pub fn fail_writes(&self, fail: bool) {
            self.inner.fail_writes.store(fail, Ordering::SeqCst);
        }
    }

    impl SnapshotStore for InMemorySnapshot {
        fn load(&self) -> Result<MemberMap> {
            Ok(self.contents())
        }

        fn save(&self, members: &MemberMap) -> Result<()> {
            if self.inner.fail_writes.load(Ordering::SeqCst) {
                return Err(TollgateError::storage("simulated write failure"));
            }
            *self.inner.members.write().unwrap() = members.clone();
            self.inner.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
