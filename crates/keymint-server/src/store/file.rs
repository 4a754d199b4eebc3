use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::warn;

use super::model::Dataset;

/// File-backed store for the whole dataset. The unit of consistency is the
/// entire document: every mutation runs as load → modify → save under one
/// process-wide lock, so concurrent requests cannot interleave partial
/// updates.
#[derive(Clone)]
pub struct Store {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: Arc::new(path.as_ref().to_owned()),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a read-only closure against the current dataset snapshot.
    pub fn read<T>(&self, f: impl FnOnce(&Dataset) -> T) -> Result<T> {
        let _guard = self.guard();
        let data = self.load();
        Ok(f(&data))
    }

    /// Run a read-modify-write cycle as one critical section. The whole
    /// dataset is written back when the closure returns.
    pub fn transact<T>(&self, f: impl FnOnce(&mut Dataset) -> T) -> Result<T> {
        let _guard = self.guard();
        let mut data = self.load();
        let out = f(&mut data);
        self.save(&data)?;
        Ok(out)
    }

    /// A panic inside one closure must not wedge the store for every
    /// later request; the document on disk is still consistent, so a
    /// poisoned lock is safe to reclaim.
    fn guard(&self) -> std::sync::MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Missing or unreadable state downgrades to the default dataset; a
    /// corrupt file must never take the server down.
    fn load(&self) -> Dataset {
        let bytes = match std::fs::read(self.path.as_ref()) {
            Ok(b) => b,
            Err(_) => return Dataset::default(),
        };
        match serde_json::from_slice(&bytes) {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "dataset unreadable, starting from defaults");
                Dataset::default()
            }
        }
    }

    /// Write the full document through a temp-file rename so readers never
    /// observe a partial write.
    fn save(&self, data: &Dataset) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(data).context("encode dataset")?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &bytes)
            .with_context(|| format!("write {}", tmp.display()))?;
        std::fs::rename(&tmp, self.path.as_ref())
            .with_context(|| format!("replace {}", self.path.display()))?;
        Ok(())
    }
}
