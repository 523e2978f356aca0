use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::Context as _;
use chrono::{DateTime, Local, TimeZone, Utc};

use crate::foundation::error::{CacheError, CacheResult};
use crate::store::key::AssetKey;

/// Paths produced for a fresh upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocatedKey {
    pub original_path: PathBuf,
    pub derivative_path: PathBuf,
    pub key: AssetKey,
}

/// The two parallel trees: originals and their derivatives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreLayout {
    original_root: PathBuf,
    derived_root: PathBuf,
}

impl StoreLayout {
    pub fn new(original_root: impl Into<PathBuf>, derived_root: impl Into<PathBuf>) -> Self {
        Self {
            original_root: original_root.into(),
            derived_root: derived_root.into(),
        }
    }

    pub fn original_root(&self) -> &Path {
        &self.original_root
    }

    pub fn derived_root(&self) -> &Path {
        &self.derived_root
    }

    pub fn original_path(&self, key: &AssetKey) -> PathBuf {
        key.under(&self.original_root)
    }

    pub fn derivative_path(&self, key: &AssetKey) -> PathBuf {
        key.derivative().under(&self.derived_root)
    }

    /// Key of a file found under the original root.
    pub fn key_for_original(&self, path: &Path) -> CacheResult<AssetKey> {
        let rel = path.strip_prefix(&self.original_root).map_err(|_| {
            CacheError::validation(format!(
                "'{}' is not under the original store '{}'",
                path.display(),
                self.original_root.display()
            ))
        })?;
        let rel = rel
            .to_str()
            .ok_or_else(|| CacheError::validation("original path is not valid UTF-8"))?;
        AssetKey::parse(rel)
    }

    /// Allocate a key for a new upload using the process clock.
    pub fn allocate_key(&self, ext: &str) -> CacheResult<AllocatedKey> {
        self.allocate_key_at(&monotonic_now(), ext)
    }

    /// Allocate a key for a new upload taken at `at`, creating today's partition under both roots.
    pub fn allocate_key_at<Tz: TimeZone>(
        &self,
        at: &DateTime<Tz>,
        ext: &str,
    ) -> CacheResult<AllocatedKey> {
        let key = AssetKey::for_upload(at, ext)?;
        let original_path = self.original_path(&key);
        let derivative_path = self.derivative_path(&key);

        for path in [&original_path, &derivative_path] {
            ensure_parent_dir(path)?;
        }

        tracing::debug!(key = %key, "allocated asset key");
        Ok(AllocatedKey {
            original_path,
            derivative_path,
            key,
        })
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> CacheResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory '{}'", parent.display()))?;
    }
    Ok(())
}

static LAST_ALLOCATED_MS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Wall clock, clamped so it never runs backwards within this process.
fn monotonic_now() -> DateTime<Local> {
    let now_ms = Utc::now().timestamp_millis();
    let prev = LAST_ALLOCATED_MS.fetch_max(now_ms, Ordering::AcqRel);
    let ms = now_ms.max(prev);
    DateTime::<Utc>::from_timestamp_millis(ms)
        .unwrap_or_else(Utc::now)
        .with_timezone(&Local)
}

#[cfg(test)]
#[path = "../../tests/unit/store/layout.rs"]
mod tests;
