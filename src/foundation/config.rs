use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;

use crate::foundation::core::Quality;
use crate::foundation::error::{CacheError, CacheResult};

/// Which encoder handles still (non-animated) images.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StillEncoderKind {
    /// External `cwebp` with the size guard applied.
    #[default]
    Cwebp,
    /// In-process lossless WebP via the `image` crate.
    Builtin,
}

/// Runtime configuration of the derived-artifact cache.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CacheConfig {
    /// Root of the original store.
    pub pics_dir: PathBuf,
    /// Root of the derivative store.
    pub webp_dir: PathBuf,
    /// Encoder quality shared by every conversion.
    #[serde(default)]
    pub quality: Quality,
    /// Program name or path of the still-image encoder.
    #[serde(default = "default_cwebp")]
    pub cwebp: String,
    /// Program name or path of the animation encoder.
    #[serde(default = "default_gif2webp")]
    pub gif2webp: String,
    #[serde(default)]
    pub still_encoder: StillEncoderKind,
}

fn default_cwebp() -> String {
    "cwebp".to_string()
}

fn default_gif2webp() -> String {
    "gif2webp".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            pics_dir: PathBuf::from("./uploads/pics"),
            webp_dir: PathBuf::from("./uploads/webp"),
            quality: Quality::DEFAULT,
            cwebp: default_cwebp(),
            gif2webp: default_gif2webp(),
            still_encoder: StillEncoderKind::default(),
        }
    }
}

impl CacheConfig {
    /// Config rooted at `root/pics` and `root/webp`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            pics_dir: root.join("pics"),
            webp_dir: root.join("webp"),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> CacheResult<()> {
        if self.pics_dir.as_os_str().is_empty() || self.webp_dir.as_os_str().is_empty() {
            return Err(CacheError::validation("store roots must be non-empty paths"));
        }
        if self.pics_dir.starts_with(&self.webp_dir) || self.webp_dir.starts_with(&self.pics_dir) {
            return Err(CacheError::validation(
                "original and derivative stores must be disjoint directories",
            ));
        }
        if self.cwebp.trim().is_empty() || self.gif2webp.trim().is_empty() {
            return Err(CacheError::validation("encoder program names must be non-empty"));
        }
        Ok(())
    }

    /// Create both store roots. Failure here is a startup error.
    pub fn prepare_roots(&self) -> CacheResult<()> {
        self.validate()?;
        for dir in [&self.pics_dir, &self.webp_dir] {
            if dir.exists() && !dir.is_dir() {
                return Err(CacheError::storage(format!(
                    "store root '{}' is not a directory",
                    dir.display()
                )));
            }
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create store root '{}'", dir.display()))?;
        }
        let pics = canonical(&self.pics_dir)?;
        let webp = canonical(&self.webp_dir)?;
        if pics.starts_with(&webp) || webp.starts_with(&pics) {
            return Err(CacheError::validation(format!(
                "store roots '{}' and '{}' overlap",
                pics.display(),
                webp.display()
            )));
        }
        tracing::info!(
            pics_dir = %self.pics_dir.display(),
            webp_dir = %self.webp_dir.display(),
            quality = %self.quality,
            "store roots ready"
        );
        Ok(())
    }
}

fn canonical(dir: &Path) -> CacheResult<PathBuf> {
    Ok(dir
        .canonicalize()
        .with_context(|| format!("failed to resolve store root '{}'", dir.display()))?)
}

/// Longest lockout [`ThrottleConfig::validate`] accepts.
pub const MAX_LOCKOUT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Limits for the login throttle.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ThrottleConfig {
    /// Failed attempts allowed before a lockout.
    pub max_attempts: u32,
    /// How long a locked-out client stays locked.
    pub lockout: Duration,
    /// Upper bound on tracked clients.
    pub max_entries: usize,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout: Duration::from_secs(60 * 60),
            max_entries: 10_000,
        }
    }
}

impl ThrottleConfig {
    pub fn validate(&self) -> CacheResult<()> {
        if self.max_attempts == 0 {
            return Err(CacheError::validation("max_attempts must be non-zero"));
        }
        if self.max_entries == 0 {
            return Err(CacheError::validation("max_entries must be non-zero"));
        }
        if self.lockout > MAX_LOCKOUT {
            return Err(CacheError::validation(format!(
                "lockout must not exceed {}s",
                MAX_LOCKOUT.as_secs()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/config.rs"]
mod tests;
