use std::path::Path;

use anyhow::Context as _;

use crate::cache::DerivedCache;
use crate::classify::classify;
use crate::foundation::core::{ImageFormat, served_derivative_mime};
use crate::foundation::error::{CacheError, CacheResult};
use crate::store::key::AssetKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServedFrom {
    Derivative,
    Original,
}

/// Bytes answering a read-path request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    pub content: Vec<u8>,
    pub content_type: &'static str,
    pub served: ServedFrom,
}

/// Bytes answering an explicit download, with the name to save them under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Download {
    pub content: Vec<u8>,
    pub content_type: &'static str,
    pub file_name: String,
}

impl DerivedCache {
    /// Serve the best available representation of `requested`.
    ///
    /// Animated GIFs without a derivative are served as-is. Otherwise a missing derivative is
    /// produced on the spot; if that fails the original is served instead.
    #[tracing::instrument(skip(self))]
    pub fn resolve(&self, requested: &str) -> CacheResult<Resolved> {
        let key = AssetKey::parse(requested)?;
        let derivative = self.layout.derivative_path(&key);
        let original = self.layout.original_path(&key);

        if !derivative.is_file()
            && key.format().is_animation_capable()
            && original.is_file()
            && classify(&original).animated
        {
            tracing::debug!(key = %key, "serving animated gif original");
            return Ok(Resolved {
                content: read_file(&original)?,
                content_type: ImageFormat::Gif.mime(),
                served: ServedFrom::Original,
            });
        }

        if !derivative.is_file()
            && original.is_file()
            && let Err(e) = self.ensure_derivative(&key)
        {
            tracing::warn!(key = %key, error = %e, "on-demand conversion failed");
        }

        if derivative.is_file() {
            let content = read_file(&derivative)?;
            let content_type = served_derivative_mime(&content);
            tracing::debug!(key = %key, content_type, bytes = content.len(), "serving derivative");
            return Ok(Resolved {
                content,
                content_type,
                served: ServedFrom::Derivative,
            });
        }

        if original.is_file() {
            tracing::info!(key = %key, "derivative unavailable, serving original");
            return Ok(Resolved {
                content: read_file(&original)?,
                content_type: key.format().mime(),
                served: ServedFrom::Original,
            });
        }

        Err(CacheError::not_found(format!("image '{key}'")))
    }

    /// Existing derivative of `requested`, without converting on a miss.
    pub fn fetch_derivative(&self, requested: &str) -> CacheResult<Download> {
        let key = AssetKey::parse(requested)?.derivative();
        let path = self.layout.derivative_path(&key);
        if !path.is_file() {
            return Err(CacheError::not_found(format!("derivative '{key}'")));
        }
        let content = read_file(&path)?;
        Ok(Download {
            content_type: served_derivative_mime(&content),
            content,
            file_name: key.file_name().to_string(),
        })
    }

    /// The original upload behind `requested`.
    pub fn fetch_original(&self, requested: &str) -> CacheResult<Download> {
        let key = AssetKey::parse(requested)?;
        let path = self.layout.original_path(&key);
        if !path.is_file() {
            return Err(CacheError::not_found(format!("original '{key}'")));
        }
        Ok(Download {
            content: read_file(&path)?,
            content_type: key.format().mime(),
            file_name: key.file_name().to_string(),
        })
    }
}

fn read_file(path: &Path) -> CacheResult<Vec<u8>> {
    Ok(std::fs::read(path).with_context(|| format!("failed to read '{}'", path.display()))?)
}

#[cfg(test)]
#[path = "../../tests/unit/cache/resolve.rs"]
mod tests;
