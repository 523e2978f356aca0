//! Upload intake: persist an original under a fresh key and derive its WebP eagerly.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use anyhow::Context as _;

use crate::cache::{DerivedCache, Materialized};
use crate::codec::transcode::ConversionStatus;
use crate::foundation::error::{CacheError, CacheResult};
use crate::store::key::AssetKey;

/// Metadata the client declared alongside the uploaded bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Upload<'a> {
    pub file_name: Option<&'a str>,
    pub content_type: &'a str,
}

/// Summary returned after a successful upload.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct IngestReport {
    pub status: &'static str,
    pub url: String,
    pub key: AssetKey,
    pub original_size: u64,
    pub original_size_text: String,
    pub webp_size: u64,
    pub webp_size_text: String,
    /// Percent saved by the derivative; `0` when either size is unknown.
    pub compression_ratio: f64,
    /// `None` when the eager conversion failed; the read path retries it.
    pub conversion: Option<ConversionStatus>,
}

/// Extension for a new original: the file name's own, else one implied by the content type.
pub fn extension_for(file_name: Option<&str>, content_type: &str) -> String {
    let from_name = file_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty());
    if let Some(ext) = from_name {
        return ext.to_ascii_lowercase();
    }
    match content_type {
        "image/png" => "png",
        "image/gif" => "gif",
        _ => "jpg",
    }
    .to_string()
}

/// `N B`, `x.xx KB` or `x.xx MB`.
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    if bytes < KIB {
        format!("{bytes} B")
    } else if bytes < MIB {
        format!("{:.2} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.2} MB", bytes as f64 / MIB as f64)
    }
}

pub fn compression_ratio(original_size: u64, webp_size: u64) -> f64 {
    if original_size == 0 || webp_size == 0 {
        return 0.0;
    }
    100.0 - (webp_size as f64 / original_size as f64 * 100.0)
}

impl DerivedCache {
    /// Store `body` as a new original and convert it right away.
    ///
    /// A failed conversion does not fail the upload.
    #[tracing::instrument(skip(self, body))]
    pub fn ingest(&self, upload: Upload<'_>, mut body: impl Read) -> CacheResult<IngestReport> {
        if !upload.content_type.starts_with("image/") {
            return Err(CacheError::validation(format!(
                "content type '{}' is not an image",
                upload.content_type
            )));
        }

        let ext = extension_for(upload.file_name, upload.content_type);
        let alloc = self.allocate_key(&ext)?;
        let original_size = match write_original(&alloc.original_path, &mut body) {
            Ok(n) => n,
            Err(e) => {
                std::fs::remove_file(&alloc.original_path).ok();
                return Err(e);
            }
        };

        let conversion = match self.ensure_derivative(&alloc.key) {
            Ok(Materialized::Converted(outcome)) => Some(outcome.status),
            Ok(Materialized::Present | Materialized::Joined) => None,
            Err(e) => {
                tracing::warn!(key = %alloc.key, error = %e, "eager conversion failed");
                None
            }
        };
        let webp_size = std::fs::metadata(&alloc.derivative_path)
            .map(|m| m.len())
            .unwrap_or(0);

        tracing::info!(key = %alloc.key, original_size, webp_size, "ingested upload");
        Ok(IngestReport {
            status: "success",
            url: format!("/img/{}", alloc.key),
            original_size_text: format_size(original_size),
            webp_size_text: format_size(webp_size),
            compression_ratio: compression_ratio(original_size, webp_size),
            key: alloc.key,
            original_size,
            webp_size,
            conversion,
        })
    }
}

fn write_original(path: &Path, body: &mut impl Read) -> CacheResult<u64> {
    let mut file =
        File::create(path).with_context(|| format!("failed to create '{}'", path.display()))?;
    let written = io::copy(body, &mut file)
        .with_context(|| format!("failed to write upload to '{}'", path.display()))?;
    file.sync_all()
        .with_context(|| format!("failed to flush '{}'", path.display()))?;
    Ok(written)
}

#[cfg(test)]
#[path = "../tests/unit/intake.rs"]
mod tests;
