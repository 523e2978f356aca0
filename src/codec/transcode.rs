use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context as _;

use crate::classify::classify;
use crate::codec::tool::{BuiltinWebpEncoder, Encoder, ToolEncoder, ToolFlavor};
use crate::foundation::config::{CacheConfig, StillEncoderKind};
use crate::foundation::core::{ImageFormat, Quality};
use crate::foundation::error::{CacheError, CacheResult};
use crate::store::layout::ensure_parent_dir;

/// Why a derivative ended up as a verbatim copy of its source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradeReason {
    /// The source already carries the derivative extension.
    AlreadyDerivative,
    /// The encoder was not found on this host.
    EncoderUnavailable,
    /// The encoder ran and failed.
    EncoderFailed,
    /// The encoded output was larger than the source.
    LargerThanSource,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum ConversionStatus {
    Encoded,
    DegradedCopy(DegradeReason),
}

/// Result of one successful conversion. Failures are returned as `Err`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ConversionOutcome {
    pub status: ConversionStatus,
    pub derivative_path: PathBuf,
    pub source_size: u64,
    pub derivative_size: u64,
}

impl ConversionOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self.status, ConversionStatus::DegradedCopy(_))
    }
}

/// What a conversion will do, decided before touching the destination.
#[derive(Debug)]
pub enum Plan<'a> {
    /// Source is already WebP; copy it.
    AlreadyConverted,
    /// Run an available encoder; `size_guard` rejects outputs that grow the asset.
    Encode {
        encoder: &'a dyn Encoder,
        size_guard: bool,
    },
    /// No usable encoder; copy the source.
    CopyOnly(DegradeReason),
}

/// Picks an encoder per source and always leaves a usable derivative behind.
#[derive(Clone, Debug)]
pub struct Transcoder {
    still: Arc<dyn Encoder>,
    animated: Arc<dyn Encoder>,
    quality: Quality,
}

impl Transcoder {
    pub fn new(still: Arc<dyn Encoder>, animated: Arc<dyn Encoder>, quality: Quality) -> Self {
        Self {
            still,
            animated,
            quality,
        }
    }

    pub fn from_config(cfg: &CacheConfig) -> Self {
        let still: Arc<dyn Encoder> = match cfg.still_encoder {
            StillEncoderKind::Cwebp => Arc::new(ToolEncoder::new(&cfg.cwebp, ToolFlavor::Still)),
            StillEncoderKind::Builtin => Arc::new(BuiltinWebpEncoder),
        };
        let animated = Arc::new(ToolEncoder::new(&cfg.gif2webp, ToolFlavor::Animated));
        Self::new(still, animated, cfg.quality)
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn still_encoder(&self) -> &dyn Encoder {
        self.still.as_ref()
    }

    pub fn animated_encoder(&self) -> &dyn Encoder {
        self.animated.as_ref()
    }

    /// Decide how `src` will be converted. Probes encoder availability.
    pub fn plan(&self, src: &Path) -> Plan<'_> {
        let class = classify(src);
        if class.format == ImageFormat::Webp {
            return Plan::AlreadyConverted;
        }

        // Every GIF goes through the animation-aware tool; only multi-frame output is exempt
        // from the size guard.
        let (encoder, size_guard) = if class.format.is_animation_capable() {
            (self.animated.as_ref(), !class.animated)
        } else {
            (self.still.as_ref(), true)
        };
        if !encoder.is_available() {
            return Plan::CopyOnly(DegradeReason::EncoderUnavailable);
        }
        Plan::Encode {
            encoder,
            size_guard,
        }
    }

    /// Convert `src` into `dst`, falling back to a verbatim copy whenever encoding is impossible
    /// or unprofitable. Only I/O failures of the copy itself are returned as errors.
    pub fn convert(&self, src: &Path, dst: &Path) -> CacheResult<ConversionOutcome> {
        let source_size = std::fs::metadata(src)
            .with_context(|| format!("failed to stat source '{}'", src.display()))?
            .len();
        ensure_parent_dir(dst)?;
        let staging = staging_path(dst)?;

        let result = self.convert_staged(src, dst, &staging, source_size);
        if staging.exists() {
            std::fs::remove_file(&staging).ok();
        }
        result
    }

    fn convert_staged(
        &self,
        src: &Path,
        dst: &Path,
        staging: &Path,
        source_size: u64,
    ) -> CacheResult<ConversionOutcome> {
        let status = match self.plan(src) {
            Plan::AlreadyConverted => {
                tracing::info!(src = %src.display(), "source is already webp, copying");
                ConversionStatus::DegradedCopy(DegradeReason::AlreadyDerivative)
            }
            Plan::CopyOnly(reason) => {
                tracing::warn!(src = %src.display(), ?reason, "no encoder available, copying source");
                ConversionStatus::DegradedCopy(reason)
            }
            Plan::Encode {
                encoder,
                size_guard,
            } => self.run_encoder(encoder, size_guard, src, staging, source_size),
        };

        if status != ConversionStatus::Encoded {
            std::fs::remove_file(staging).ok();
            copy_file(src, staging)?;
        }

        std::fs::rename(staging, dst).with_context(|| {
            format!(
                "failed to move '{}' into place at '{}'",
                staging.display(),
                dst.display()
            )
        })?;
        let derivative_size = std::fs::metadata(dst)
            .with_context(|| format!("failed to stat derivative '{}'", dst.display()))?
            .len();

        if status == ConversionStatus::Encoded {
            tracing::info!(
                dst = %dst.display(),
                source_size,
                derivative_size,
                ratio_pct = %format_args!("{:.1}", derivative_size as f64 / source_size.max(1) as f64 * 100.0),
                "encoded derivative"
            );
        }

        Ok(ConversionOutcome {
            status,
            derivative_path: dst.to_path_buf(),
            source_size,
            derivative_size,
        })
    }

    fn run_encoder(
        &self,
        encoder: &dyn Encoder,
        size_guard: bool,
        src: &Path,
        staging: &Path,
        source_size: u64,
    ) -> ConversionStatus {
        if let Err(e) = encoder.encode(src, staging, self.quality) {
            tracing::warn!(
                encoder = encoder.name(),
                src = %src.display(),
                error = %e,
                "encoder failed, copying source"
            );
            return ConversionStatus::DegradedCopy(DegradeReason::EncoderFailed);
        }
        if !size_guard {
            return ConversionStatus::Encoded;
        }

        match std::fs::metadata(staging) {
            Ok(meta) if meta.len() > source_size => {
                tracing::info!(
                    src = %src.display(),
                    source_size,
                    encoded_size = meta.len(),
                    "encoded output is larger than source, keeping original bytes"
                );
                ConversionStatus::DegradedCopy(DegradeReason::LargerThanSource)
            }
            Ok(_) => ConversionStatus::Encoded,
            Err(e) => {
                tracing::warn!(src = %src.display(), error = %e, "encoded output missing");
                ConversionStatus::DegradedCopy(DegradeReason::EncoderFailed)
            }
        }
    }
}

/// Byte-for-byte copy used for every degraded outcome.
pub fn copy_file(src: &Path, dst: &Path) -> CacheResult<u64> {
    let copied = std::fs::copy(src, dst).with_context(|| {
        format!(
            "failed to copy '{}' to '{}'",
            src.display(),
            dst.display()
        )
    })?;
    tracing::debug!(src = %src.display(), dst = %dst.display(), bytes = copied, "copied file");
    Ok(copied)
}

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Hidden sibling of `dst` that is renamed into place once complete.
fn staging_path(dst: &Path) -> CacheResult<PathBuf> {
    let name = dst
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CacheError::validation(format!("bad destination '{}'", dst.display())))?;
    let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
    Ok(dst.with_file_name(format!(".{name}.{}-{seq}.tmp", std::process::id())))
}

#[cfg(test)]
#[path = "../../tests/unit/codec/transcode.rs"]
mod tests;
