use std::fmt;
use std::path::Path;

use crate::foundation::error::{CacheError, CacheResult};

/// Extension (without the dot) every derivative is stored under.
pub const DERIVATIVE_EXTENSION: &str = "webp";

/// Content type of a genuine derivative.
pub const DERIVATIVE_MIME: &str = "image/webp";

/// Leading bytes of a GIF stream (`GIF87a` / `GIF89a`).
pub const GIF_MAGIC: &[u8; 3] = b"GIF";

/// Content type served for originals whose extension is not in the MIME table.
pub const DEFAULT_MIME: &str = "image/jpeg";

/// Image formats the cache tells apart by file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
    Svg,
    Unknown,
}

impl ImageFormat {
    /// Map an extension (with or without leading dot, any case) to a format.
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.trim_start_matches('.');
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Self::Jpeg,
            "png" => Self::Png,
            "gif" => Self::Gif,
            "webp" => Self::Webp,
            "svg" => Self::Svg,
            _ => Self::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    /// Content type used when serving a file of this format by extension.
    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Svg => "image/svg+xml",
            Self::Webp => DERIVATIVE_MIME,
            Self::Jpeg | Self::Unknown => DEFAULT_MIME,
        }
    }

    /// Only GIF can carry multi-frame animation that must survive transcoding.
    pub fn is_animation_capable(self) -> bool {
        self == Self::Gif
    }

    /// Raster formats the backfill sweep converts.
    pub fn is_sweepable(self) -> bool {
        matches!(self, Self::Jpeg | Self::Png | Self::Gif | Self::Webp)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Svg => "svg",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Process-wide encoder quality in `[1, 100]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quality(u8);

impl Quality {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 100;
    pub const DEFAULT: Quality = Quality(80);

    /// Validated constructor; out-of-range values are rejected.
    pub fn new(value: i64) -> CacheResult<Self> {
        if !(i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            return Err(CacheError::validation(format!(
                "quality must be in [{}, {}], got {value}",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(value as u8))
    }

    /// Clamp any integer into `[1, 100]`.
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(i64::from(Self::MIN), i64::from(Self::MAX)) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Quality {
    type Error = CacheError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quality> for i64 {
    fn from(q: Quality) -> Self {
        i64::from(q.0)
    }
}

/// What the leading bytes of a stored derivative actually are.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sniffed {
    Gif,
    Webp,
    Other,
}

/// Inspect leading bytes, ignoring whatever extension the file carries.
pub fn sniff(head: &[u8]) -> Sniffed {
    if head.starts_with(GIF_MAGIC) {
        return Sniffed::Gif;
    }
    match image::guess_format(head) {
        Ok(image::ImageFormat::WebP) => Sniffed::Webp,
        _ => Sniffed::Other,
    }
}

/// Content type for bytes stored under the derivative extension.
///
/// Legacy degraded copies of GIFs live under `.webp`; they are served as GIF so animation keeps
/// working. Anything else is served with the derivative type.
pub fn served_derivative_mime(head: &[u8]) -> &'static str {
    match sniff(head) {
        Sniffed::Gif => ImageFormat::Gif.mime(),
        Sniffed::Webp | Sniffed::Other => DERIVATIVE_MIME,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
