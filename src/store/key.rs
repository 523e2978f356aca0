use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Local, TimeZone};

use crate::foundation::core::{DERIVATIVE_EXTENSION, ImageFormat};
use crate::foundation::error::{CacheError, CacheResult};

/// Normalize and validate a store-relative path.
///
/// The normalized result uses `/` separators and removes `.` and empty segments (so a leading `/`
/// from a URL path is dropped). Parent traversals (`..`) and drive prefixes are rejected.
pub fn normalize_rel_path(source: &str) -> CacheResult<String> {
    let s = source.replace('\\', "/");
    if s.is_empty() {
        return Err(CacheError::validation("asset key must be non-empty"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(CacheError::validation("asset keys must not contain '..'"));
        }
        if part.contains(':') {
            return Err(CacheError::validation("asset keys must not carry a drive prefix"));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(CacheError::validation("asset key must contain a file name"));
    }

    Ok(out.join("/"))
}

/// Relative key of one original/derivative pair, e.g. `26/01/02/1767312000-042.png`.
///
/// Keys coming from the read path are URL path segments and may carry a leading `/`; it is
/// stripped during normalization.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct AssetKey(String);

impl AssetKey {
    pub fn parse(raw: &str) -> CacheResult<Self> {
        normalize_rel_path(raw).map(Self)
    }

    /// Key for a fresh upload taken at `at`: `YY/MM/DD/{secs}-{millis:03}.{ext}`.
    pub fn for_upload<Tz: TimeZone>(at: &DateTime<Tz>, ext: &str) -> CacheResult<Self> {
        let ext = normalize_extension(ext)?;
        let local = at.with_timezone(&Local);
        let partition = date_partition(&local);
        let file_name = format!(
            "{}-{:03}.{ext}",
            local.timestamp(),
            local.timestamp_subsec_millis().min(999)
        );
        Ok(Self(format!("{partition}/{file_name}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path segment.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Everything before the final segment, or `""` for top-level keys.
    pub fn parent(&self) -> &str {
        self.0.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }

    /// Lower-cased extension of the file name, if any.
    pub fn extension(&self) -> Option<String> {
        split_extension(self.file_name()).1.map(|e| e.to_ascii_lowercase())
    }

    pub fn format(&self) -> ImageFormat {
        self.extension()
            .map(|e| ImageFormat::from_extension(&e))
            .unwrap_or(ImageFormat::Unknown)
    }

    /// Same partition and basename with the extension replaced by `.webp`.
    pub fn derivative(&self) -> Self {
        let (stem, _) = split_extension(self.file_name());
        let file = format!("{stem}.{DERIVATIVE_EXTENSION}");
        match self.parent() {
            "" => Self(file),
            dir => Self(format!("{dir}/{file}")),
        }
    }

    /// Join the key under a store root.
    pub fn under(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for part in self.0.split('/') {
            path.push(part);
        }
        path
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `YY/MM/DD` for the given local date.
pub fn date_partition(at: &DateTime<Local>) -> String {
    format!(
        "{:02}/{:02}/{:02}",
        at.year().rem_euclid(100),
        at.month(),
        at.day()
    )
}

fn normalize_extension(ext: &str) -> CacheResult<String> {
    let ext = ext.trim().trim_start_matches('.');
    if ext.is_empty() {
        return Err(CacheError::validation("upload extension must be non-empty"));
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CacheError::validation(format!(
            "upload extension '{ext}' must be alphanumeric"
        )));
    }
    Ok(ext.to_ascii_lowercase())
}

/// Split `name.ext` at the last dot. Dot-files (`.hidden`) have no extension.
fn split_extension(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rfind('.') {
        Some(0) | None => (file_name, None),
        Some(i) => (&file_name[..i], Some(&file_name[i + 1..])),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/store/key.rs"]
mod tests;
