use std::path::Path;

use anyhow::Context as _;
use chrono::{DateTime, Local};

use crate::foundation::core::DERIVATIVE_EXTENSION;
use crate::foundation::error::{CacheError, CacheResult};
use crate::store::key::normalize_rel_path;

/// One derivative file in a listing.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    pub url: String,
    pub thumbnail_url: String,
    pub original_name: String,
    /// `YYYY-MM-DD HH:MM:SS` from the file name, or empty when the name is not timestamped.
    pub upload_date: String,
    pub directory: String,
}

/// One immediate subdirectory in a listing.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct DirectoryInfo {
    pub path: String,
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Listing {
    pub directory: String,
    pub directories: Vec<DirectoryInfo>,
    pub images: Vec<ImageInfo>,
}

/// List subdirectories and `.webp` files directly inside `derived_root/sub`.
pub fn list_derivatives(derived_root: &Path, sub: Option<&str>) -> CacheResult<Listing> {
    let rel = match sub.map(str::trim) {
        None | Some("") | Some(".") | Some("/") => String::new(),
        Some(s) => normalize_rel_path(s)?,
    };

    let mut dir = derived_root.to_path_buf();
    for part in rel.split('/').filter(|p| !p.is_empty()) {
        dir.push(part);
    }
    if !dir.is_dir() {
        return Err(CacheError::not_found(format!("directory '{rel}'")));
    }

    let mut entries = std::fs::read_dir(&dir)
        .with_context(|| format!("failed to read directory '{}'", dir.display()))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to read entry in '{}'", dir.display()))?;
    entries.sort_by_key(|e| e.file_name());

    let join = |name: &str| {
        if rel.is_empty() {
            name.to_string()
        } else {
            format!("{rel}/{name}")
        }
    };

    let mut listing = Listing {
        directory: rel.clone(),
        ..Listing::default()
    };
    for entry in entries {
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let file_type = entry
            .file_type()
            .with_context(|| format!("failed to stat '{}'", entry.path().display()))?;

        if file_type.is_dir() {
            listing.directories.push(DirectoryInfo {
                path: join(&name),
                name,
            });
        } else if has_derivative_extension(&name) {
            let url = format!("/img/{}", join(&name));
            listing.images.push(ImageInfo {
                thumbnail_url: url.clone(),
                url,
                upload_date: format_timestamp_from_filename(&name),
                original_name: name,
                directory: rel.clone(),
            });
        }
    }

    Ok(listing)
}

fn has_derivative_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(DERIVATIVE_EXTENSION))
}

/// Render the leading `{unixSeconds}` of `{unixSeconds}-{suffix}.ext` in local time.
pub fn format_timestamp_from_filename(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let head = stem.split('-').next().unwrap_or_default();
    let Ok(secs) = head.parse::<i64>() else {
        return String::new();
    };
    match DateTime::from_timestamp(secs, 0) {
        Some(utc) => utc
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/store/listing.rs"]
mod tests;
