//! Decide an original's format, and for GIF, whether it animates.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::AnimationDecoder as _;
use image::codecs::gif::GifDecoder;

use crate::foundation::core::ImageFormat;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Classification {
    pub format: ImageFormat,
    pub animated: bool,
}

/// Classify by extension; GIFs are fully decoded to count frames.
///
/// A missing or undecodable file is reported as not animated; classification never fails.
pub fn classify(path: &Path) -> Classification {
    let format = ImageFormat::from_path(path);
    let animated = format.is_animation_capable() && count_gif_frames(path).is_some_and(|n| n > 1);
    if format.is_animation_capable() {
        tracing::debug!(path = %path.display(), animated, "classified gif");
    }
    Classification { format, animated }
}

/// Frame count of a GIF, or `None` if it cannot be opened or any frame fails to decode.
pub fn count_gif_frames(path: &Path) -> Option<usize> {
    let file = File::open(path).ok()?;
    let decoder = match GifDecoder::new(BufReader::new(file)) {
        Ok(d) => d,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "gif header decode failed");
            return None;
        }
    };

    let mut frames = 0usize;
    for frame in decoder.into_frames() {
        if let Err(e) = frame {
            tracing::debug!(path = %path.display(), error = %e, "gif frame decode failed");
            return None;
        }
        frames += 1;
    }
    Some(frames)
}

#[cfg(test)]
#[path = "../tests/unit/classify.rs"]
mod tests;
