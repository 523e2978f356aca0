use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context as _;

use crate::foundation::core::Quality;
use crate::foundation::error::{CacheError, CacheResult};

/// A way of turning a source image into WebP bytes at `dst`.
///
/// Implementations must leave `dst` either absent or fully written when they return `Ok`.
pub trait Encoder: Send + Sync + fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Probe whether the encoder can run on this host. Called before every invocation.
    fn is_available(&self) -> bool;

    fn encode(&self, src: &Path, dst: &Path, quality: Quality) -> CacheResult<()>;
}

/// Argument layout of the external WebP tools.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolFlavor {
    /// `cwebp -q Q -m 6 -mt SRC -o DST`
    Still,
    /// `gif2webp -q Q -m 6 -mt -min_size SRC -o DST`
    Animated,
}

/// An encoder backed by a subprocess found on `PATH`.
#[derive(Clone, Debug)]
pub struct ToolEncoder {
    program: String,
    flavor: ToolFlavor,
}

impl ToolEncoder {
    pub fn new(program: impl Into<String>, flavor: ToolFlavor) -> Self {
        Self {
            program: program.into(),
            flavor,
        }
    }

    pub fn cwebp() -> Self {
        Self::new("cwebp", ToolFlavor::Still)
    }

    pub fn gif2webp() -> Self {
        Self::new("gif2webp", ToolFlavor::Animated)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn flavor(&self) -> ToolFlavor {
        self.flavor
    }

    /// Arguments for one invocation, in order.
    pub fn args(&self, src: &Path, dst: &Path, quality: Quality) -> Vec<std::ffi::OsString> {
        let mut args: Vec<std::ffi::OsString> = vec![
            "-q".into(),
            quality.get().to_string().into(),
            "-m".into(),
            "6".into(),
            "-mt".into(),
        ];
        if self.flavor == ToolFlavor::Animated {
            args.push("-min_size".into());
        }
        args.push(src.as_os_str().to_owned());
        args.push("-o".into());
        args.push(dst.as_os_str().to_owned());
        args
    }
}

impl Encoder for ToolEncoder {
    fn name(&self) -> &str {
        &self.program
    }

    fn is_available(&self) -> bool {
        let found = find_on_path(&self.program);
        tracing::debug!(
            tool = %self.program,
            found = ?found.as_ref().map(|p| p.display().to_string()),
            "probed encoder"
        );
        found.is_some()
    }

    fn encode(&self, src: &Path, dst: &Path, quality: Quality) -> CacheResult<()> {
        let program = find_on_path(&self.program).ok_or_else(|| {
            CacheError::conversion(format!("'{}' was not found on PATH", self.program))
        })?;

        let output = Command::new(&program)
            .args(self.args(src, dst, quality))
            .output()
            .map_err(|e| {
                CacheError::conversion(format!("failed to spawn '{}': {e}", self.program))
            })?;

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(CacheError::conversion(format!(
                "'{}' exited with status {}: {}",
                self.program,
                output.status,
                combined.trim()
            )));
        }
        if !dst.is_file() {
            return Err(CacheError::conversion(format!(
                "'{}' reported success but wrote no output",
                self.program
            )));
        }
        Ok(())
    }
}

/// In-process lossless WebP encoding through the `image` crate.
///
/// Always available. Lossless output ignores `quality`; the size guard still applies.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinWebpEncoder;

impl Encoder for BuiltinWebpEncoder {
    fn name(&self) -> &str {
        "builtin-webp"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn encode(&self, src: &Path, dst: &Path, _quality: Quality) -> CacheResult<()> {
        let img = image::ImageReader::open(src)
            .with_context(|| format!("open '{}'", src.display()))?
            .with_guessed_format()
            .with_context(|| format!("read '{}'", src.display()))?
            .decode()
            .map_err(|e| {
                CacheError::conversion(format!("decode '{}' failed: {e}", src.display()))
            })?;
        image::DynamicImage::ImageRgba8(img.to_rgba8())
            .save_with_format(dst, image::ImageFormat::WebP)
            .map_err(|e| {
                CacheError::conversion(format!("webp encode to '{}' failed: {e}", dst.display()))
            })?;
        Ok(())
    }
}

/// Resolve `program` the way a shell would: paths are checked directly, bare names against
/// every `PATH` entry.
pub fn find_on_path(program: &str) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }
    let as_path = Path::new(program);
    if as_path.components().count() > 1 || as_path.is_absolute() {
        return is_executable(as_path).then(|| as_path.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .flat_map(|dir| candidates(&dir, program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(windows)]
fn candidates(dir: &Path, program: &str) -> Vec<PathBuf> {
    vec![dir.join(program), dir.join(format!("{program}.exe"))]
}

#[cfg(not(windows))]
fn candidates(dir: &Path, program: &str) -> Vec<PathBuf> {
    vec![dir.join(program)]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt as _;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
#[path = "../../tests/unit/codec/tool.rs"]
mod tests;
