use std::time::{Duration, Instant};

use walkdir::WalkDir;

use crate::cache::{DerivedCache, Materialized};
use crate::foundation::core::ImageFormat;

/// Counters from one backfill pass.
///
/// `converted` counts every derivative written by this pass, including degraded copies;
/// `degraded` is the subset that fell back to copying.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct SweepStats {
    pub total: u64,
    pub converted: u64,
    pub degraded: u64,
    pub already_present: u64,
    pub failed: u64,
    pub elapsed: Duration,
}

impl DerivedCache {
    /// Walk the original store once and materialize every missing derivative.
    ///
    /// Unreadable directories are skipped with a warning; the pass itself never fails.
    #[tracing::instrument(skip(self), fields(root = %self.layout.original_root().display()))]
    pub fn sweep(&self) -> SweepStats {
        let started = Instant::now();
        let mut stats = SweepStats::default();
        tracing::info!("backfill started");

        for entry in WalkDir::new(self.layout.original_root()).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable path");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !ImageFormat::from_path(entry.path()).is_sweepable()
            {
                continue;
            }
            stats.total += 1;

            let key = match self.layout.key_for_original(entry.path()) {
                Ok(key) => key,
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "unusable original path");
                    stats.failed += 1;
                    continue;
                }
            };

            match self.ensure_derivative(&key) {
                Ok(Materialized::Present | Materialized::Joined) => stats.already_present += 1,
                Ok(Materialized::Converted(outcome)) => {
                    stats.converted += 1;
                    if outcome.is_degraded() {
                        stats.degraded += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "backfill conversion failed");
                    stats.failed += 1;
                }
            }
        }

        stats.elapsed = started.elapsed();
        tracing::info!(
            total = stats.total,
            converted = stats.converted,
            degraded = stats.degraded,
            already_present = stats.already_present,
            failed = stats.failed,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "backfill finished"
        );
        stats
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/sweep.rs"]
mod tests;
