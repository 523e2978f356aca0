//! The derived-artifact cache: lazy population on read, eager population on ingest, and the
//! backfill sweep, all funnelled through one single-flight gate.

pub mod flight;
pub mod resolve;
pub mod sweep;

use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Context as _;

use crate::codec::transcode::{ConversionOutcome, Transcoder};
use crate::foundation::config::CacheConfig;
use crate::foundation::error::{CacheError, CacheResult};
use crate::store::key::AssetKey;
use crate::store::layout::{AllocatedKey, StoreLayout};
use crate::store::listing::{Listing, list_derivatives};

pub use flight::{FlightGate, Flown};
pub use resolve::{Download, Resolved, ServedFrom};
pub use sweep::SweepStats;

/// How a derivative came to exist after [`DerivedCache::ensure_derivative`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Materialized {
    /// It was already on disk.
    Present,
    /// This call converted it.
    Converted(ConversionOutcome),
    /// A concurrent caller converted it while this one waited.
    Joined,
}

#[derive(Debug)]
pub struct DerivedCache {
    layout: StoreLayout,
    transcoder: Transcoder,
    gate: FlightGate,
}

impl DerivedCache {
    pub fn new(layout: StoreLayout, transcoder: Transcoder) -> Self {
        Self {
            layout,
            transcoder,
            gate: FlightGate::new(),
        }
    }

    /// Validate `cfg`, create both store roots, and wire the configured encoders.
    pub fn from_config(cfg: &CacheConfig) -> CacheResult<Self> {
        cfg.validate()?;
        cfg.prepare_roots()?;
        Ok(Self::new(
            StoreLayout::new(&cfg.pics_dir, &cfg.webp_dir),
            Transcoder::from_config(cfg),
        ))
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn transcoder(&self) -> &Transcoder {
        &self.transcoder
    }

    pub fn allocate_key(&self, ext: &str) -> CacheResult<AllocatedKey> {
        self.layout.allocate_key(ext)
    }

    /// Make sure the derivative of `key` exists, converting the original if needed.
    ///
    /// At most one conversion per key runs at a time; late arrivals wait for it and fail if it
    /// left no derivative behind.
    pub fn ensure_derivative(&self, key: &AssetKey) -> CacheResult<Materialized> {
        let derivative = self.layout.derivative_path(key);
        if derivative.is_file() {
            return Ok(Materialized::Present);
        }

        let original = self.layout.original_path(key);
        let flight_key = key.derivative();
        let flown = self.gate.run(flight_key.as_str(), || {
            // Re-check under the gate: a previous flight may have landed in between.
            if derivative.is_file() {
                return Ok(Materialized::Present);
            }
            self.transcoder
                .convert(&original, &derivative)
                .map(Materialized::Converted)
        });

        match flown {
            Flown::Led(result) => result,
            Flown::Joined if derivative.is_file() => Ok(Materialized::Joined),
            Flown::Joined => Err(CacheError::conversion(format!(
                "concurrent conversion of '{key}' produced no derivative"
            ))),
        }
    }

    /// Listing of the derivative store, optionally below `dir`.
    pub fn list(&self, dir: Option<&str>) -> CacheResult<Listing> {
        list_derivatives(self.layout.derived_root(), dir)
    }

    /// Run [`DerivedCache::sweep`] on a named background thread.
    pub fn spawn_sweep(self: &Arc<Self>) -> CacheResult<JoinHandle<SweepStats>> {
        let cache = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("webp-backfill".to_string())
            .spawn(move || cache.sweep())
            .context("failed to spawn backfill thread")?;
        Ok(handle)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/mod.rs"]
mod tests;
