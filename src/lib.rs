//! Derived-artifact cache for uploaded images.
//!
//! Originals are stored under date-partitioned keys; a WebP derivative is kept at the same key
//! in a parallel tree. Derivatives are produced eagerly on ingest, lazily on first read, or by a
//! backfill sweep, and degrade to a verbatim copy whenever encoding is impossible or would grow
//! the asset.
#![forbid(unsafe_code)]

pub mod cache;
pub mod classify;
pub mod codec;
pub mod foundation;
pub mod intake;
pub mod store;
pub mod throttle;


pub use cache::{DerivedCache, Download, Materialized, Resolved, ServedFrom, SweepStats};
pub use classify::{Classification, classify};
pub use codec::{
    BuiltinWebpEncoder, ConversionOutcome, ConversionStatus, DegradeReason, Encoder, ToolEncoder,
    ToolFlavor, Transcoder,
};
pub use foundation::config::{CacheConfig, StillEncoderKind, ThrottleConfig};
pub use foundation::core::{ImageFormat, Quality};
pub use foundation::error::{CacheError, CacheResult};
pub use intake::{IngestReport, Upload};
pub use store::key::AssetKey;
pub use store::layout::{AllocatedKey, StoreLayout};
pub use store::listing::{DirectoryInfo, ImageInfo, Listing};
pub use throttle::LoginThrottle;
