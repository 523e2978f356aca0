//! WebP encoding: external tools, the in-process fallback, and the convert-or-copy policy.

pub mod tool;
pub mod transcode;

pub use tool::{BuiltinWebpEncoder, Encoder, ToolEncoder, ToolFlavor};
pub use transcode::{ConversionOutcome, ConversionStatus, DegradeReason, Transcoder};
