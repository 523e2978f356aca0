//! On-disk layout of the original and derivative stores.

/// Asset keys and path normalization.
pub mod key;
/// Key allocation under the two store roots.
pub mod layout;
/// Directory listing of the derivative store.
pub mod listing;
