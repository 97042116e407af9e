//! Shared primitives: frame/time types, pixel formats, the error taxonomy.

/// Frame-rate, format and pixel primitives.
pub mod core;
/// Crate-wide error type and result alias.
pub mod error;
pub(crate) mod math;
