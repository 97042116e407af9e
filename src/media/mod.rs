//! Media introspection, decoding, and placement for composition sources.

pub mod probe;
pub mod source;
pub mod transform;
