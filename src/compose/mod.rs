//! Timeline composition: layer resolution and the frame-by-frame compositor.

pub mod compositor;
pub mod plan;
