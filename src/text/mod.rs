//! Animated caption pipeline: fonts, wrapping, the per-frame state machine,
//! CPU rasterization, and clip encoding.

pub mod anim;
pub mod clip;
pub mod font;
pub mod frame;
pub mod wrap;
