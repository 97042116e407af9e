//! Timed-asset timeline: the JSON wire model and on-disk clip resolution.

pub mod model;
pub mod store;
