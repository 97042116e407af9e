//! Vidloom renders timed text animations and composites them, together with
//! images and looping clips, into a finished video over a still background and
//! an audio track.
//!
//! The pipeline has two halves:
//!
//! - [`render_text_clips`] pre-renders every text asset of a [`Timeline`] into
//!   a per-asset clip inside a [`ClipStore`]
//! - [`compose`] resolves the full timeline against the store and streams the
//!   layered result through an ffmpeg [`FrameSink`]
//!
//! Both halves also exist as lower-level pieces (frame generators, sinks,
//! sources) for callers that want to drive rendering themselves.
#![forbid(unsafe_code)]

pub mod compose;
pub mod encode;
pub mod foundation;
pub mod media;
pub mod text;
pub mod timeline;

pub use crate::foundation::core::{
    Affine, Canvas, Fps, FrameIndex, FrameRGBA, Point, Rect, Vec2, VideoFormat,
};
pub use crate::foundation::error::{VidloomError, VidloomResult};

pub use crate::compose::compositor::{ComposeOptions, compose};
pub use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts, is_ffmpeg_on_path, is_ffprobe_on_path};
pub use crate::encode::sink::{AudioInputConfig, FrameSink, InMemorySink, SinkConfig};
pub use crate::media::probe::{MediaInfo, probe_media};
pub use crate::media::source::{AudioPcm, StillSource, VideoClipSource};
pub use crate::media::transform::{Placement, Shake};
pub use crate::text::anim::{AnimationSpec, FrameState, TextAlign, TextEffect, VAlign, frame_state};
pub use crate::text::clip::{
    ClipBatchOptions, ClipBatchReport, encode_text_clip, render_text_clips, render_text_frames,
};
pub use crate::text::font::{FontSpec, vibrant_color_for};
pub use crate::timeline::model::{AssetKind, TimedAsset, Timeline};
pub use crate::timeline::store::ClipStore;
