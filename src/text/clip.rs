//! Text-clip generation: drives the animation state machine through the frame
//! renderer into a [`FrameSink`], one clip per caption.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::encode::ffmpeg::{
    FfmpegSink, FfmpegSinkOpts, TempPathGuard, ensure_parent_dir, promote_staging,
    staging_path_for,
};
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::{Fps, FrameIndex, VideoFormat};
use crate::foundation::error::{VidloomError, VidloomResult};
use crate::text::anim::{AnimationSpec, TextEffect, frame_state};
use crate::text::font::{FontSpec, vibrant_color_for};
use crate::text::frame::TextFrameRenderer;
use crate::timeline::model::{AssetKind, TimedAsset, Timeline};
use crate::timeline::store::ClipStore;

/// Render every frame of the animation for `text` into `sink`.
///
/// No files are touched; pair with [`InMemorySink`](crate::encode::sink::InMemorySink)
/// to inspect frames directly. Returns the number of frames pushed.
pub fn render_text_frames(
    text: &str,
    spec: &AnimationSpec,
    format: VideoFormat,
    sink: &mut dyn FrameSink,
) -> VidloomResult<u64> {
    render_text_frames_inner(text, spec, format, sink, None)
}

fn render_text_frames_inner(
    text: &str,
    spec: &AnimationSpec,
    format: VideoFormat,
    sink: &mut dyn FrameSink,
    cancel: Option<&AtomicBool>,
) -> VidloomResult<u64> {
    let total = spec.total_frames();
    if total == 0 {
        return Err(VidloomError::render(format!(
            "animation spec yields zero frames ({:.3}s at {}/{} fps)",
            spec.total_duration_s(),
            spec.fps.num,
            spec.fps.den
        )));
    }
    let canvas = format.canvas();
    let mut renderer = TextFrameRenderer::new(canvas, &spec.font)?;
    let font_color = spec.font_color.unwrap_or_else(|| vibrant_color_for(text));

    sink.begin(SinkConfig {
        width: canvas.width,
        height: canvas.height,
        fps: spec.fps,
        audio: None,
    })?;
    for i in 0..total {
        if let Some(flag) = cancel {
            if flag.load(Ordering::Relaxed) {
                return Err(VidloomError::render("text clip encode cancelled"));
            }
        }
        let state = frame_state(spec, text, i);
        let frame = renderer.render(spec.bg_color, font_color, &state, spec.align, spec.v_align)?;
        sink.push_frame(FrameIndex(i), &frame)?;
    }
    sink.end()?;
    Ok(total)
}

/// Encode the animation for `text` to an H.264 file at `out_path`.
///
/// The clip has no audio track. Encoding targets a staging file in the same
/// directory and renames it into place only after ffmpeg exits cleanly, so a
/// crash or failure never leaves a truncated file under the final name.
#[tracing::instrument(skip(text, spec), fields(frames = spec.total_frames()))]
pub fn encode_text_clip(
    text: &str,
    spec: &AnimationSpec,
    format: VideoFormat,
    out_path: &Path,
) -> VidloomResult<PathBuf> {
    encode_text_clip_inner(text, spec, format, out_path, None)
}

fn encode_text_clip_inner(
    text: &str,
    spec: &AnimationSpec,
    format: VideoFormat,
    out_path: &Path,
    cancel: Option<&AtomicBool>,
) -> VidloomResult<PathBuf> {
    ensure_parent_dir(out_path)?;
    let staging = staging_path_for(out_path);
    let mut guard = TempPathGuard(Some(staging.clone()));
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(&staging));
    let frames = render_text_frames_inner(text, spec, format, &mut sink, cancel)?;
    promote_staging(&staging, out_path)?;
    guard.disarm();
    debug!(frames, out = %out_path.display(), "text clip encoded");
    Ok(out_path.to_path_buf())
}

/// Shared knobs for batch text-clip generation.
///
/// Per-asset phase durations always come from the asset's own slot length via
/// [`AnimationSpec::for_duration`]; these options override everything else.
#[derive(Clone, Debug)]
pub struct ClipBatchOptions {
    pub format: VideoFormat,
    pub effect: TextEffect,
    pub font: FontSpec,
    /// Straight RGB; `None` picks per-caption from the vibrant palette.
    pub font_color: Option<[u8; 3]>,
    pub bg_color: [u8; 3],
    pub fps: Fps,
}

impl Default for ClipBatchOptions {
    fn default() -> Self {
        Self {
            format: VideoFormat::default(),
            effect: TextEffect::default(),
            font: FontSpec::default(),
            font_color: None,
            bg_color: [0, 0, 0],
            fps: Fps { num: 24, den: 1 },
        }
    }
}

impl ClipBatchOptions {
    /// Animation spec for one timed asset: slot-derived phases plus these options.
    pub fn spec_for(&self, asset: &TimedAsset) -> AnimationSpec {
        AnimationSpec {
            effect: self.effect,
            font: self.font.clone(),
            font_color: self.font_color,
            bg_color: self.bg_color,
            fps: self.fps,
            ..AnimationSpec::for_duration(asset.duration_s())
        }
    }
}

/// Outcome counts from [`render_text_clips`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClipBatchReport {
    /// Clips encoded and promoted to their final paths.
    pub rendered: usize,
    /// Assets dropped after a per-asset failure.
    pub skipped: usize,
}

/// Encode one clip per text asset in `timeline`, in parallel, into the store's
/// `text/` directory.
///
/// Per-asset failures are logged and skipped so one bad caption cannot sink the
/// batch, with two exceptions: a sole text asset failing is a batch failure, and
/// so is every asset failing. Non-asset errors (an unreadable font, for example)
/// abort immediately. Workers observe `cancel` between frames and stop early.
#[tracing::instrument(skip_all, fields(assets = timeline.assets.len()))]
pub fn render_text_clips(
    timeline: &Timeline,
    opts: &ClipBatchOptions,
    store: &ClipStore,
    cancel: &AtomicBool,
) -> VidloomResult<ClipBatchReport> {
    let texts = timeline.assets_of_kind(AssetKind::Text);
    if texts.is_empty() {
        info!("timeline has no text assets, nothing to render");
        return Ok(ClipBatchReport::default());
    }

    let dir = store.kind_dir(AssetKind::Text);
    std::fs::create_dir_all(&dir).map_err(|e| {
        VidloomError::config(format!("cannot create clip dir '{}': {e}", dir.display()))
    })?;

    let results: Vec<(u64, VidloomResult<PathBuf>)> = texts
        .par_iter()
        .map(|asset| {
            let spec = opts.spec_for(asset);
            let out = store.text_clip_path(asset.order_id);
            let result = encode_text_clip_inner(&asset.text, &spec, opts.format, &out, Some(cancel));
            (asset.order_id, result)
        })
        .collect();

    if cancel.load(Ordering::Relaxed) {
        return Err(VidloomError::render("text clip batch cancelled"));
    }

    let mut report = ClipBatchReport::default();
    for (order_id, result) in results {
        match result {
            Ok(path) => {
                debug!(order_id, path = %path.display(), "text clip ready");
                report.rendered += 1;
            }
            Err(err) if err.is_per_asset() && texts.len() > 1 => {
                warn!(order_id, error = %err, "skipping text asset after render failure");
                report.skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }
    if report.rendered == 0 {
        return Err(VidloomError::render(format!(
            "all {} text clips failed",
            texts.len()
        )));
    }
    info!(
        rendered = report.rendered,
        skipped = report.skipped,
        "text clip batch done"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::sink::InMemorySink;

    fn quick_spec() -> AnimationSpec {
        AnimationSpec {
            effect_duration_s: 0.25,
            hold_duration_s: 0.25,
            fadeout_duration_s: 0.25,
            fps: Fps { num: 4, den: 1 },
            ..AnimationSpec::default()
        }
    }

    #[test]
    fn zero_duration_spec_is_a_render_error() {
        let spec = AnimationSpec {
            effect_duration_s: 0.0,
            hold_duration_s: 0.0,
            fadeout_duration_s: 0.0,
            ..AnimationSpec::default()
        };
        let mut sink = InMemorySink::new();
        let err = render_text_frames("hi", &spec, VideoFormat::Landscape, &mut sink)
            .unwrap_err();
        assert!(err.to_string().contains("zero frames"));
        assert!(sink.config().is_none(), "sink must stay untouched");
    }

    #[test]
    fn frame_stream_matches_spec_frame_count() {
        let spec = quick_spec();
        let mut sink = InMemorySink::new();
        match render_text_frames("ok", &spec, VideoFormat::Landscape, &mut sink) {
            Ok(n) => {
                assert_eq!(n, 3);
                assert_eq!(sink.frames().len(), 3);
                let cfg = sink.config().unwrap();
                assert_eq!((cfg.width, cfg.height), (1920, 1080));
                assert!(cfg.audio.is_none());
                for (i, (idx, frame)) in sink.frames().iter().enumerate() {
                    assert_eq!(idx.0, i as u64);
                    assert_eq!((frame.width, frame.height), (1920, 1080));
                }
            }
            // Host without any usable font: constructor error is the accepted outcome.
            Err(err) => assert!(err.to_string().contains("font")),
        }
    }

    #[test]
    fn cancellation_stops_before_first_frame() {
        let spec = quick_spec();
        let mut sink = InMemorySink::new();
        let cancel = AtomicBool::new(true);
        let result = render_text_frames_inner(
            "ok",
            &spec,
            VideoFormat::Landscape,
            &mut sink,
            Some(&cancel),
        );
        let err = result.unwrap_err();
        assert!(
            err.to_string().contains("cancelled") || err.to_string().contains("font"),
            "unexpected error: {err}"
        );
        assert!(sink.frames().is_empty());
    }

    #[test]
    fn batch_spec_derives_phases_from_slot_length() {
        let opts = ClipBatchOptions::default();
        let asset = TimedAsset {
            order_id: 1,
            text: "caption".into(),
            kind: AssetKind::Text,
            start_ms: 1000,
            end_ms: 3000,
        };
        let spec = opts.spec_for(&asset);
        assert_eq!(spec.effect_duration_s, 0.5);
        assert_eq!(spec.hold_duration_s, 1.0);
        assert_eq!(spec.fadeout_duration_s, 0.5);
        assert_eq!(spec.total_frames(), 48);
    }

    #[test]
    fn batch_without_text_assets_is_a_no_op() {
        let timeline = Timeline {
            assets: vec![TimedAsset {
                order_id: 1,
                text: String::new(),
                kind: AssetKind::Image,
                start_ms: 0,
                end_ms: 1000,
            }],
        };
        let store = ClipStore::new(std::env::temp_dir().join("vidloom_noop_batch"));
        let cancel = AtomicBool::new(false);
        let report =
            render_text_clips(&timeline, &ClipBatchOptions::default(), &store, &cancel).unwrap();
        assert_eq!(report, ClipBatchReport::default());
    }
}
