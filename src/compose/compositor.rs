//! Frame-by-frame composition: stretched background, placed overlays, and the
//! narration track muxed in, trimmed to the shorter of picture and sound.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tracing::{info, warn};

use crate::compose::plan::{Layer, resolve_layers};
use crate::encode::ffmpeg::{
    FfmpegSink, FfmpegSinkOpts, TempPathGuard, ensure_parent_dir, promote_staging,
    staging_path_for,
};
use crate::encode::sink::{AudioInputConfig, FrameSink, SinkConfig};
use crate::foundation::core::{Affine, Canvas, Fps, FrameIndex, FrameRGBA, VideoFormat};
use crate::foundation::error::{VidloomError, VidloomResult};
use crate::media::probe::MIX_SAMPLE_RATE;
use crate::media::source::{StillSource, decode_audio_f32_stereo};
use crate::media::transform::{Shake, stretch_to_canvas};
use crate::text::frame::clear_pixmap;
use crate::timeline::model::Timeline;
use crate::timeline::store::ClipStore;

/// Composition knobs. Defaults match the production profile: landscape, 30 fps,
/// the format's overlay box, gentle shake on media overlays.
#[derive(Clone, Debug)]
pub struct ComposeOptions {
    pub format: VideoFormat,
    pub fps: Fps,
    /// Overlay fit box; `None` uses the format's default.
    pub bounding_box: Option<Canvas>,
    pub shake: Shake,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            format: VideoFormat::default(),
            fps: Fps { num: 30, den: 1 },
            bounding_box: None,
            shake: Shake::default(),
        }
    }
}

/// Compose the timeline over `background_path`, mux `audio_path`, and write the
/// result to `output_path`.
///
/// The final duration is `min(latest resolved asset end, audio duration)`. The
/// output appears atomically via a staging file; on any failure the staging
/// file and the audio scratch file are removed by drop guards.
#[tracing::instrument(skip_all, fields(assets = timeline.assets.len(), out = %output_path.display()))]
pub fn compose(
    timeline: &Timeline,
    store: &ClipStore,
    background_path: &Path,
    audio_path: &Path,
    output_path: &Path,
    opts: &ComposeOptions,
) -> VidloomResult<PathBuf> {
    if timeline.assets.is_empty() {
        return Err(VidloomError::EmptyTimeline);
    }
    timeline.validate()?;
    if !background_path.is_file() {
        return Err(VidloomError::config(format!(
            "background image '{}' does not exist",
            background_path.display()
        )));
    }
    if !audio_path.is_file() {
        return Err(VidloomError::config(format!(
            "audio track '{}' does not exist",
            audio_path.display()
        )));
    }

    let canvas = opts.format.canvas();
    let bounds = opts.bounding_box.unwrap_or_else(|| opts.format.fit_box());
    let background = StillSource::open(background_path)?;
    let mut plan = resolve_layers(timeline, store, bounds, canvas, opts.shake)?;

    let mut audio = decode_audio_f32_stereo(audio_path, MIX_SAMPLE_RATE)?;
    let final_s = plan.visual_end_s.min(audio.duration_s());
    if final_s <= 0.0 {
        return Err(VidloomError::config(format!(
            "composite duration collapsed to zero (visual end {:.3}s, audio {:.3}s)",
            plan.visual_end_s,
            audio.duration_s()
        )));
    }
    audio.truncate_to(final_s);

    let total_frames = opts.fps.secs_to_frames_round(final_s);
    info!(
        duration_s = final_s,
        frames = total_frames,
        layers = plan.layers.len(),
        skipped = plan.skipped,
        "composing timeline"
    );

    let audio_scratch = scratch_audio_path();
    std::fs::write(&audio_scratch, audio.to_le_bytes())
        .with_context(|| format!("write audio scratch '{}'", audio_scratch.display()))?;
    let _audio_guard = TempPathGuard(Some(audio_scratch.clone()));

    ensure_parent_dir(output_path)?;
    let staging = staging_path_for(output_path);
    let mut out_guard = TempPathGuard(Some(staging.clone()));
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(&staging));
    sink.begin(SinkConfig {
        width: canvas.width,
        height: canvas.height,
        fps: opts.fps,
        audio: Some(AudioInputConfig::new(audio_scratch)),
    })?;

    let sole_layer = plan.layers.len() == 1;
    let mut renderer = CompositeRenderer::new(canvas)?;
    for i in 0..total_frames {
        let t = opts.fps.frames_to_secs(i);
        let frame = renderer.render_frame(&background, &mut plan.layers, t, sole_layer)?;
        sink.push_frame(FrameIndex(i), &frame)?;
    }
    sink.end()?;

    promote_staging(&staging, output_path)?;
    out_guard.disarm();
    info!("composite written");
    Ok(output_path.to_path_buf())
}

struct CompositeRenderer {
    canvas: Canvas,
    width_u16: u16,
    height_u16: u16,
    pixmap: vello_cpu::Pixmap,
}

impl CompositeRenderer {
    fn new(canvas: Canvas) -> VidloomResult<Self> {
        let width_u16: u16 = canvas
            .width
            .try_into()
            .map_err(|_| VidloomError::config("canvas width exceeds u16"))?;
        let height_u16: u16 = canvas
            .height
            .try_into()
            .map_err(|_| VidloomError::config("canvas height exceeds u16"))?;
        Ok(Self {
            canvas,
            width_u16,
            height_u16,
            pixmap: vello_cpu::Pixmap::new(width_u16, height_u16),
        })
    }

    /// Draw the composite at time `t`: background first, then every active
    /// layer in stack order.
    ///
    /// A per-asset decode failure retires that layer and the render goes on
    /// without it, unless it is the only layer.
    fn render_frame(
        &mut self,
        background: &StillSource,
        layers: &mut [Layer],
        t: f64,
        sole_layer: bool,
    ) -> VidloomResult<FrameRGBA> {
        clear_pixmap(&mut self.pixmap, [0, 0, 0, 255]);
        let mut ctx = vello_cpu::RenderContext::new(self.width_u16, self.height_u16);

        draw_image(
            &mut ctx,
            background.paint(),
            stretch_to_canvas(background.width(), background.height(), self.canvas),
            background.width(),
            background.height(),
        );

        for layer in layers.iter_mut() {
            if !layer.active_at(t) {
                continue;
            }
            let clip_t = t - layer.start_s;
            match layer.paint_at(clip_t) {
                Ok(paint) => draw_image(
                    &mut ctx,
                    paint,
                    layer.placement.transform(clip_t),
                    layer.src_width,
                    layer.src_height,
                ),
                Err(err) if err.is_per_asset() && !sole_layer => {
                    warn!(
                        order_id = layer.order_id,
                        error = %err,
                        "retiring layer after decode failure"
                    );
                    layer.failed = true;
                }
                Err(err) => return Err(err),
            }
        }

        ctx.flush();
        ctx.render_to_pixmap(&mut self.pixmap);
        Ok(FrameRGBA {
            width: self.canvas.width,
            height: self.canvas.height,
            data: self.pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }
}

fn draw_image(
    ctx: &mut vello_cpu::RenderContext,
    paint: vello_cpu::Image,
    transform: Affine,
    src_w: u32,
    src_h: u32,
) {
    ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_transform(affine_to_cpu(transform));
    ctx.set_paint(paint);
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
        0.0,
        0.0,
        f64::from(src_w),
        f64::from(src_h),
    ));
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn scratch_audio_path() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    std::env::temp_dir().join(format!(
        "vidloom_mix_{}_{nanos}.f32le",
        std::process::id()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::model::{AssetKind, TimedAsset};

    fn one_asset_timeline() -> Timeline {
        Timeline {
            assets: vec![TimedAsset {
                order_id: 1,
                text: "x".into(),
                kind: AssetKind::Image,
                start_ms: 0,
                end_ms: 1000,
            }],
        }
    }

    #[test]
    fn default_options_use_the_production_profile() {
        let opts = ComposeOptions::default();
        assert_eq!(opts.format, VideoFormat::Landscape);
        assert_eq!((opts.fps.num, opts.fps.den), (30, 1));
        assert!(opts.bounding_box.is_none());
        assert_eq!(opts.shake.amplitude_px, 3.0);
    }

    #[test]
    fn empty_timeline_fails_before_any_io() {
        let err = compose(
            &Timeline::default(),
            &ClipStore::new("/nonexistent"),
            Path::new("/nonexistent/bg.png"),
            Path::new("/nonexistent/audio.mp3"),
            Path::new("/nonexistent/out.mp4"),
            &ComposeOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, VidloomError::EmptyTimeline));
    }

    #[test]
    fn missing_background_is_a_config_error() {
        let err = compose(
            &one_asset_timeline(),
            &ClipStore::new("/nonexistent"),
            Path::new("/nonexistent/bg.png"),
            Path::new("/nonexistent/audio.mp3"),
            Path::new("/nonexistent/out.mp4"),
            &ComposeOptions::default(),
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("configuration error"), "{msg}");
        assert!(msg.contains("background"), "{msg}");
    }

    #[test]
    fn missing_audio_is_a_config_error() {
        let bg = std::env::temp_dir().join(format!(
            "vidloom_bg_probe_{}_{}.png",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .subsec_nanos()
        ));
        std::fs::write(&bg, b"placeholder").unwrap();
        let err = compose(
            &one_asset_timeline(),
            &ClipStore::new("/nonexistent"),
            &bg,
            Path::new("/nonexistent/audio.mp3"),
            Path::new("/nonexistent/out.mp4"),
            &ComposeOptions::default(),
        )
        .unwrap_err();
        std::fs::remove_file(&bg).unwrap();
        let msg = err.to_string();
        assert!(msg.contains("audio track"), "{msg}");
    }

    #[test]
    fn scratch_audio_paths_have_the_pcm_extension() {
        let p = scratch_audio_path();
        assert_eq!(p.extension().unwrap(), "f32le");
    }
}
