//! Timeline resolution: map timed assets onto an ordered stack of placed,
//! frame-addressable layers.

use tracing::{debug, warn};

use crate::foundation::core::Canvas;
use crate::foundation::error::{VidloomError, VidloomResult};
use crate::media::source::{StillSource, VideoClipSource};
use crate::media::transform::{Placement, Shake};
use crate::timeline::model::{AssetKind, TimedAsset, Timeline};
use crate::timeline::store::ClipStore;

/// How a video layer maps composite-local time onto its source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeAddress {
    /// Wrap at the natural duration, repeating the clip seamlessly.
    Loop,
    /// Freeze at the last frame once time runs past the natural duration.
    Clamp,
}

/// Pixel content behind one layer.
#[derive(Debug)]
pub enum LayerContent {
    Still(StillSource),
    Video {
        source: VideoClipSource,
        addressing: TimeAddress,
    },
}

/// One placed overlay in the composite stack.
#[derive(Debug)]
pub struct Layer {
    pub order_id: u64,
    pub kind: AssetKind,
    pub start_s: f64,
    pub end_s: f64,
    pub placement: Placement,
    pub src_width: u32,
    pub src_height: u32,
    pub content: LayerContent,
    /// Set when a mid-render failure retired this layer.
    pub failed: bool,
}

impl Layer {
    /// Whether this layer contributes pixels at composite time `t`.
    pub fn active_at(&self, t: f64) -> bool {
        !self.failed && t >= self.start_s && t < self.end_s
    }

    /// Paint for clip-local time `clip_t` (composite time minus `start_s`).
    pub fn paint_at(&mut self, clip_t: f64) -> VidloomResult<vello_cpu::Image> {
        match &mut self.content {
            LayerContent::Still(still) => Ok(still.paint()),
            LayerContent::Video { source, addressing } => {
                let source_t = match addressing {
                    TimeAddress::Loop => source.looped_time(clip_t),
                    TimeAddress::Clamp => source.clamped_time(clip_t),
                };
                source.frame_at(source_t)
            }
        }
    }
}

/// A resolved composition: layers in paint order plus the visual extent.
#[derive(Debug)]
pub struct ComposePlan {
    pub layers: Vec<Layer>,
    /// Latest end time among the resolved layers, in seconds.
    pub visual_end_s: f64,
    /// Assets dropped during resolution.
    pub skipped: usize,
}

/// Resolve every timeline asset to a placed layer.
///
/// Images and loop clips form the lower band, text clips the upper band, each
/// ascending by `order_id`, so captions are never occluded. A missing or
/// unreadable clip is logged and its asset dropped; resolution only fails
/// outright when nothing resolves at all or a non-asset error occurs.
pub fn resolve_layers(
    timeline: &Timeline,
    store: &ClipStore,
    bounds: Canvas,
    canvas: Canvas,
    shake: Shake,
) -> VidloomResult<ComposePlan> {
    let mut media_band: Vec<Layer> = Vec::new();
    let mut text_band: Vec<Layer> = Vec::new();
    let mut skipped = 0usize;

    let mut assets: Vec<&TimedAsset> = timeline.assets.iter().collect();
    assets.sort_by_key(|a| a.order_id);

    for asset in assets {
        match resolve_one(asset, store, bounds, canvas, shake) {
            Ok(layer) => {
                debug!(
                    order_id = asset.order_id,
                    kind = asset.kind.dir_name(),
                    start_s = layer.start_s,
                    end_s = layer.end_s,
                    "layer placed"
                );
                if asset.kind == AssetKind::Text {
                    text_band.push(layer);
                } else {
                    media_band.push(layer);
                }
            }
            Err(err) if err.is_per_asset() => {
                warn!(order_id = asset.order_id, error = %err, "skipping asset");
                skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    let mut layers = media_band;
    layers.append(&mut text_band);
    if layers.is_empty() {
        return Err(VidloomError::render(format!(
            "no composable assets (skipped {skipped} of {})",
            timeline.assets.len()
        )));
    }
    let visual_end_s = layers.iter().map(|l| l.end_s).fold(0.0_f64, f64::max);
    Ok(ComposePlan {
        layers,
        visual_end_s,
        skipped,
    })
}

fn resolve_one(
    asset: &TimedAsset,
    store: &ClipStore,
    bounds: Canvas,
    canvas: Canvas,
    shake: Shake,
) -> VidloomResult<Layer> {
    let path = store.resolve(asset)?;
    let (content, src_width, src_height, placement) = match asset.kind {
        AssetKind::Image => {
            let still = StillSource::open(&path)?;
            let (w, h) = (still.width(), still.height());
            let placement = Placement::fitted(w, h, bounds, canvas, shake);
            (LayerContent::Still(still), w, h, placement)
        }
        AssetKind::LoopClip => {
            let source = VideoClipSource::open(&path)?;
            let (w, h) = (source.info().width, source.info().height);
            let placement = Placement::fitted(w, h, bounds, canvas, shake);
            let content = LayerContent::Video {
                source,
                addressing: TimeAddress::Loop,
            };
            (content, w, h, placement)
        }
        AssetKind::Text => {
            let source = VideoClipSource::open(&path)?;
            let (w, h) = (source.info().width, source.info().height);
            let placement = Placement::centered(w, h, canvas);
            let content = LayerContent::Video {
                source,
                addressing: TimeAddress::Clamp,
            };
            (content, w, h, placement)
        }
    };
    Ok(Layer {
        order_id: asset.order_id,
        kind: asset.kind,
        start_s: asset.start_s(),
        end_s: asset.end_s(),
        placement,
        src_width,
        src_height,
        content,
        failed: false,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::PathBuf;

    use super::*;

    const CANVAS: Canvas = Canvas {
        width: 1920,
        height: 1080,
    };
    const BOUNDS: Canvas = Canvas {
        width: 1200,
        height: 880,
    };

    fn scratch_store(tag: &str) -> (ClipStore, PathBuf) {
        let root = std::env::temp_dir().join(format!(
            "vidloom_plan_{tag}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .subsec_nanos()
        ));
        std::fs::create_dir_all(&root).unwrap();
        (ClipStore::new(&root), root)
    }

    fn write_png(path: &std::path::Path, w: u32, h: u32) {
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba([10, 20, 30, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, buf).unwrap();
    }

    fn asset(order_id: u64, kind: AssetKind, start_ms: u64, end_ms: u64) -> TimedAsset {
        TimedAsset {
            order_id,
            text: String::new(),
            kind,
            start_ms,
            end_ms,
        }
    }

    #[test]
    fn missing_clips_are_skipped_until_nothing_is_left() {
        let (store, root) = scratch_store("allmissing");
        let timeline = Timeline {
            assets: vec![
                asset(1, AssetKind::Image, 0, 1000),
                asset(2, AssetKind::LoopClip, 1000, 2000),
            ],
        };
        let err =
            resolve_layers(&timeline, &store, BOUNDS, CANVAS, Shake::NONE).unwrap_err();
        assert!(err.to_string().contains("no composable assets"));
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn resolved_image_layer_carries_fitted_placement() {
        let (store, root) = scratch_store("image");
        write_png(&root.join("image").join("1.png"), 400, 300);
        let timeline = Timeline {
            assets: vec![
                asset(1, AssetKind::Image, 500, 2500),
                // Missing gif gets skipped, the image still resolves.
                asset(2, AssetKind::LoopClip, 2500, 5800),
            ],
        };
        let plan = resolve_layers(&timeline, &store, BOUNDS, CANVAS, Shake::NONE).unwrap();
        assert_eq!(plan.layers.len(), 1);
        assert_eq!(plan.skipped, 1);
        assert_eq!(plan.visual_end_s, 2.5);

        let layer = &plan.layers[0];
        assert_eq!(layer.order_id, 1);
        assert_eq!((layer.src_width, layer.src_height), (400, 300));
        assert!((layer.placement.scale - 880.0 / 300.0).abs() < 1e-9);
        assert!(layer.active_at(0.5));
        assert!(layer.active_at(2.4999));
        assert!(!layer.active_at(2.5));
        assert!(!layer.active_at(0.4999));
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn still_layer_paint_is_time_invariant() {
        let (store, root) = scratch_store("paint");
        write_png(&root.join("image").join("7.png"), 8, 8);
        let timeline = Timeline {
            assets: vec![asset(7, AssetKind::Image, 0, 1000)],
        };
        let mut plan = resolve_layers(&timeline, &store, BOUNDS, CANVAS, Shake::NONE).unwrap();
        let layer = &mut plan.layers[0];
        assert!(layer.paint_at(0.0).is_ok());
        assert!(layer.paint_at(0.9).is_ok());
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn retired_layers_go_inactive() {
        let (store, root) = scratch_store("retired");
        write_png(&root.join("image").join("3.png"), 8, 8);
        let timeline = Timeline {
            assets: vec![asset(3, AssetKind::Image, 0, 1000)],
        };
        let mut plan = resolve_layers(&timeline, &store, BOUNDS, CANVAS, Shake::NONE).unwrap();
        assert!(plan.layers[0].active_at(0.5));
        plan.layers[0].failed = true;
        assert!(!plan.layers[0].active_at(0.5));
        std::fs::remove_dir_all(&root).unwrap();
    }
}
