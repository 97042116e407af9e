//! Placement math for overlay clips: uniform fit scaling and the periodic
//! position offset that gives stills a little motion.

use std::f64::consts::TAU;

use crate::foundation::core::{Affine, Canvas, Vec2};

/// Uniform scale placing a `src_w` by `src_h` rectangle inside `bounds` with
/// aspect preserved: `min(box_w/src_w, box_h/src_h)`. The scaled size never
/// exceeds the box in either dimension.
pub fn fit_scale(src_w: u32, src_h: u32, bounds: Canvas) -> f64 {
    if src_w == 0 || src_h == 0 {
        return 0.0;
    }
    let sx = f64::from(bounds.width) / f64::from(src_w);
    let sy = f64::from(bounds.height) / f64::from(src_h);
    sx.min(sy)
}

/// Non-uniform stretch of a source rectangle onto the full canvas, used for
/// the background layer.
pub fn stretch_to_canvas(src_w: u32, src_h: u32, canvas: Canvas) -> Affine {
    if src_w == 0 || src_h == 0 {
        return Affine::IDENTITY;
    }
    Affine::scale_non_uniform(
        f64::from(canvas.width) / f64::from(src_w),
        f64::from(canvas.height) / f64::from(src_h),
    )
}

/// Decorative periodic displacement: `dx = A sin(2π f_x t)`, `dy = A cos(2π f_y t)`.
///
/// Offsets stay within `±amplitude_px` on both axes for all `t`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shake {
    pub amplitude_px: f64,
    pub freq_x_hz: f64,
    pub freq_y_hz: f64,
}

impl Default for Shake {
    fn default() -> Self {
        Self {
            amplitude_px: 3.0,
            freq_x_hz: 2.0,
            freq_y_hz: 2.0,
        }
    }
}

impl Shake {
    pub const NONE: Shake = Shake {
        amplitude_px: 0.0,
        freq_x_hz: 0.0,
        freq_y_hz: 0.0,
    };

    pub fn offset(&self, t: f64) -> Vec2 {
        Vec2::new(
            self.amplitude_px * (t * self.freq_x_hz * TAU).sin(),
            self.amplitude_px * (t * self.freq_y_hz * TAU).cos(),
        )
    }
}

/// Resolved placement for one overlay: a uniform scale, a centered base
/// position, and the motion applied on top.
#[derive(Clone, Copy, Debug)]
pub struct Placement {
    pub scale: f64,
    pub base_x: f64,
    pub base_y: f64,
    pub shake: Shake,
}

impl Placement {
    /// Fit the source into `bounds`, centered on `canvas`, moving with `shake`.
    pub fn fitted(src_w: u32, src_h: u32, bounds: Canvas, canvas: Canvas, shake: Shake) -> Self {
        let scale = fit_scale(src_w, src_h, bounds);
        Self {
            scale,
            base_x: (f64::from(canvas.width) - scale * f64::from(src_w)) / 2.0,
            base_y: (f64::from(canvas.height) - scale * f64::from(src_h)) / 2.0,
            shake,
        }
    }

    /// Dead-center at natural size with no motion (text clips).
    pub fn centered(src_w: u32, src_h: u32, canvas: Canvas) -> Self {
        Self {
            scale: 1.0,
            base_x: (f64::from(canvas.width) - f64::from(src_w)) / 2.0,
            base_y: (f64::from(canvas.height) - f64::from(src_h)) / 2.0,
            shake: Shake::NONE,
        }
    }

    /// Paint transform at composite-local time `t`: scale, then translate to
    /// the displaced position.
    pub fn transform(&self, t: f64) -> Affine {
        let offset = self.shake.offset(t);
        Affine::translate((self.base_x + offset.x, self.base_y + offset.y))
            * Affine::scale(self.scale)
    }
}
