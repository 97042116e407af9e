use crate::foundation::error::{VidloomError, VidloomResult};

pub use kurbo::{Affine, Point, Rect, Vec2};

/// Absolute 0-based frame index in output timeline space.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32, // must be > 0
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> VidloomResult<Self> {
        if den == 0 {
            return Err(VidloomError::config("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(VidloomError::config("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Whole-number FPS, e.g. `Fps::whole(24)`.
    pub fn whole(num: u32) -> VidloomResult<Self> {
        Self::new(num, 1)
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Convert frame count to seconds.
    pub fn frames_to_secs(self, frames: u64) -> f64 {
        (frames as f64) * self.frame_duration_secs()
    }

    /// Convert seconds to frame count using round-half-up semantics.
    pub fn secs_to_frames_round(self, secs: f64) -> u64 {
        (secs * self.as_f64()).round().max(0.0) as u64
    }
}

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Target orientation preset selecting the output resolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum VideoFormat {
    /// 1920x1080 landscape ("long" form).
    #[default]
    #[serde(rename = "long")]
    Landscape,
    /// 1080x1920 portrait ("short" form).
    #[serde(rename = "short")]
    Portrait,
}

impl VideoFormat {
    /// Output canvas for this format.
    pub fn canvas(self) -> Canvas {
        match self {
            VideoFormat::Landscape => Canvas {
                width: 1920,
                height: 1080,
            },
            VideoFormat::Portrait => Canvas {
                width: 1080,
                height: 1920,
            },
        }
    }

    /// Default bounding box for fitted overlay media in this format.
    pub fn fit_box(self) -> Canvas {
        match self {
            VideoFormat::Landscape => Canvas {
                width: 1200,
                height: 880,
            },
            VideoFormat::Portrait => Canvas {
                width: 880,
                height: 1200,
            },
        }
    }

    /// Parse the wire/CLI name (`"long"` or `"short"`).
    pub fn parse_flag(s: &str) -> VidloomResult<Self> {
        match s {
            "long" => Ok(VideoFormat::Landscape),
            "short" => Ok(VideoFormat::Portrait),
            other => Err(VidloomError::config(format!(
                "unknown video format {other:?} (expected \"long\" or \"short\")"
            ))),
        }
    }
}

/// A rendered frame as RGBA8 pixels.
///
/// Frames are **premultiplied alpha** by default throughout the pipeline. The `premultiplied`
/// flag is included to make this explicit at API boundaries.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether the `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// Allocate an opaque single-color frame.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let mut data = vec![0u8; width as usize * height as usize * 4];
        for px in data.chunks_exact_mut(4) {
            px.copy_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
        }
        Self {
            width,
            height,
            data,
            premultiplied: true,
        }
    }
}
