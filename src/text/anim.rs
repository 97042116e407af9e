use crate::foundation::core::Fps;
use crate::foundation::error::{VidloomError, VidloomResult};
use crate::text::font::{FontSpec, font_size_for_len};

/// Caption animation effect. Closed set, dispatched exhaustively in [`frame_state`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEffect {
    /// Characters appear one by one across the effect phase.
    RevealByLetter,
    /// Words appear one by one across the effect phase.
    #[default]
    RevealByWord,
    /// Full text grows from 10% to 100% of the base size.
    Zoom,
    /// Full text shown unchanged from the first frame.
    Static,
}

impl TextEffect {
    /// Parse the wire/CLI name.
    pub fn parse_flag(s: &str) -> VidloomResult<Self> {
        match s {
            "reveal_by_letter" => Ok(TextEffect::RevealByLetter),
            "reveal_by_word" => Ok(TextEffect::RevealByWord),
            "zoom" => Ok(TextEffect::Zoom),
            "static" => Ok(TextEffect::Static),
            other => Err(VidloomError::config(format!(
                "unknown text effect {other:?} (expected \
                 \"reveal_by_letter\", \"reveal_by_word\", \"zoom\" or \"static\")"
            ))),
        }
    }
}

/// Horizontal line placement within the frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// Vertical placement of the whole text block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VAlign {
    Top,
    #[default]
    Middle,
    Bottom,
}

/// Timing and style for one animated text clip.
///
/// Durations are the three contiguous phases: effect, hold, fadeout. A zero duration
/// collapses that phase to zero frames.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnimationSpec {
    pub effect: TextEffect,
    pub effect_duration_s: f64,
    pub hold_duration_s: f64,
    pub fadeout_duration_s: f64,
    pub fps: Fps,
    /// Straight RGB; `None` picks deterministically from the vibrant palette.
    pub font_color: Option<[u8; 3]>,
    /// Straight RGB background fill.
    pub bg_color: [u8; 3],
    pub font: FontSpec,
    /// Base display size in pixels; `None` derives from text length.
    pub font_size: Option<u32>,
    pub align: TextAlign,
    pub v_align: VAlign,
}

impl Default for AnimationSpec {
    fn default() -> Self {
        Self {
            effect: TextEffect::default(),
            effect_duration_s: 0.5,
            hold_duration_s: 1.0,
            fadeout_duration_s: 0.5,
            fps: Fps { num: 24, den: 1 },
            font_color: None,
            bg_color: [0, 0, 0],
            font: FontSpec::default(),
            font_size: None,
            align: TextAlign::default(),
            v_align: VAlign::default(),
        }
    }
}

impl AnimationSpec {
    /// Split `total_s` into the standard 25% effect / 50% hold / 25% fadeout phases.
    pub fn for_duration(total_s: f64) -> Self {
        let total_s = total_s.max(0.0);
        Self {
            effect_duration_s: total_s * 0.25,
            hold_duration_s: total_s * 0.5,
            fadeout_duration_s: total_s * 0.25,
            ..Self::default()
        }
    }

    /// Sum of all three phase durations in seconds.
    pub fn total_duration_s(&self) -> f64 {
        self.effect_duration_s.max(0.0)
            + self.hold_duration_s.max(0.0)
            + self.fadeout_duration_s.max(0.0)
    }

    /// Number of output frames, `round(total_duration_s * fps)`.
    pub fn total_frames(&self) -> u64 {
        self.fps.secs_to_frames_round(self.total_duration_s())
    }

    /// Base display size for `text`: the explicit override, or the length heuristic.
    pub fn base_font_size(&self, text: &str) -> u32 {
        self.font_size
            .unwrap_or_else(|| font_size_for_len(text.chars().count()))
    }
}

/// Resolved render inputs for one frame of a text clip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameState {
    /// Substring of the caption visible this frame.
    pub visible_text: String,
    /// Display size in pixels.
    pub font_size: u32,
    /// Straight alpha applied to the whole text block.
    pub alpha: u8,
}

/// Pure state transition: animation inputs for frame `frame` of `text` under `spec`.
///
/// Let `t = frame / fps`. The three phases partition time in order: effect
/// `[0, e)`, hold `[e, e + h)`, fadeout `[e + h, ..)` bounded by the fadeout
/// duration through clamping.
pub fn frame_state(spec: &AnimationSpec, text: &str, frame: u64) -> FrameState {
    let t = spec.fps.frames_to_secs(frame);
    let e = spec.effect_duration_s.max(0.0);
    let h = spec.hold_duration_s.max(0.0);
    let f = spec.fadeout_duration_s.max(0.0);
    let base_size = spec.base_font_size(text);

    if t < e {
        let progress = (t / e).clamp(0.0, 1.0);
        return match spec.effect {
            TextEffect::RevealByLetter => {
                let chars = text.chars().count();
                let shown = ((chars as f64) * progress).floor() as usize;
                FrameState {
                    visible_text: text.chars().take(shown).collect(),
                    font_size: base_size,
                    alpha: 255,
                }
            }
            TextEffect::RevealByWord => {
                let words: Vec<&str> = text.split_whitespace().collect();
                let shown = ((words.len() as f64) * progress).floor() as usize;
                FrameState {
                    visible_text: words[..shown].join(" "),
                    font_size: base_size,
                    alpha: 255,
                }
            }
            TextEffect::Zoom => FrameState {
                visible_text: text.to_owned(),
                font_size: ((base_size as f64) * (0.1 + 0.9 * progress)) as u32,
                alpha: 255,
            },
            TextEffect::Static => FrameState {
                visible_text: text.to_owned(),
                font_size: base_size,
                alpha: 255,
            },
        };
    }

    if t < e + h {
        return FrameState {
            visible_text: text.to_owned(),
            font_size: base_size,
            alpha: 255,
        };
    }

    let fade_progress = if f > 0.0 {
        ((t - e - h) / f).clamp(0.0, 1.0)
    } else {
        1.0
    };
    FrameState {
        visible_text: text.to_owned(),
        font_size: base_size,
        alpha: (255.0 * (1.0 - fade_progress)).round() as u8,
    }
}
