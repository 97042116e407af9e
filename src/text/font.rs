use std::path::{Path, PathBuf};

use crate::foundation::error::{VidloomError, VidloomResult};
use crate::foundation::math::{Rng64, stable_hash64};

/// RGBA8 brush color used by Parley text layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct TextBrushRgba8 {
    /// Red channel.
    pub(crate) r: u8,
    /// Green channel.
    pub(crate) g: u8,
    /// Blue channel.
    pub(crate) b: u8,
    /// Alpha channel.
    pub(crate) a: u8,
}

/// Where the display font comes from.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FontSpec {
    /// First readable face from the conventional system font locations.
    #[default]
    System,
    /// A specific font file (TTF/OTF/TTC).
    File(PathBuf),
}

/// Conventional font file locations probed for [`FontSpec::System`].
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Deterministic step function mapping text length (in chars) to a display size in pixels.
///
/// Monotonically non-increasing: short captions render huge, long ones shrink to stay
/// readable inside the frame.
pub fn font_size_for_len(chars: usize) -> u32 {
    match chars {
        0..=3 => 350,
        4..=5 => 300,
        6..=10 => 250,
        11..=20 => 200,
        21..=50 => 150,
        51..=100 => 120,
        _ => 100,
    }
}

/// Fallback font colors used when a spec does not pin one.
pub const VIBRANT_PALETTE: [[u8; 3]; 7] = [
    [82, 183, 255],
    [255, 94, 94],
    [94, 255, 114],
    [255, 187, 85],
    [190, 94, 255],
    [255, 94, 219],
    [94, 255, 247],
];

/// Deterministic palette pick seeded from the text itself, so repeated renders of the
/// same caption get the same color.
pub fn vibrant_color_for(text: &str) -> [u8; 3] {
    let mut rng = Rng64::new(stable_hash64(text.as_bytes()));
    let idx = (rng.next_u64() % VIBRANT_PALETTE.len() as u64) as usize;
    VIBRANT_PALETTE[idx]
}

/// Resolved font face plus the shaping contexts reused across frames.
///
/// One library instance is owned by one renderer: constructed together, discarded
/// together. The face is registered with Parley once at construction and the layout
/// context is reused for every frame, so per-frame shaping does not re-register fonts
/// or grow allocations.
pub struct FontLibrary {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    family_name: String,
    font_data: vello_cpu::peniko::FontData,
}

impl std::fmt::Debug for FontLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontLibrary")
            .field("family_name", &self.family_name)
            .finish_non_exhaustive()
    }
}

impl FontLibrary {
    /// Load and register the font selected by `spec`.
    ///
    /// An unreadable font file is a configuration error, surfaced before any rendering.
    pub fn new(spec: &FontSpec) -> VidloomResult<Self> {
        let bytes = match spec {
            FontSpec::File(path) => std::fs::read(path).map_err(|e| {
                VidloomError::config(format!(
                    "font path '{}' is unreadable: {e}",
                    path.display()
                ))
            })?,
            FontSpec::System => read_system_font()?,
        };

        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(bytes.clone()), None);
        let family_id = families
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| VidloomError::config("no font families registered from font bytes"))?;
        let family_name = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| VidloomError::config("registered font family has no name"))?
            .to_string();

        let font_data =
            vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(bytes), 0);

        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family_name,
            font_data,
        })
    }

    /// The registered face in drawable form.
    pub(crate) fn glyph_font(&self) -> &vello_cpu::peniko::FontData {
        &self.font_data
    }

    /// Shape and lay out one line of text at `size_px`.
    pub(crate) fn layout(
        &mut self,
        text: &str,
        size_px: f32,
        brush: TextBrushRgba8,
    ) -> VidloomResult<parley::Layout<TextBrushRgba8>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(VidloomError::render("text size_px must be finite and > 0"));
        }

        let family_name = self.family_name.clone();
        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family_name)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }

    /// Rendered advance width of `text` at `size_px`, used as the wrap budget measure.
    pub(crate) fn measure_width(&mut self, text: &str, size_px: f32) -> VidloomResult<f32> {
        Ok(self.layout(text, size_px, TextBrushRgba8::default())?.width())
    }
}

fn read_system_font() -> VidloomResult<Vec<u8>> {
    for candidate in SYSTEM_FONT_CANDIDATES {
        let p = Path::new(candidate);
        if p.is_file()
            && let Ok(bytes) = std::fs::read(p)
        {
            return Ok(bytes);
        }
    }
    Err(VidloomError::config(
        "no usable system font found; pass an explicit font file",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_steps_are_monotonic_and_match_breakpoints() {
        assert_eq!(font_size_for_len(0), 350);
        assert_eq!(font_size_for_len(3), 350);
        assert_eq!(font_size_for_len(4), 300);
        assert_eq!(font_size_for_len(5), 300);
        assert_eq!(font_size_for_len(10), 250);
        assert_eq!(font_size_for_len(20), 200);
        assert_eq!(font_size_for_len(50), 150);
        assert_eq!(font_size_for_len(100), 120);
        assert_eq!(font_size_for_len(101), 100);

        let mut last = u32::MAX;
        for n in 0..200 {
            let s = font_size_for_len(n);
            assert!(s <= last);
            last = s;
        }
    }

    #[test]
    fn vibrant_pick_is_deterministic_and_in_palette() {
        let a = vibrant_color_for("hello world");
        let b = vibrant_color_for("hello world");
        assert_eq!(a, b);
        assert!(VIBRANT_PALETTE.contains(&a));
    }

    #[test]
    fn unreadable_font_file_is_a_config_error() {
        let err = FontLibrary::new(&FontSpec::File(PathBuf::from(
            "/definitely/not/a/real/font.ttf",
        )))
        .unwrap_err();
        assert!(err.to_string().contains("configuration error"));
    }

    #[test]
    fn measurement_grows_with_text() {
        // Needs a real system font; skip quietly on hosts without one.
        let Ok(mut lib) = FontLibrary::new(&FontSpec::System) else {
            return;
        };
        let one = lib.measure_width("a", 100.0).unwrap();
        let two = lib.measure_width("ab", 100.0).unwrap();
        assert!(one > 0.0);
        assert!(two > one);
    }
}
