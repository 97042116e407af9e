use crate::foundation::core::{Canvas, FrameRGBA};
use crate::foundation::error::{VidloomError, VidloomResult};
use crate::text::anim::{FrameState, TextAlign, VAlign};
use crate::text::font::{FontLibrary, FontSpec, TextBrushRgba8};
use crate::text::wrap::wrap_words;

/// Fraction of the frame width reserved as margin on each side of the text.
const H_MARGIN_FRAC: f64 = 0.1;
/// Fraction of the frame height used as the top/bottom alignment offset.
const V_MARGIN_FRAC: f64 = 0.1;

/// Rasterizes caption frames: background fill plus wrapped, aligned, alpha-blended text.
///
/// Owns the font library and a reusable pixmap; construct one per clip encode and drop it
/// with the encode. Output frames are premultiplied RGBA8 at the canvas size.
pub struct TextFrameRenderer {
    canvas: Canvas,
    width_u16: u16,
    height_u16: u16,
    fonts: FontLibrary,
    pixmap: vello_cpu::Pixmap,
}

impl TextFrameRenderer {
    /// Create a renderer for `canvas` using the font selected by `font`.
    pub fn new(canvas: Canvas, font: &FontSpec) -> VidloomResult<Self> {
        let width_u16: u16 = canvas
            .width
            .try_into()
            .map_err(|_| VidloomError::config("canvas width exceeds u16"))?;
        let height_u16: u16 = canvas
            .height
            .try_into()
            .map_err(|_| VidloomError::config("canvas height exceeds u16"))?;
        if width_u16 == 0 || height_u16 == 0 {
            return Err(VidloomError::config("canvas dimensions must be non-zero"));
        }

        Ok(Self {
            canvas,
            width_u16,
            height_u16,
            fonts: FontLibrary::new(font)?,
            pixmap: vello_cpu::Pixmap::new(width_u16, height_u16),
        })
    }

    /// Canvas this renderer draws at.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Draw one frame: `bg_color` fill, then `state.visible_text` wrapped to the margin
    /// budget and placed per `align`/`v_align` at `state.alpha`.
    ///
    /// Blank text (after trimming), a zero font size, or zero alpha yield the plain
    /// background frame.
    pub fn render(
        &mut self,
        bg_color: [u8; 3],
        font_color: [u8; 3],
        state: &FrameState,
        align: TextAlign,
        v_align: VAlign,
    ) -> VidloomResult<FrameRGBA> {
        clear_pixmap(&mut self.pixmap, [bg_color[0], bg_color[1], bg_color[2], 255]);

        let text = state.visible_text.trim();
        if text.is_empty() || state.font_size == 0 || state.alpha == 0 {
            return Ok(self.readback());
        }

        let size_px = state.font_size as f32;
        let max_text_width = (self.canvas.width as f64 * (1.0 - 2.0 * H_MARGIN_FRAC)) as f32;

        let fonts = &mut self.fonts;
        let lines = wrap_words(text, max_text_width, |candidate| {
            fonts
                .measure_width(candidate, size_px)
                .unwrap_or(f32::INFINITY)
        });

        let brush = TextBrushRgba8 {
            r: font_color[0],
            g: font_color[1],
            b: font_color[2],
            a: 255,
        };
        let mut layouts = Vec::with_capacity(lines.len());
        for line in &lines {
            layouts.push(self.fonts.layout(line, size_px, brush)?);
        }

        let block_height: f64 = layouts.iter().map(|l| f64::from(l.height())).sum();
        let frame_w = self.canvas.width as f64;
        let frame_h = self.canvas.height as f64;
        let mut y = match v_align {
            VAlign::Top => frame_h * V_MARGIN_FRAC,
            VAlign::Middle => (frame_h - block_height) / 2.0,
            VAlign::Bottom => frame_h - block_height - frame_h * V_MARGIN_FRAC,
        };

        let mut ctx = vello_cpu::RenderContext::new(self.width_u16, self.height_u16);
        let opacity = f32::from(state.alpha) / 255.0;
        if opacity < 1.0 {
            ctx.push_opacity_layer(opacity);
        }

        let font = self.fonts.glyph_font().clone();
        for layout in &layouts {
            let line_width = f64::from(layout.width());
            let x = match align {
                TextAlign::Left => frame_w * H_MARGIN_FRAC,
                TextAlign::Center => (frame_w - line_width) / 2.0,
                TextAlign::Right => frame_w - line_width - frame_w * H_MARGIN_FRAC,
            };
            ctx.set_transform(vello_cpu::kurbo::Affine::translate((x, y)));

            for line in layout.lines() {
                for item in line.items() {
                    let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                        continue;
                    };

                    let run_brush = run.style().brush;
                    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                        run_brush.r,
                        run_brush.g,
                        run_brush.b,
                        run_brush.a,
                    ));

                    let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                        id: g.id,
                        x: g.x,
                        y: g.y,
                    });
                    ctx.glyph_run(&font)
                        .font_size(run.run().font_size())
                        .fill_glyphs(glyphs);
                }
            }

            y += f64::from(layout.height());
        }

        if opacity < 1.0 {
            ctx.pop_layer();
        }
        ctx.flush();
        ctx.render_to_pixmap(&mut self.pixmap);

        Ok(self.readback())
    }

    fn readback(&self) -> FrameRGBA {
        FrameRGBA {
            width: self.canvas.width,
            height: self.canvas.height,
            data: self.pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        }
    }
}

pub(crate) fn clear_pixmap(pixmap: &mut vello_cpu::Pixmap, rgba: [u8; 4]) {
    let data = pixmap.data_as_u8_slice_mut();
    for px in data.chunks_exact_mut(4) {
        px.copy_from_slice(&rgba);
    }
}
