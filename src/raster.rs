//! Painting of laid-out pages onto a tiny-skia pixmap, and the raster image
//! type handed to PDF assembly.

use std::collections::HashMap;
use std::io::Cursor;

use image::{imageops, DynamicImage, RgbaImage};
use tiny_skia::{
    BlendMode, ColorU8, FillRule, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Transform,
};

use crate::error::RenderError;
use crate::fonts::FontManager;
use crate::layout::{BoxContent, PageLayout, TextLine};
use crate::page::Watermark;
use crate::style::{Color, Edges, TextStyle};

/// A rendered page: straight (non-premultiplied) RGBA, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl RasterImage {
    /// A uniformly coloured image; mostly useful for tests and stand-in renderers.
    pub fn filled(width: u32, height: u32, color: [u8; 4]) -> Self {
        let rgba = color
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            rgba,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.rgba.get(i..i + 4).map(|p| [p[0], p[1], p[2], p[3]])
    }

    /// Encode as an opaque RGB PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, RenderError> {
        let rgba = RgbaImage::from_raw(self.width, self.height, self.rgba.clone()).ok_or_else(|| {
            RenderError::Encode(format!(
                "{} bytes do not describe a {}x{} RGBA image",
                self.rgba.len(),
                self.width,
                self.height
            ))
        })?;
        let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();
        let mut out = Cursor::new(Vec::new());
        rgb.write_to(&mut out, image::ImageFormat::Png)
            .map_err(|e| RenderError::Encode(e.to_string()))?;
        Ok(out.into_inner())
    }

    pub(crate) fn from_pixmap(pixmap: &Pixmap) -> Self {
        let rgba = pixmap
            .pixels()
            .iter()
            .flat_map(|p| {
                let c = p.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();
        Self {
            width: pixmap.width(),
            height: pixmap.height(),
            rgba,
        }
    }
}

/// Paints one page layout. `scale` converts CSS px to device px.
pub(crate) struct Painter<'a> {
    pub pixmap: &'a mut Pixmap,
    pub scale: f32,
    pub fonts: &'a FontManager,
    pub images: &'a HashMap<String, RgbaImage>,
}

impl Painter<'_> {
    pub fn paint(&mut self, layout: &PageLayout) {
        self.pixmap.fill(tiny_skia::Color::WHITE);
        for b in &layout.boxes {
            match &b.content {
                BoxContent::Decoration {
                    background,
                    border,
                    border_color,
                } => {
                    self.fill_rect(b.x, b.y, b.width, b.height, *background);
                    self.stroke_edges(b.x, b.y, b.width, b.height, border, *border_color);
                }
                BoxContent::Text { lines, style } => {
                    for line in lines {
                        self.draw_line(b.x, b.y, line, style);
                    }
                }
                BoxContent::Image { resource } => match self.images.get(resource) {
                    Some(img) => self.draw_contained(
                        img,
                        b.x,
                        b.y,
                        b.width,
                        b.height,
                        1.0,
                        BlendMode::SourceOver,
                    ),
                    None => log::warn!("image '{resource}' was not settled; skipped"),
                },
            }
        }
    }

    /// Centered overlay at a fraction of the page width.
    pub fn paint_watermark(&mut self, layout: &PageLayout, mark: &Watermark, image: &RgbaImage) {
        if image.width() == 0 || image.height() == 0 || mark.opacity <= 0.0 {
            return;
        }
        let width = layout.width * mark.width_fraction;
        let height = width * image.height() as f32 / image.width() as f32;
        let x = (layout.width - width) / 2.0;
        let y = (layout.height - height) / 2.0;

        let source = if mark.grayscale {
            DynamicImage::ImageRgba8(image.clone()).grayscale().to_rgba8()
        } else {
            image.clone()
        };
        self.draw_contained(&source, x, y, width, height, mark.opacity, BlendMode::Multiply);
    }

    fn device_rect(&self, x: f32, y: f32, w: f32, h: f32) -> Option<Rect> {
        if w <= 0.0 || h <= 0.0 {
            return None;
        }
        let k = self.scale;
        Rect::from_xywh(x * k, y * k, w * k, h * k)
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        if color.is_transparent() {
            return;
        }
        let Some(rect) = self.device_rect(x, y, w, h) else {
            return;
        };
        let mut paint = Paint::default();
        let [r, g, b, a] = color.to_rgba8();
        paint.set_color_rgba8(r, g, b, a);
        self.pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    }

    fn stroke_edges(&mut self, x: f32, y: f32, w: f32, h: f32, e: &Edges, color: Color) {
        if e.is_zero() {
            return;
        }
        self.fill_rect(x, y, w, e.top, color);
        self.fill_rect(x, y + h - e.bottom, w, e.bottom, color);
        self.fill_rect(x, y + e.top, e.left, h - e.top - e.bottom, color);
        self.fill_rect(x + w - e.right, y + e.top, e.right, h - e.top - e.bottom, color);
    }

    fn draw_line(&mut self, box_x: f32, box_y: f32, line: &TextLine, style: &TextStyle) {
        if line.text.is_empty() || style.color.is_transparent() {
            return;
        }
        let bold = style.is_bold();
        let line_h = self.fonts.line_height_px(style.font_size, style.line_height);
        let top = box_y + line.y_offset + (line_h - style.font_size) / 2.0;
        let x = box_x + line.x_offset;

        let mut paint = Paint::default();
        let [r, g, b, a] = style.color.to_rgba8();
        paint.set_color_rgba8(r, g, b, a);

        match self.fonts.face_data(bold) {
            Some(data) => {
                let Some(face) = data.face() else {
                    return self.greek(x, top, &line.text, style, paint);
                };
                let baseline = top + self.fonts.ascender_px(style.font_size, bold);
                let k = self.scale;
                let s = style.font_size / data.units_per_em * k;
                let skew = if style.italic { 0.2 * s } else { 0.0 };
                let mut pen = x;
                for ch in line.text.chars() {
                    let Some(gid) = face.glyph_index(ch) else {
                        pen += style.font_size * 0.5;
                        continue;
                    };
                    let mut outline = GlyphPath(PathBuilder::new());
                    if face.outline_glyph(gid, &mut outline).is_some() {
                        if let Some(path) = outline.0.finish() {
                            let transform =
                                Transform::from_row(s, 0.0, skew, -s, pen * k, baseline * k);
                            self.pixmap
                                .fill_path(&path, &paint, FillRule::Winding, transform, None);
                        }
                    }
                    pen += face.glyph_hor_advance(gid).unwrap_or(0) as f32 * s / k;
                }
            }
            None => self.greek(x, top, &line.text, style, paint),
        }
    }

    /// Flat bars standing in for words when no glyph outlines are available.
    fn greek(&mut self, x: f32, top: f32, text: &str, style: &TextStyle, mut paint: Paint<'_>) {
        let bold = style.is_bold();
        let bar_h = style.font_size * if bold { 0.55 } else { 0.45 };
        let y = top + (style.font_size - bar_h) / 2.0;
        let space = self.fonts.measure_text_width(" ", style.font_size, bold);
        let [r, g, b, a] = style.color.to_rgba8();
        paint.set_color_rgba8(r, g, b, (a as f32 * 0.6) as u8);

        let mut pen = x;
        for word in text.split(' ') {
            let w = self.fonts.measure_text_width(word, style.font_size, bold);
            if let Some(rect) = self.device_rect(pen, y, w, bar_h) {
                self.pixmap.fill_rect(rect, &paint, Transform::identity(), None);
            }
            pen += w + space;
        }
    }

    /// Draw `image` scaled to fit inside the box, centered, aspect preserved.
    #[allow(clippy::too_many_arguments)]
    fn draw_contained(
        &mut self,
        image: &RgbaImage,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        opacity: f32,
        blend_mode: BlendMode,
    ) {
        let (iw, ih) = (image.width() as f32, image.height() as f32);
        if iw == 0.0 || ih == 0.0 || w <= 0.0 || h <= 0.0 {
            return;
        }
        let fit = (w / iw).min(h / ih);
        let (dw, dh) = (iw * fit, ih * fit);
        let (dx, dy) = (x + (w - dw) / 2.0, y + (h - dh) / 2.0);

        let k = self.scale;
        let target_w = (dw * k).round().max(1.0) as u32;
        let target_h = (dh * k).round().max(1.0) as u32;
        let resized = imageops::resize(image, target_w, target_h, imageops::FilterType::Triangle);
        let Some(pixmap) = to_pixmap(&resized) else {
            return;
        };

        let paint = PixmapPaint {
            opacity: opacity.clamp(0.0, 1.0),
            blend_mode,
            ..PixmapPaint::default()
        };
        self.pixmap.draw_pixmap(
            (dx * k).round() as i32,
            (dy * k).round() as i32,
            pixmap.as_ref(),
            &paint,
            Transform::identity(),
            None,
        );
    }
}

fn to_pixmap(image: &RgbaImage) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(image.width(), image.height())?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Some(pixmap)
}

/// Adapts tiny-skia's path builder to ttf-parser's outline callbacks.
struct GlyphPath(PathBuilder);

impl ttf_parser::OutlineBuilder for GlyphPath {
    fn move_to(&mut self, x: f32, y: f32) {
        self.0.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.0.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.0.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.0.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.0.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filled_image_and_png() {
        let img = RasterImage::filled(3, 2, [10, 20, 30, 255]);
        assert_eq!(img.rgba.len(), 24);
        assert_eq!(img.pixel(2, 1), Some([10, 20, 30, 255]));
        assert_eq!(img.pixel(3, 0), None);
        let png = img.to_png().unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }

    #[test]
    fn mismatched_buffer_is_an_encode_error() {
        let img = RasterImage {
            width: 4,
            height: 4,
            rgba: vec![0; 3],
        };
        assert!(matches!(img.to_png(), Err(RenderError::Encode(_))));
    }

    #[test]
    fn pixmap_snapshot_is_straight_alpha() {
        let mut pixmap = Pixmap::new(2, 2).unwrap();
        pixmap.fill(tiny_skia::Color::from_rgba8(200, 100, 50, 255));
        let img = RasterImage::from_pixmap(&pixmap);
        assert_eq!(img.pixel(1, 1), Some([200, 100, 50, 255]));
    }
}
