//! The rendering seam: page description in, raster image out.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use image::RgbaImage;
use tiny_skia::Pixmap;

use crate::error::RenderError;
use crate::fonts::FontManager;
use crate::layout::compute_layout;
use crate::page::{MarksheetPage, PX_PER_MM};
use crate::raster::{Painter, RasterImage};

/// Turns a page description into pixels.
///
/// `render` takes `&mut self`: a renderer owns its drawing surface and no two
/// renders can share it at the same time.
pub trait Renderer {
    fn render(&mut self, page: &MarksheetPage) -> Result<RasterImage, RenderError>;
}

impl<R: Renderer + ?Sized> Renderer for &mut R {
    fn render(&mut self, page: &MarksheetPage) -> Result<RasterImage, RenderError> {
        (**self).render(page)
    }
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&mut self, page: &MarksheetPage) -> Result<RasterImage, RenderError> {
        (**self).render(page)
    }
}

/// Default supersampling factor.
pub const DEFAULT_SUPERSAMPLE: f32 = 2.0;

/// A pixmap kept between renders and reallocated only when the page size
/// changes.
#[derive(Default)]
pub struct RenderSurface {
    pixmap: Option<Pixmap>,
}

impl RenderSurface {
    fn acquire(&mut self, width: u32, height: u32) -> Result<&mut Pixmap, RenderError> {
        let reusable =
            matches!(&self.pixmap, Some(p) if p.width() == width && p.height() == height);
        if !reusable {
            log::debug!("allocating {width}x{height} render surface");
            self.pixmap = None;
            let pixmap =
                Pixmap::new(width, height).ok_or(RenderError::Surface { width, height })?;
            self.pixmap = Some(pixmap);
        }
        self.pixmap
            .as_mut()
            .ok_or(RenderError::Surface { width, height })
    }

    /// Dimensions of the currently held surface.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.pixmap.as_ref().map(|p| (p.width(), p.height()))
    }
}

/// The shipped renderer: taffy layout, tiny-skia painting.
pub struct RasterRenderer {
    fonts: FontManager,
    supersample: f32,
    surface: RenderSurface,
}

impl RasterRenderer {
    pub fn new(fonts: FontManager) -> Self {
        Self::with_supersample(fonts, DEFAULT_SUPERSAMPLE)
    }

    /// Non-positive or non-finite factors fall back to 1.
    pub fn with_supersample(fonts: FontManager, supersample: f32) -> Self {
        if !fonts.has_real_fonts() {
            log::warn!("no font loaded; text will be drawn as greeked bars");
        }
        let supersample = if supersample.is_finite() && supersample > 0.0 {
            supersample
        } else {
            1.0
        };
        Self {
            fonts,
            supersample,
            surface: RenderSurface::default(),
        }
    }

    pub fn supersample(&self) -> f32 {
        self.supersample
    }

    pub fn fonts(&self) -> &FontManager {
        &self.fonts
    }

    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    /// Device pixels per millimetre.
    pub fn pixels_per_mm(&self) -> f32 {
        PX_PER_MM * self.supersample
    }
}

/// Resolve every resource the page references into decoded pixels. Nothing
/// is painted until this succeeds.
pub fn settle(page: &MarksheetPage) -> Result<HashMap<String, RgbaImage>, RenderError> {
    let mut images = HashMap::new();
    for name in page.referenced_resources() {
        let uri = page
            .resources
            .get(name)
            .ok_or_else(|| RenderError::MissingResource(name.to_string()))?;
        let bytes = parse_data_uri(uri).map_err(|reason| RenderError::Resource {
            name: name.to_string(),
            reason,
        })?;
        let decoded = image::load_from_memory(&bytes).map_err(|e| RenderError::Resource {
            name: name.to_string(),
            reason: format!("decode error: {e}"),
        })?;
        images.insert(name.to_string(), decoded.to_rgba8());
    }
    Ok(images)
}

impl Renderer for RasterRenderer {
    fn render(&mut self, page: &MarksheetPage) -> Result<RasterImage, RenderError> {
        let images = settle(page)?;
        log::debug!("settled {} resource(s)", images.len());

        let layout = compute_layout(page, &self.fonts)?;

        let scale = self.supersample;
        let width = (layout.width * scale).round() as u32;
        let height = (layout.height * scale).round() as u32;
        let pixmap = self.surface.acquire(width, height)?;

        let mut painter = Painter {
            pixmap,
            scale,
            fonts: &self.fonts,
            images: &images,
        };
        painter.paint(&layout);
        if let Some(mark) = &page.watermark {
            if let Some(logo) = images.get(&mark.resource) {
                painter.paint_watermark(&layout, mark, logo);
            }
        }
        log::debug!("painted {width}x{height} px");

        Ok(RasterImage::from_pixmap(painter.pixmap))
    }
}

/// Parse a `data:<mime>;base64,<data>` URI and return the raw decoded bytes.
///
/// Returns `Err` if `src` is not a data URI or does not use base64 encoding.
pub fn parse_data_uri(src: &str) -> Result<Vec<u8>, String> {
    let rest = src.strip_prefix("data:").ok_or_else(|| {
        let preview: String = src.chars().take(40).collect();
        format!("expected a base64 data URI, got {preview:?}")
    })?;
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| "invalid data URI: missing `,` separator".to_string())?;
    if !header.contains(";base64") {
        return Err("only base64-encoded data URIs are supported".to_string());
    }
    BASE64_STD
        .decode(data.trim())
        .map_err(|e| format!("base64 decode error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_parsing() {
        assert_eq!(parse_data_uri("data:text/plain;base64,aGk=").unwrap(), b"hi");
        assert!(parse_data_uri("https://example.com/logo.png").is_err());
        assert!(parse_data_uri("data:image/png,raw").is_err());
        assert!(parse_data_uri("data:image/png;base64").is_err());
        assert!(parse_data_uri("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn surface_is_reused_for_equal_sizes() {
        let mut surface = RenderSurface::default();
        assert_eq!(surface.size(), None);
        surface.acquire(4, 3).unwrap();
        let first = surface.pixmap.as_ref().unwrap().data().as_ptr();
        surface.acquire(4, 3).unwrap();
        assert_eq!(surface.pixmap.as_ref().unwrap().data().as_ptr(), first);
        surface.acquire(5, 3).unwrap();
        assert_eq!(surface.size(), Some((5, 3)));
        assert!(matches!(
            surface.acquire(0, 0),
            Err(RenderError::Surface { width: 0, height: 0 })
        ));
    }
}
