//! PDF assembly – page images placed onto A4 pages using `printpdf`
//! (v0.8 ops-based API).

use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, XObjectTransform,
};

use crate::error::ExportError;
use crate::fit::{PageSize, Placement};
use crate::raster::RasterImage;

const PT_PER_MM: f32 = 72.0 / 25.4;

/// Builds a PDF one page at a time. A new document starts with one empty page.
pub struct PdfAssembler {
    doc: PdfDocument,
    page_size: PageSize,
    pages: Vec<Vec<Op>>,
}

impl PdfAssembler {
    pub fn new(title: &str, page_size: PageSize) -> Self {
        Self {
            doc: PdfDocument::new(title),
            page_size,
            pages: vec![Vec::new()],
        }
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn add_page(&mut self) {
        self.pages.push(Vec::new());
    }

    /// Embed `image` on the current (last) page at `placement`.
    pub fn place_image(
        &mut self,
        image: &RasterImage,
        placement: &Placement,
    ) -> Result<(), ExportError> {
        if image.width == 0 || image.height == 0 {
            return Err(ExportError::Pdf("cannot place an empty image".to_string()));
        }
        let png = image
            .to_png()
            .map_err(|e| ExportError::Pdf(e.to_string()))?;
        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let raw = RawImage::decode_from_bytes(&png, &mut warnings).map_err(ExportError::Pdf)?;
        if !warnings.is_empty() {
            log::debug!("image embed produced {} warning(s)", warnings.len());
        }
        let id = self.doc.add_image(&raw);

        // PDF origin is bottom-left; placements are measured from the top.
        let page_height_pt = self.page_size.height * PT_PER_MM;
        let bottom_pt = page_height_pt - (placement.y + placement.height) * PT_PER_MM;
        // At dpi=72 printpdf renders 1 px = 1 pt, so scale = desired_pt / px.
        let scale_x = placement.width * PT_PER_MM / image.width as f32;
        let scale_y = placement.height * PT_PER_MM / image.height as f32;

        let op = Op::UseXobject {
            id,
            transform: XObjectTransform {
                translate_x: Some(Pt(placement.x * PT_PER_MM)),
                translate_y: Some(Pt(bottom_pt)),
                dpi: Some(72.0),
                scale_x: Some(scale_x),
                scale_y: Some(scale_y),
                rotate: None,
            },
        };
        match self.pages.last_mut() {
            Some(ops) => ops.push(op),
            None => self.pages.push(vec![op]),
        }
        Ok(())
    }

    /// Serialise the document.
    pub fn finish(mut self) -> Vec<u8> {
        let (w, h) = (Mm(self.page_size.width), Mm(self.page_size.height));
        let pages = self
            .pages
            .drain(..)
            .map(|ops| PdfPage::new(w, h, ops))
            .collect();
        self.doc.with_pages(pages);
        let mut warnings = Vec::new();
        let bytes = self.doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            log::debug!("PDF save produced {} warning(s)", warnings.len());
        }
        bytes
    }
}
