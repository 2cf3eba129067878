//! Single-document export: compose, render, fit, assemble.

use crate::compose::{compose, MarksheetInputs};
use crate::document::PdfAssembler;
use crate::error::ExportError;
use crate::fit::fit_to_page;
use crate::raster::RasterImage;
use crate::renderer::Renderer;

/// A finished PDF, not yet written anywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

pub fn single_file_name(student_name: &str) -> String {
    format!("{student_name}_Marksheet.pdf")
}

/// `index` is zero-based.
pub fn batch_file_name(class_name: &str, index: usize, total: usize) -> String {
    format!("{class_name}_Batch_{}_of_{total}.pdf", index + 1)
}

/// Compose and render one student's page.
pub(crate) fn render_student<R: Renderer + ?Sized>(
    renderer: &mut R,
    inputs: &MarksheetInputs<'_>,
) -> Result<RasterImage, ExportError> {
    let page = compose(inputs);
    renderer.render(&page).map_err(|source| ExportError::Render {
        student_id: inputs.student.id.clone(),
        student_name: inputs.student.name.clone(),
        source,
    })
}

/// Fit `image` onto the assembler's current page.
pub(crate) fn place(pdf: &mut PdfAssembler, image: &RasterImage) -> Result<(), ExportError> {
    let placement = fit_to_page(image.width as f32, image.height as f32, pdf.page_size());
    pdf.place_image(image, &placement)
}

/// Export one student's marksheet as a one-page PDF.
///
/// Nothing is produced when rendering fails.
pub fn export_one<R: Renderer + ?Sized>(
    renderer: &mut R,
    inputs: &MarksheetInputs<'_>,
    title: &str,
) -> Result<OutputFile, ExportError> {
    let image = render_student(renderer, inputs)?;
    let mut pdf = PdfAssembler::new(title, inputs.orientation.page_size());
    place(&mut pdf, &image)?;
    let page_count = pdf.page_count();
    let name = single_file_name(&inputs.student.name);
    log::info!("exported '{name}'");
    Ok(OutputFile {
        name,
        bytes: pdf.finish(),
        page_count,
    })
}
