//! Page fitting: place a raster image on a fixed-size page without distortion.

use crate::model::Orientation;

/// Physical page size in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub const A4_PORTRAIT: Self = Self {
        width: 210.0,
        height: 297.0,
    };
    pub const A4_LANDSCAPE: Self = Self {
        width: 297.0,
        height: 210.0,
    };
}

impl Orientation {
    /// The A4 page for this orientation.
    pub fn page_size(self) -> PageSize {
        match self {
            Orientation::Portrait => PageSize::A4_PORTRAIT,
            Orientation::Landscape => PageSize::A4_LANDSCAPE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitMode {
    /// Full page width; the image is no taller than the page.
    Width,
    /// Full page height, centered horizontally.
    Height,
}

/// Where the image goes on the page, in millimetres from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub mode: FitMode,
}

/// Fit an image of `image_width` × `image_height` px onto `page`.
///
/// Both pixel dimensions must be positive.
pub fn fit_to_page(image_width: f32, image_height: f32, page: PageSize) -> Placement {
    let scaled_height = image_height * page.width / image_width;
    if scaled_height <= page.height {
        Placement {
            x: 0.0,
            y: 0.0,
            width: page.width,
            height: scaled_height,
            mode: FitMode::Width,
        }
    } else {
        let scaled_width = image_width * page.height / image_height;
        Placement {
            x: (page.width - scaled_width) / 2.0,
            y: 0.0,
            width: scaled_width,
            height: page.height,
            mode: FitMode::Height,
        }
    }
}
