//! # marksheet-forge – school marksheets as print-ready PDFs
//!
//! Turns persisted academic records into one-page A4 marksheets, one student
//! at a time or a whole class in fixed-size batches. The pipeline stages are:
//!
//! 1. **Aggregate** – marks → totals, percentage, grades, outcome ([`grading`])
//! 2. **Compose** – records + result + theme → page description ([`compose`], [`page`])
//! 3. **Render** – page description → raster image ([`renderer`], [`layout`], [`raster`])
//! 4. **Fit** – raster image → placement on an A4 page ([`fit`])
//! 5. **Assemble** – placements → PDF bytes via printpdf ([`document`])
//!
//! [`export`] drives a single student through every stage; [`batch`] does the
//! same for many students and reports progress along the way.

pub mod batch;
pub mod compose;
pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod fit;
pub mod fonts;
pub mod grading;
pub mod layout;
pub mod model;
pub mod page;
pub mod raster;
pub mod records;
pub mod renderer;
pub mod samples;
pub mod style;
pub mod theme;

// Re-exports for convenience
pub use batch::{
    export_batch, BatchExporter, BatchJob, BatchState, BatchSummary, DirectorySink, NoProgress,
    OutputSink, ProgressObserver, ProgressUpdate,
};
pub use compose::{compose, MarksheetInputs};
pub use config::ExportSettings;
pub use error::{BatchError, ConfigError, ExportError, JobError, RecordsError, RenderError};
pub use export::{export_one, OutputFile};
pub use fit::{fit_to_page, PageSize, Placement};
pub use fonts::FontManager;
pub use grading::{aggregate, DerivedResult, Grade, Outcome};
pub use model::{ClassConfig, Orientation, SchoolInfo, Student};
pub use page::MarksheetPage;
pub use raster::RasterImage;
pub use records::{ClassDirectory, Records};
pub use renderer::{RasterRenderer, Renderer};
pub use theme::ThemeConfig;
