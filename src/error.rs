//! Error types for every pipeline stage.
//!
//! Data-completeness gaps (missing marks, blank info fields) and malformed
//! theme values never reach these types; they are recovered where they are
//! read. What remains are failures a caller has to act on.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A class configuration that breaks one of its structural invariants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("class '{class}' declares subject id '{subject_id}' more than once")]
    DuplicateSubject { class: String, subject_id: String },
    #[error("subject '{subject_id}' in class '{class}' declares exam id '{exam_id}' more than once")]
    DuplicateExam {
        class: String,
        subject_id: String,
        exam_id: String,
    },
    #[error("exam '{exam_id}' of subject '{subject_id}' has non-positive max marks {max_marks}")]
    NonPositiveMaxMarks {
        subject_id: String,
        exam_id: String,
        max_marks: f64,
    },
    #[error("class '{class}' has pass percentage {value} outside 0..=100")]
    PassPercentageOutOfRange { class: String, value: f64 },
}

/// Failure to load the persisted records or the export settings.
#[derive(Error, Debug)]
pub enum RecordsError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no class matches '{0}'")]
    UnknownClass(String),
    #[error("no student with id '{0}'")]
    UnknownStudent(String),
    #[error("student '{student_id}' is linked to class '{class}', which does not exist")]
    DanglingClassLink { student_id: String, class: String },
}

/// A page description could not be turned into a raster image.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("page references resource '{0}' that was never supplied")]
    MissingResource(String),
    #[error("resource '{name}' could not be loaded: {reason}")]
    Resource { name: String, reason: String },
    #[error("layout failed: {0}")]
    Layout(String),
    #[error("render surface of {width}x{height} px could not be allocated")]
    Surface { width: u32, height: u32 },
    #[error("raster encoding failed: {0}")]
    Encode(String),
    #[error("font could not be parsed: {0}")]
    Font(String),
}

impl From<taffy::TaffyError> for RenderError {
    fn from(err: taffy::TaffyError) -> Self {
        RenderError::Layout(err.to_string())
    }
}

/// Producing one output file failed.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("rendering the marksheet of '{student_name}' ({student_id}) failed: {source}")]
    Render {
        student_id: String,
        student_name: String,
        #[source]
        source: RenderError,
    },
    #[error("PDF assembly failed: {0}")]
    Pdf(String),
    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A batch request that is rejected before any student is processed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("no students selected")]
    NoStudents,
    #[error("batch size {size} is outside 1..={max}")]
    BatchSizeOutOfRange { size: usize, max: usize },
    #[error("student '{student_id}' does not belong to class '{class}'")]
    ForeignStudent { student_id: String, class: String },
}

/// Terminal failure of a batch job.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("invalid batch request: {0}")]
    InvalidJob(#[from] JobError),
    #[error("{message} (batch {batch} of {total_batches}, {files_saved} file(s) already saved)")]
    Aborted {
        message: String,
        batch: usize,
        total_batches: usize,
        files_saved: usize,
        #[source]
        source: ExportError,
    },
}
