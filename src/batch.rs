//! Batch export: many students, partitioned into fixed-size groups, one PDF
//! per group.
//!
//! The exporter is a small state machine driven strictly in input order:
//!
//! ```text
//! Idle → Initializing → ProcessingBatch(i) → ProcessingStudent(j)* → SavingBatchFile(i)
//!                        ↑                                                   │
//!                        └─────────────── next batch ───────────────────────┘
//!                                                                    → Done | Failed
//! ```
//!
//! The first failing student aborts the whole job. Files already handed to the
//! sink stay where they are; there is no retry and no resume.

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::compose::MarksheetInputs;
use crate::config::ExportSettings;
use crate::document::PdfAssembler;
use crate::error::{BatchError, ExportError, JobError};
use crate::export::{batch_file_name, place, render_student, OutputFile};
use crate::model::{ClassConfig, Orientation, SchoolInfo, Student};
use crate::renderer::Renderer;
use crate::theme::ThemeConfig;

pub const MSG_INITIALIZING: &str = "Initializing PDF engine...";
pub const MSG_DONE: &str = "All files generated successfully!";
pub const MSG_FAILED: &str = "Error during generation. Please try a smaller batch size.";

/// What to export.
#[derive(Debug, Clone)]
pub struct BatchJob<'a> {
    /// In output order.
    pub students: Vec<&'a Student>,
    pub class: &'a ClassConfig,
    pub school: &'a SchoolInfo,
    pub theme: &'a ThemeConfig,
    pub orientation: Orientation,
    pub batch_size: usize,
    pub font_size: f32,
}

impl BatchJob<'_> {
    /// Reject the job before any work is done.
    pub fn validate(&self, max_batch_size: usize) -> Result<(), JobError> {
        if self.students.is_empty() {
            return Err(JobError::NoStudents);
        }
        if self.batch_size == 0 || self.batch_size > max_batch_size {
            return Err(JobError::BatchSizeOutOfRange {
                size: self.batch_size,
                max: max_batch_size,
            });
        }
        if let Some(student) = self.students.iter().find(|s| !s.belongs_to(self.class)) {
            return Err(JobError::ForeignStudent {
                student_id: student.id.clone(),
                class: self.class.class_name.clone(),
            });
        }
        Ok(())
    }
}

/// Contiguous groups of at most `size` items, in order.
pub fn plan_batches(count: usize, size: usize) -> Vec<Range<usize>> {
    if size == 0 {
        return Vec::new();
    }
    (0..count)
        .step_by(size)
        .map(|start| start..(start + size).min(count))
        .collect()
}

/// Batch and student indices are zero-based; `student` indexes the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Initializing,
    ProcessingBatch { batch: usize, total: usize },
    ProcessingStudent { batch: usize, student: usize },
    SavingBatchFile { batch: usize, total: usize },
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// 0..=100; reaches 100 only once every student is placed.
    pub percent: u8,
    pub message: String,
    pub state: BatchState,
}

pub trait ProgressObserver {
    fn on_progress(&mut self, update: &ProgressUpdate);
}

impl<F: FnMut(&ProgressUpdate)> ProgressObserver for F {
    fn on_progress(&mut self, update: &ProgressUpdate) {
        self(update)
    }
}

/// Discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _update: &ProgressUpdate) {}
}

/// Receives each batch file as soon as it is complete.
pub trait OutputSink {
    fn accept(&mut self, file: OutputFile) -> Result<(), ExportError>;
}

impl OutputSink for Vec<OutputFile> {
    fn accept(&mut self, file: OutputFile) -> Result<(), ExportError> {
        self.push(file);
        Ok(())
    }
}

/// Writes files into a directory, creating it on first use.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths written so far, in order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

/// Replace characters that cannot appear in a file name.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

impl OutputSink for DirectorySink {
    fn accept(&mut self, file: OutputFile) -> Result<(), ExportError> {
        fs::create_dir_all(&self.dir).map_err(|source| ExportError::Write {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.dir.join(sanitize_file_name(&file.name));
        fs::write(&path, &file.bytes).map_err(|source| ExportError::Write {
            path: path.clone(),
            source,
        })?;
        log::info!("wrote '{}' ({} bytes)", path.display(), file.bytes.len());
        self.written.push(path);
        Ok(())
    }
}

/// Outcome of a finished job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub students: usize,
    pub file_names: Vec<String>,
}

fn percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let p = (100.0 * processed as f64 / total as f64).round() as u8;
    // Rounding must not announce completion early.
    if processed < total {
        p.min(99)
    } else {
        p
    }
}

pub struct BatchExporter<R> {
    renderer: R,
    max_batch_size: usize,
    title: String,
    state: BatchState,
    transitions: Vec<BatchState>,
}

impl<R: Renderer> BatchExporter<R> {
    pub fn new(renderer: R, max_batch_size: usize, title: impl Into<String>) -> Self {
        Self {
            renderer,
            max_batch_size,
            title: title.into(),
            state: BatchState::Idle,
            transitions: Vec::new(),
        }
    }

    pub fn from_settings(renderer: R, settings: &ExportSettings) -> Self {
        Self::new(renderer, settings.max_batch_size, settings.document_title.clone())
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Every state entered by the last run, in order.
    pub fn transitions(&self) -> &[BatchState] {
        &self.transitions
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }

    fn enter(&mut self, state: BatchState) {
        self.state = state;
        self.transitions.push(state);
    }

    fn notify(&self, progress: &mut dyn ProgressObserver, percent: u8, message: &str) {
        progress.on_progress(&ProgressUpdate {
            percent,
            message: message.to_string(),
            state: self.state,
        });
    }

    /// Export `job`, handing each finished batch file to `sink`.
    pub fn run(
        &mut self,
        job: &BatchJob<'_>,
        progress: &mut dyn ProgressObserver,
        sink: &mut dyn OutputSink,
    ) -> Result<BatchSummary, BatchError> {
        self.transitions.clear();
        self.state = BatchState::Idle;
        job.validate(self.max_batch_size)?;

        let total_students = job.students.len();
        let batches = plan_batches(total_students, job.batch_size);
        let total_batches = batches.len();
        log::info!(
            "exporting {total_students} marksheet(s) of '{}' in {total_batches} batch(es) of up to {}",
            job.class.class_name,
            job.batch_size
        );

        self.enter(BatchState::Initializing);
        self.notify(progress, 0, MSG_INITIALIZING);

        let mut processed = 0usize;
        let mut file_names = Vec::with_capacity(total_batches);

        for (batch, range) in batches.into_iter().enumerate() {
            self.enter(BatchState::ProcessingBatch {
                batch,
                total: total_batches,
            });
            let phase = format!("Processing Batch {} of {}...", batch + 1, total_batches);
            let mut pdf = PdfAssembler::new(&self.title, job.orientation.page_size());

            for (offset, index) in range.enumerate() {
                self.enter(BatchState::ProcessingStudent {
                    batch,
                    student: index,
                });
                let student = job.students[index];
                log::debug!("rendering '{}' ({})", student.name, student.id);

                if offset > 0 {
                    pdf.add_page();
                }
                let inputs = MarksheetInputs {
                    student,
                    class: job.class,
                    school: job.school,
                    theme: job.theme,
                    orientation: job.orientation,
                    font_size: job.font_size,
                };
                let placed = render_student(&mut self.renderer, &inputs)
                    .and_then(|image| place(&mut pdf, &image));
                if let Err(source) = placed {
                    return Err(self.fail(
                        progress,
                        processed,
                        total_students,
                        batch,
                        total_batches,
                        file_names.len(),
                        source,
                    ));
                }

                processed += 1;
                self.notify(progress, percent(processed, total_students), &phase);
            }

            self.enter(BatchState::SavingBatchFile {
                batch,
                total: total_batches,
            });
            let name = batch_file_name(&job.class.class_name, batch, total_batches);
            let page_count = pdf.page_count();
            let file = OutputFile {
                name: name.clone(),
                bytes: pdf.finish(),
                page_count,
            };
            if let Err(source) = sink.accept(file) {
                return Err(self.fail(
                    progress,
                    processed,
                    total_students,
                    batch,
                    total_batches,
                    file_names.len(),
                    source,
                ));
            }
            log::info!("saved '{name}' ({page_count} page(s))");
            file_names.push(name);
        }

        self.enter(BatchState::Done);
        self.notify(progress, 100, MSG_DONE);
        log::info!("batch export finished: {} file(s)", file_names.len());

        Ok(BatchSummary {
            students: total_students,
            file_names,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn fail(
        &mut self,
        progress: &mut dyn ProgressObserver,
        processed: usize,
        total_students: usize,
        batch: usize,
        total_batches: usize,
        files_saved: usize,
        source: ExportError,
    ) -> BatchError {
        self.enter(BatchState::Failed);
        self.notify(progress, percent(processed, total_students), MSG_FAILED);
        log::error!("batch {} of {total_batches} failed: {source}", batch + 1);
        BatchError::Aborted {
            message: MSG_FAILED.to_string(),
            batch: batch + 1,
            total_batches,
            files_saved,
            source,
        }
    }
}

/// Run `job` with the default limits and collect the files in memory.
pub fn export_batch<R: Renderer>(
    renderer: R,
    job: &BatchJob<'_>,
    progress: &mut dyn ProgressObserver,
) -> Result<Vec<OutputFile>, BatchError> {
    let mut exporter = BatchExporter::from_settings(renderer, &ExportSettings::default());
    let mut files = Vec::new();
    exporter.run(job, progress, &mut files)?;
    Ok(files)
}
