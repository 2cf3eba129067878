//! Integration tests for the marksheet pipeline.
//!
//! These tests validate:
//! - Batch partitioning, file naming and output order
//! - Progress reporting and abort behaviour
//! - Job validation before any rendering
//! - Composer determinism
//! - The shipped raster renderer end to end

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use sha2::{Digest, Sha256};

use marksheet_forge::batch::{
    BatchExporter, BatchJob, BatchState, DirectorySink, OutputSink, ProgressUpdate, MSG_DONE,
    MSG_FAILED, MSG_INITIALIZING,
};
use marksheet_forge::compose::{compose, MarksheetInputs};
use marksheet_forge::error::{BatchError, ExportError, JobError, RenderError};
use marksheet_forge::export::{export_one, OutputFile};
use marksheet_forge::fonts::FontManager;
use marksheet_forge::model::{ClassConfig, Orientation, SchoolInfo, Student};
use marksheet_forge::page::MarksheetPage;
use marksheet_forge::raster::RasterImage;
use marksheet_forge::renderer::{RasterRenderer, Renderer};
use marksheet_forge::samples;
use marksheet_forge::theme::ThemeConfig;

// =====================================================================
// Helpers
// =====================================================================

/// Renders a blank image two pixels per millimetre and remembers whose page
/// it was asked to draw. Fails on the `fail_on`-th call (1-based).
#[derive(Default)]
struct FakeRenderer {
    rendered: Vec<String>,
    fail_on: Option<usize>,
}

impl FakeRenderer {
    fn failing_on(call: usize) -> Self {
        Self {
            rendered: Vec::new(),
            fail_on: Some(call),
        }
    }
}

impl Renderer for FakeRenderer {
    fn render(&mut self, page: &MarksheetPage) -> Result<RasterImage, RenderError> {
        if self.fail_on == Some(self.rendered.len() + 1) {
            return Err(RenderError::Layout("simulated failure".into()));
        }
        let texts = page.root.texts();
        let name = texts
            .iter()
            .position(|t| *t == "STUDENT NAME")
            .and_then(|i| texts.get(i + 1))
            .map(|s| s.to_string())
            .unwrap_or_default();
        self.rendered.push(name);
        Ok(RasterImage::filled(
            (page.width_mm * 2.0) as u32,
            (page.height_mm * 2.0) as u32,
            [255, 255, 255, 255],
        ))
    }
}

struct Fixture {
    class: ClassConfig,
    school: SchoolInfo,
    theme: ThemeConfig,
    students: Vec<Student>,
}

fn fixture(count: usize) -> Fixture {
    let class = samples::demo_class();
    let students = samples::demo_students(&class, count);
    Fixture {
        class,
        school: samples::demo_school(),
        theme: ThemeConfig::default(),
        students,
    }
}

fn job(f: &Fixture, batch_size: usize) -> BatchJob<'_> {
    BatchJob {
        students: f.students.iter().collect(),
        class: &f.class,
        school: &f.school,
        theme: &f.theme,
        orientation: Orientation::Portrait,
        batch_size,
        font_size: 12.0,
    }
}

fn inputs(f: &Fixture, index: usize) -> MarksheetInputs<'_> {
    MarksheetInputs {
        student: &f.students[index],
        class: &f.class,
        school: &f.school,
        theme: &f.theme,
        orientation: Orientation::Portrait,
        font_size: 18.0,
    }
}

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

// =====================================================================
// Batch orchestration
// =====================================================================

#[test]
fn batch_of_125_students_in_groups_of_50() {
    let f = fixture(125);
    let mut renderer = FakeRenderer::default();
    let mut exporter = BatchExporter::new(&mut renderer, 100, "Marksheet");
    let mut files: Vec<OutputFile> = Vec::new();
    let mut updates = Vec::new();
    let mut progress = |u: &ProgressUpdate| updates.push(u.clone());

    let summary = exporter.run(&job(&f, 50), &mut progress, &mut files).unwrap();

    assert_eq!(exporter.state(), BatchState::Done);
    drop(exporter);
    assert_eq!(summary.students, 125);
    let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        [
            "Class 10_Batch_1_of_3.pdf",
            "Class 10_Batch_2_of_3.pdf",
            "Class 10_Batch_3_of_3.pdf",
        ]
    );
    assert_eq!(summary.file_names, names);
    let pages: Vec<_> = files.iter().map(|f| f.page_count).collect();
    assert_eq!(pages, [50, 50, 25]);
    for file in &files {
        assert_valid_pdf(&file.bytes);
    }

    let expected: Vec<_> = f.students.iter().map(|s| s.name.clone()).collect();
    assert_eq!(renderer.rendered, expected);
}

#[test]
fn progress_is_monotonic_and_complete_before_the_last_save() {
    let f = fixture(7);
    let last_percent = Rc::new(Cell::new(0u8));
    let seen_at_save = Rc::new(RefCell::new(Vec::new()));

    struct RecordingSink {
        last_percent: Rc<Cell<u8>>,
        seen_at_save: Rc<RefCell<Vec<u8>>>,
    }
    impl OutputSink for RecordingSink {
        fn accept(&mut self, _file: OutputFile) -> Result<(), ExportError> {
            self.seen_at_save.borrow_mut().push(self.last_percent.get());
            Ok(())
        }
    }

    let mut updates: Vec<ProgressUpdate> = Vec::new();
    let tracker = Rc::clone(&last_percent);
    let mut progress = |u: &ProgressUpdate| {
        tracker.set(u.percent);
        updates.push(u.clone());
    };
    let mut sink = RecordingSink {
        last_percent: Rc::clone(&last_percent),
        seen_at_save: Rc::clone(&seen_at_save),
    };

    let mut exporter = BatchExporter::new(FakeRenderer::default(), 100, "Marksheet");
    exporter.run(&job(&f, 3), &mut progress, &mut sink).unwrap();

    assert!(updates.windows(2).all(|w| w[0].percent <= w[1].percent));
    assert_eq!(updates.first().map(|u| u.message.as_str()), Some(MSG_INITIALIZING));
    assert_eq!(updates.first().map(|u| u.percent), Some(0));
    assert_eq!(updates.last().map(|u| u.message.as_str()), Some(MSG_DONE));
    assert_eq!(updates.last().map(|u| u.percent), Some(100));
    assert!(updates.iter().any(|u| u.message == "Processing Batch 3 of 3..."));
    // 3 of 7, 6 of 7, 7 of 7
    assert_eq!(*seen_at_save.borrow(), [43, 86, 100]);
    assert!(updates.iter().filter(|u| u.percent == 100).all(|u| matches!(
        u.state,
        BatchState::ProcessingStudent { student: 6, .. } | BatchState::Done
    )));
}

#[test]
fn transitions_follow_input_order() {
    let f = fixture(3);
    let mut exporter = BatchExporter::new(FakeRenderer::default(), 100, "Marksheet");
    let mut files = Vec::new();
    exporter
        .run(&job(&f, 2), &mut marksheet_forge::NoProgress, &mut files)
        .unwrap();
    use BatchState::*;
    assert_eq!(
        exporter.transitions(),
        [
            Initializing,
            ProcessingBatch { batch: 0, total: 2 },
            ProcessingStudent { batch: 0, student: 0 },
            ProcessingStudent { batch: 0, student: 1 },
            SavingBatchFile { batch: 0, total: 2 },
            ProcessingBatch { batch: 1, total: 2 },
            ProcessingStudent { batch: 1, student: 2 },
            SavingBatchFile { batch: 1, total: 2 },
            Done,
        ]
    );
}

#[test]
fn first_failure_aborts_the_job_and_keeps_saved_files() {
    let f = fixture(125);
    let mut files: Vec<OutputFile> = Vec::new();
    let mut updates: Vec<ProgressUpdate> = Vec::new();
    let mut progress = |u: &ProgressUpdate| updates.push(u.clone());
    let mut exporter = BatchExporter::new(FakeRenderer::failing_on(60), 100, "Marksheet");

    let err = exporter.run(&job(&f, 50), &mut progress, &mut files).unwrap_err();

    match err {
        BatchError::Aborted {
            message,
            batch,
            total_batches,
            files_saved,
            source,
        } => {
            assert_eq!(message, MSG_FAILED);
            assert_eq!((batch, total_batches, files_saved), (2, 3, 1));
            match source {
                ExportError::Render { student_id, .. } => assert_eq!(student_id, "st-60"),
                other => panic!("unexpected source: {other:?}"),
            }
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(exporter.state(), BatchState::Failed);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "Class 10_Batch_1_of_3.pdf");

    let last = updates.last().unwrap();
    assert_eq!(last.message, MSG_FAILED);
    assert_eq!(last.percent, 47);
    // Nothing after the failing student was attempted.
    assert_eq!(exporter.into_renderer().rendered.len(), 59);
}

#[test]
fn invalid_jobs_are_rejected_before_rendering() {
    let f = fixture(3);
    let max = 100;
    let mut exporter = BatchExporter::new(FakeRenderer::default(), max, "Marksheet");
    let mut files = Vec::new();

    let mut empty = job(&f, 10);
    empty.students.clear();
    let err = exporter.run(&empty, &mut marksheet_forge::NoProgress, &mut files);
    assert!(matches!(err, Err(BatchError::InvalidJob(JobError::NoStudents))));

    for size in [0, 101] {
        let err = exporter.run(&job(&f, size), &mut marksheet_forge::NoProgress, &mut files);
        assert!(matches!(
            err,
            Err(BatchError::InvalidJob(JobError::BatchSizeOutOfRange { max: 100, .. }))
        ));
    }

    let mut stranger = f.students[0].clone();
    stranger.class_id = Some("c9".into());
    let mut foreign = job(&f, 10);
    foreign.students.push(&stranger);
    let err = exporter.run(&foreign, &mut marksheet_forge::NoProgress, &mut files);
    assert!(matches!(
        err,
        Err(BatchError::InvalidJob(JobError::ForeignStudent { .. }))
    ));

    assert!(files.is_empty());
    assert!(exporter.transitions().is_empty());
    assert_eq!(exporter.state(), BatchState::Idle);
    assert!(exporter.into_renderer().rendered.is_empty());
}

#[test]
fn batch_size_at_the_limit_is_accepted() {
    let f = fixture(4);
    let mut exporter = BatchExporter::new(FakeRenderer::default(), 4, "Marksheet");
    let mut files = Vec::new();
    exporter
        .run(&job(&f, 4), &mut marksheet_forge::NoProgress, &mut files)
        .unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "Class 10_Batch_1_of_1.pdf");
    assert_eq!(files[0].page_count, 4);
}

// =====================================================================
// Single export
// =====================================================================

#[test]
fn single_export_produces_one_page() {
    let f = fixture(2);
    let mut renderer = FakeRenderer::default();
    let file = export_one(&mut renderer, &inputs(&f, 1), "Marksheet").unwrap();
    assert_eq!(file.name, format!("{}_Marksheet.pdf", f.students[1].name));
    assert_eq!(file.page_count, 1);
    assert_valid_pdf(&file.bytes);
}

#[test]
fn single_export_failure_produces_nothing() {
    let f = fixture(1);
    let mut renderer = FakeRenderer::failing_on(1);
    let err = export_one(&mut renderer, &inputs(&f, 0), "Marksheet").unwrap_err();
    assert!(matches!(err, ExportError::Render { .. }));
}

// =====================================================================
// Composer
// =====================================================================

fn digest(page: &MarksheetPage) -> Vec<u8> {
    Sha256::digest(page.to_json().as_bytes()).to_vec()
}

#[test]
fn composing_twice_gives_identical_descriptions() {
    let mut f = fixture(3);
    f.school.logo = Some(samples::PLACEHOLDER_PNG.to_string());
    let a = compose(&inputs(&f, 2));
    let b = compose(&inputs(&f, 2));
    assert_eq!(a, b);
    assert_eq!(digest(&a), digest(&b));
    assert_ne!(digest(&a), digest(&compose(&inputs(&f, 1))));
}

// =====================================================================
// Raster renderer
// =====================================================================

#[test]
fn raster_renderer_draws_an_a4_page() {
    let mut f = fixture(1);
    f.school.logo = Some(samples::PLACEHOLDER_PNG.to_string());
    let page = compose(&inputs(&f, 0));
    let mut renderer = RasterRenderer::with_supersample(FontManager::new(), 1.0);

    let image = renderer.render(&page).unwrap();
    assert_eq!(image.width, page.width_px().round() as u32);
    assert!(image.height >= page.height_px().round() as u32);
    assert_eq!(image.rgba.len(), (image.width * image.height * 4) as usize);
    // Top-left corner lies in the margin.
    assert_eq!(image.pixel(0, 0), Some([255, 255, 255, 255]));
    // The frame and its contents put some ink on the page.
    assert!(image.rgba.chunks(4).any(|p| p[0] < 128));

    let again = renderer.render(&page).unwrap();
    assert_eq!(image, again);
    assert_eq!(renderer.surface().size(), Some((image.width, image.height)));
}

#[test]
fn raster_export_end_to_end() {
    let f = fixture(1);
    let mut renderer = RasterRenderer::with_supersample(FontManager::new(), 1.0);
    let file = export_one(&mut renderer, &inputs(&f, 0), "Marksheet").unwrap();
    assert_eq!(file.page_count, 1);
    assert_valid_pdf(&file.bytes);
}

#[test]
fn undecodable_photo_fails_the_document() {
    let mut f = fixture(1);
    f.class.enable_photo = true;
    f.students[0].photo = Some("data:image/png;base64,AAAA".to_string());
    let mut renderer = RasterRenderer::with_supersample(FontManager::new(), 1.0);
    let err = export_one(&mut renderer, &inputs(&f, 0), "Marksheet").unwrap_err();
    match err {
        ExportError::Render { source, .. } => {
            assert!(matches!(source, RenderError::Resource { .. }), "{source:?}")
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// =====================================================================
// Directory sink
// =====================================================================

#[test]
fn directory_sink_writes_each_batch_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("exports");
    let mut f = fixture(3);
    f.class.class_name = "10/A".into();
    for st in &mut f.students {
        st.class_name = "10/A".into();
    }

    let mut sink = DirectorySink::new(&out);
    let mut exporter = BatchExporter::new(FakeRenderer::default(), 100, "Marksheet");
    exporter
        .run(&job(&f, 2), &mut marksheet_forge::NoProgress, &mut sink)
        .unwrap();

    let written = sink.written().to_vec();
    assert_eq!(
        written,
        [out.join("10_A_Batch_1_of_2.pdf"), out.join("10_A_Batch_2_of_2.pdf")]
    );
    for path in &written {
        assert_valid_pdf(&std::fs::read(path).unwrap());
    }
}
