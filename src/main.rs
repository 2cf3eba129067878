//! marksheet – command-line marksheet exporter.
//!
//! Usage:
//!   marksheet --records state.json one --student st-4
//!   marksheet --demo 125 --out out/ batch --class "Class 10" --batch-size 50
//!
//! Files are written into `--out` (default: the current directory).

use std::error::Error;
use std::path::PathBuf;
use std::process;

use clap::{ArgGroup, Parser, Subcommand};

use marksheet_forge::batch::{BatchExporter, BatchJob, DirectorySink, OutputSink, ProgressUpdate};
use marksheet_forge::compose::MarksheetInputs;
use marksheet_forge::config::ExportSettings;
use marksheet_forge::export::export_one;
use marksheet_forge::fonts::FontManager;
use marksheet_forge::model::Orientation;
use marksheet_forge::records::Records;
use marksheet_forge::renderer::RasterRenderer;
use marksheet_forge::samples;

#[derive(Parser, Debug)]
#[command(version, about = "Generate school marksheets as A4 PDFs")]
#[command(group(ArgGroup::new("source").required(true).args(["records", "demo"])))]
struct Cli {
    /// Saved application state (JSON)
    #[arg(long, value_name = "PATH")]
    records: Option<PathBuf>,

    /// Use the built-in demo class with COUNT students
    #[arg(long, value_name = "COUNT", num_args = 0..=1, default_missing_value = "30")]
    demo: Option<usize>,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    out: PathBuf,

    /// Export settings (JSON); every key is optional
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Force landscape pages regardless of the saved orientation
    #[arg(short, long)]
    landscape: bool,

    /// Load fonts installed on this system
    #[arg(long)]
    system_fonts: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export one student's marksheet
    One {
        /// Student id
        #[arg(short, long)]
        student: String,
        /// Base font size in px
        #[arg(long)]
        font_size: Option<f32>,
    },
    /// Export a class in batches, one PDF per batch
    Batch {
        /// Class id or name
        #[arg(short, long)]
        class: String,
        /// Only these student ids, in this order
        #[arg(long, value_delimiter = ',')]
        students: Vec<String>,
        /// Students per PDF
        #[arg(short, long)]
        batch_size: Option<usize>,
        /// Base font size in px
        #[arg(long)]
        font_size: Option<f32>,
    },
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("marksheet_forge=info"),
    )
    .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let settings = match &cli.settings {
        Some(path) => ExportSettings::load(path)?,
        None => ExportSettings::default(),
    };
    let records = match (&cli.records, cli.demo) {
        (Some(path), _) => Records::load(path)?,
        (None, Some(count)) => samples::demo_records_with_students(count),
        (None, None) => return Err("either --records or --demo is required".into()),
    };

    let mut fonts = FontManager::new();
    let want_system_fonts = cli.system_fonts || settings.system_fonts;
    if want_system_fonts && !fonts.load_system_fonts(&records.theme.font_family) {
        log::warn!("no usable system font found");
    }
    let mut renderer = RasterRenderer::with_supersample(fonts, settings.supersample);

    let orientation = if cli.landscape {
        Orientation::Landscape
    } else {
        records.orientation
    };
    let directory = records.directory();
    let mut sink = DirectorySink::new(&cli.out);

    match cli.command {
        Command::One { student, font_size } => {
            let student = records.student(&student)?;
            let class = directory.class_for(student)?;
            class.validate()?;
            let inputs = MarksheetInputs {
                student,
                class,
                school: &records.school_info,
                theme: &records.theme,
                orientation,
                font_size: font_size.unwrap_or(settings.single_font_size),
            };
            let file = export_one(&mut renderer, &inputs, &settings.document_title)?;
            let name = file.name.clone();
            sink.accept(file)?;
            eprintln!("Wrote '{}'", cli.out.join(name).display());
        }
        Command::Batch {
            class,
            students,
            batch_size,
            font_size,
        } => {
            let class = directory.find(&class)?;
            class.validate()?;
            let students = if students.is_empty() {
                directory.students_of(class, &records.students)
            } else {
                students
                    .iter()
                    .map(|id| records.student(id))
                    .collect::<Result<Vec<_>, _>>()?
            };
            let job = BatchJob {
                students,
                class,
                school: &records.school_info,
                theme: &records.theme,
                orientation,
                batch_size: batch_size.unwrap_or(settings.default_batch_size),
                font_size: font_size.unwrap_or(settings.bulk_font_size),
            };

            let mut exporter = BatchExporter::from_settings(&mut renderer, &settings);
            let mut progress = |u: &ProgressUpdate| eprintln!("[{:>3}%] {}", u.percent, u.message);
            let summary = exporter.run(&job, &mut progress, &mut sink)?;
            eprintln!(
                "Wrote {} file{} for {} student{}",
                summary.file_names.len(),
                if summary.file_names.len() == 1 { "" } else { "s" },
                summary.students,
                if summary.students == 1 { "" } else { "s" }
            );
        }
    }
    Ok(())
}
