//! CLI binary for exam-convert.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, runs one batch and writes the converted files.

use anyhow::{Context, Result};
use clap::Parser;
use exam_convert::{
    convert_to_dir, progress_channel, BackendKind, BatchReport, CancelFlag, ConversionOutcome,
    FormatCatalog, Pipeline, PipelineConfig, RawDocument, Stage,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a photo and a signature for NEET into ./out
  exam-convert --exam neet photo.jpg signature.png -o out/

  # Whole folder of scans, machine-readable report
  exam-convert --exam upsc scans/* --json > report.json

  # List the built-in exams and their photo/signature contracts
  exam-convert --list-exams

  # Use a custom catalog (same camelCase shape as the built-in table)
  exam-convert --catalog exams.json --exam state-psc photo.jpg

  # No decoding: classify by filename, only pass compliant files through
  exam-convert --backend pass-through --exam cat photo.jpg

  # Crisp black-and-white signature, slightly brighter photo
  exam-convert --exam jee --signature-contrast 20 --binarize-signatures 128 \
      --brighten-photos 10 sign.jpg photo.jpg

CLASSIFICATION:
  Images (.jpg .jpeg .png .bmp .tiff) are classified by shape:
    0.6 <= W/H <= 0.9 and W < 500   passport photo
    W/H > 2.0 and H < 100           signature
    otherwise                       generic document
  Everything else, or any image that cannot be decoded, falls back to
  filename keywords (photo, passport, sign, aadhar, 10th/ssc, 12th/hsc,
  certificate) and is flagged as degraded.

ENVIRONMENT VARIABLES:
  EXAM_CONVERT_EXAM           Default exam id
  EXAM_CONVERT_OUTPUT_DIR     Default output directory
  EXAM_CONVERT_CATALOG        Path to a JSON format catalog
  EXAM_CONVERT_BACKEND        full-decode | pass-through
  RUST_LOG                    Override log filtering (e.g. exam_convert=debug)
"#;

/// Convert exam-application photos and signatures to a portal's exact format.
#[derive(Parser, Debug)]
#[command(
    name = "exam-convert",
    version,
    about = "Classify exam documents and convert photos/signatures to an exam's exact format",
    long_about = "Classify uploaded exam documents (passport photo, signature, marksheets, \
certificates) and convert photos and signatures to the exact width, height, DPI, encoding and \
size limit a competitive-exam portal requires. Other documents are checked against the exam's \
allowed formats and size limit and copied through unchanged.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Files to convert.
    #[arg(required_unless_present = "list_exams")]
    inputs: Vec<PathBuf>,

    /// Exam identifier (neet, jee, upsc, cat, gate, or one from --catalog).
    #[arg(short, long, env = "EXAM_CONVERT_EXAM", required_unless_present = "list_exams")]
    exam: Option<String>,

    /// Directory the converted files are written to.
    #[arg(short, long, env = "EXAM_CONVERT_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// JSON format catalog to use instead of the built-in exams.
    #[arg(long, env = "EXAM_CONVERT_CATALOG")]
    catalog: Option<PathBuf>,

    /// Image backend.
    #[arg(long, env = "EXAM_CONVERT_BACKEND", value_enum, default_value = "full-decode")]
    backend: BackendArg,

    /// Initial JPEG quality (1–100).
    #[arg(long, env = "EXAM_CONVERT_JPEG_QUALITY", default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Lowest JPEG quality tried before giving up on the size limit.
    #[arg(long, env = "EXAM_CONVERT_MIN_QUALITY", default_value_t = 40,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    min_quality: u8,

    /// Quality decrement between attempts.
    #[arg(long, env = "EXAM_CONVERT_QUALITY_STEP", default_value_t = 10,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality_step: u8,

    /// Convert signatures to grayscale.
    #[arg(long, env = "EXAM_CONVERT_GRAYSCALE_SIGNATURES")]
    grayscale_signatures: bool,

    /// Make signatures pure black on white: luma above THRESHOLD becomes white.
    #[arg(long, env = "EXAM_CONVERT_BINARIZE_SIGNATURES", value_name = "THRESHOLD",
          num_args = 0..=1, default_missing_value = "128")]
    binarize_signatures: Option<u8>,

    /// Contrast boost for signatures in percent, applied before binarizing.
    #[arg(long, env = "EXAM_CONVERT_SIGNATURE_CONTRAST", default_value_t = 0.0,
          allow_negative_numbers = true)]
    signature_contrast: f32,

    /// Brightness offset for passport photos (-255..=255).
    #[arg(long, env = "EXAM_CONVERT_BRIGHTEN_PHOTOS", default_value_t = 0,
          allow_negative_numbers = true,
          value_parser = clap::value_parser!(i32).range(-255..=255))]
    brighten_photos: i32,

    /// Print the available exams and exit.
    #[arg(long)]
    list_exams: bool,

    /// Print the batch report as JSON on stdout.
    #[arg(long, env = "EXAM_CONVERT_JSON")]
    json: bool,

    /// Report only; do not write converted files.
    #[arg(long, env = "EXAM_CONVERT_DRY_RUN")]
    dry_run: bool,

    /// Disable progress bar.
    #[arg(long, env = "EXAM_CONVERT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "EXAM_CONVERT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "EXAM_CONVERT_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum BackendArg {
    FullDecode,
    PassThrough,
}

impl From<BackendArg> for BackendKind {
    fn from(v: BackendArg) -> Self {
        match v {
            BackendArg::FullDecode => BackendKind::FullDecode,
            BackendArg::PassThrough => BackendKind::PassThrough,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar and the per-file summary cover what the user needs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.list_exams;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Catalog ──────────────────────────────────────────────────────────
    let custom;
    let catalog: &FormatCatalog = match cli.catalog {
        Some(ref path) => {
            custom = FormatCatalog::from_path(path)
                .with_context(|| format!("Failed to load catalog {}", path.display()))?;
            &custom
        }
        None => FormatCatalog::builtin(),
    };

    if cli.list_exams {
        print_exams(catalog, cli.json)?;
        return Ok(());
    }

    let exam = cli.exam.as_deref().context("--exam is required")?;
    let spec = catalog.lookup(exam)?;

    // ── Read inputs ──────────────────────────────────────────────────────
    let files = cli
        .inputs
        .iter()
        .map(|path| {
            RawDocument::from_path(path).with_context(|| format!("Failed to read {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let config = PipelineConfig::builder()
        .backend(cli.backend.clone().into())
        .jpeg_quality(cli.jpeg_quality)
        .min_jpeg_quality(cli.min_quality)
        .quality_step(cli.quality_step)
        .grayscale_signatures(cli.grayscale_signatures)
        .binarize_signatures(cli.binarize_signatures)
        .signature_contrast(cli.signature_contrast)
        .brighten_photos(cli.brighten_photos)
        .build()
        .context("Invalid configuration")?;
    let pipeline = Pipeline::new(config);

    // Ctrl-C stops the batch at the next file boundary.
    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let (sink, mut events) = progress_channel();
    let bar = show_progress.then(|| new_bar(files.len()));
    let watcher = bar.clone().map(|bar| {
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                bar.set_position(event.progress.round() as u64);
                bar.set_message(format!("{} {}", event.stage.as_str(), event.current_file));
                if event.stage == Stage::Completed {
                    break;
                }
            }
        })
    });

    let report = pipeline
        .run(&files, spec, &sink, Some(&cancel))
        .await
        .context("Conversion failed")?;
    drop(sink);
    if let Some(watcher) = watcher {
        watcher.await.ok();
    }
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    // ── Write outputs ────────────────────────────────────────────────────
    if !cli.dry_run {
        let written = convert_to_dir(&report, &cli.output_dir)
            .await
            .context("Failed to write converted files")?;
        tracing::info!("Wrote {} files to {}", written.len(), cli.output_dir.display());
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&report, &cli);
    }

    if report.stats.converted_files == 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn new_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
    bar.set_style(style);
    bar.set_prefix(format!("Converting {total} files"));
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn print_summary(report: &BatchReport, cli: &Cli) {
    for file in &report.files {
        let degraded = if file.is_degraded() {
            dim(" (classified by filename)")
        } else {
            String::new()
        };
        match &file.outcome {
            ConversionOutcome::Converted(doc) => {
                let geometry = doc
                    .geometry
                    .map(|g| match g.dpi {
                        Some(dpi) => format!("{}x{} @{dpi}dpi ", g.width, g.height),
                        None => format!("{}x{} ", g.width, g.height),
                    })
                    .unwrap_or_default();
                eprintln!(
                    "  {} {:<32} {:<22} {}{}  →  {}{}",
                    green("✓"),
                    file.filename,
                    file.class.as_str(),
                    geometry,
                    dim(&format!("{} bytes", doc.byte_len)),
                    file.output_name.as_deref().unwrap_or_default(),
                    degraded,
                );
            }
            ConversionOutcome::Failed { message, .. } => {
                eprintln!(
                    "  {} {:<32} {:<22} {}{}",
                    red("✗"),
                    file.filename,
                    file.class.as_str(),
                    red(message),
                    degraded,
                );
            }
        }
    }

    let stats = &report.stats;
    eprintln!(
        "{}  {}/{} files converted for {}  {}ms{}",
        if stats.failed_files == 0 {
            green("✔")
        } else {
            yellow("⚠")
        },
        bold(&stats.converted_files.to_string()),
        stats.total_files,
        report.exam_name,
        stats.total_duration_ms,
        if cli.dry_run {
            dim("  (dry run)")
        } else {
            format!("  →  {}", bold(&cli.output_dir.display().to_string()))
        },
    );
    if report.cancelled {
        eprintln!("   {}", yellow("cancelled: remaining files were not processed"));
    }
    if !report.missing_documents.is_empty() {
        let missing: Vec<&str> = report.missing_documents.iter().map(|c| c.as_str()).collect();
        eprintln!("   still missing: {}", missing.join(", "));
    }
}

fn print_exams(catalog: &FormatCatalog, json: bool) -> Result<()> {
    if json {
        let specs: Vec<_> = catalog.specs().collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&specs).context("Failed to serialise catalog")?
        );
        return Ok(());
    }

    println!("{:<8} {:<8} {:<22} {:<22} {:>10}  FORMATS", "ID", "NAME", "PHOTO", "SIGNATURE", "MAX");
    for spec in catalog.specs() {
        let describe = |s: Option<&exam_convert::ImageSpec>| {
            s.map(|s| format!("{}x{} @{} {}", s.width, s.height, s.dpi, s.format))
                .unwrap_or_else(|| "-".into())
        };
        println!(
            "{:<8} {:<8} {:<22} {:<22} {:>10}  {}",
            spec.id,
            spec.name,
            describe(spec.photo_size.as_ref()),
            describe(spec.signature_size.as_ref()),
            format!("{} KB", spec.max_file_size / 1024),
            spec.allowed_formats_label(),
        );
    }
    Ok(())
}
