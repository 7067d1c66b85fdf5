//! CLI binary for office2odf.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, converts each input file and prints a report.

use anyhow::{Context, Result};
use clap::Parser;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use office2odf::{
    supported_formats, ConversionConfig, ConvertError, ConvertedFile, Converter, ErrorKind,
    Strategy,
};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert next to the input (report.xlsx → report.ods)
  office2odf report.xlsx

  # Convert a folder's worth of files into out/, four at a time
  office2odf -o out/ -j 4 *.docx *.pptx

  # Force LibreOffice for every format (better layout fidelity)
  office2odf --external-only slides.pptx

  # Machine-readable report
  office2odf --json legacy.doc > report.json

  # Show which formats go where
  office2odf --list-formats

ENVIRONMENT VARIABLES:
  OFFICE2ODF_SOFFICE      LibreOffice executable (default: soffice on PATH)
  OFFICE2ODF_TIMEOUT      LibreOffice timeout in seconds
  OFFICE2ODF_WORK_DIR     Directory for temporary files
  RUST_LOG                Override the log filter (e.g. office2odf=debug)
"#;

/// Convert Microsoft Office documents to OpenDocument.
#[derive(Parser, Debug)]
#[command(
    name = "office2odf",
    version,
    about = "Convert Microsoft Office documents to OpenDocument",
    long_about = "Convert Microsoft Office documents to OpenDocument (ods, odt, odp). \
Common OOXML formats are translated in-process (content only); everything else is \
handed to a headless LibreOffice.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Office files to convert.
    #[arg(required_unless_present = "list_formats")]
    inputs: Vec<PathBuf>,

    /// Write converted files here instead of next to each input.
    #[arg(short, long, env = "OFFICE2ODF_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// LibreOffice executable.
    #[arg(long, env = "OFFICE2ODF_SOFFICE", default_value = "soffice")]
    soffice: PathBuf,

    /// LibreOffice timeout in seconds (1–3600).
    #[arg(long, env = "OFFICE2ODF_TIMEOUT", default_value_t = 60,
          value_parser = clap::value_parser!(u64).range(1..=3600))]
    timeout: u64,

    /// Directory for temporary input/output files.
    #[arg(long, env = "OFFICE2ODF_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Send every format through LibreOffice, never the in-process translators.
    #[arg(long, env = "OFFICE2ODF_EXTERNAL_ONLY")]
    external_only: bool,

    /// Number of files converted concurrently.
    #[arg(short, long, env = "OFFICE2ODF_JOBS", default_value_t = 4,
          value_parser = clap::value_parser!(u16).range(1..=64))]
    jobs: u16,

    /// Print a JSON report instead of human-readable lines.
    #[arg(long)]
    json: bool,

    /// Print the format registry and exit.
    #[arg(long)]
    list_formats: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OFFICE2ODF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OFFICE2ODF_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, env = "OFFICE2ODF_NO_PROGRESS")]
    no_progress: bool,
}

/// Outcome of one input, as printed by `--json`.
#[derive(Debug, Serialize)]
struct FileReport {
    input: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    converted: Option<ConvertedFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorReport>,
}

#[derive(Debug, Serialize)]
struct ErrorReport {
    kind: ErrorKind,
    message: String,
}

impl FileReport {
    fn new(input: &Path, result: Result<ConvertedFile, ConvertError>) -> Self {
        match result {
            Ok(converted) => Self {
                input: input.to_path_buf(),
                converted: Some(converted),
                error: None,
            },
            Err(e) => Self {
                input: input.to_path_buf(),
                converted: None,
                error: Some(ErrorReport {
                    kind: e.kind(),
                    message: e.to_string(),
                }),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO lines when several files are converted.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && cli.inputs.len() > 1;
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

    // ── List formats ─────────────────────────────────────────────────────
    if cli.list_formats {
        print_formats(cli.json)?;
        return Ok(ExitCode::SUCCESS);
    }

    // ── Build config ─────────────────────────────────────────────────────
    let config = build_config(&cli)?;
    let converter = Converter::new(config);

    // ── Run conversions ──────────────────────────────────────────────────
    let bar = show_progress.then(|| progress_bar(cli.inputs.len()));
    let start = Instant::now();

    let mut reports: Vec<(usize, FileReport)> = stream::iter(cli.inputs.iter().enumerate())
        .map(|(idx, input)| {
            let converter = converter.clone();
            let output_dir = cli
                .output_dir
                .clone()
                .unwrap_or_else(|| default_output_dir(input));
            let bar = bar.clone();
            async move {
                if let Some(ref bar) = bar {
                    bar.set_message(input.display().to_string());
                }
                let result = converter.convert_file(input, &output_dir).await;
                let report = FileReport::new(input, result);
                if let Some(ref bar) = bar {
                    bar.println(report_line(&report));
                    bar.inc(1);
                }
                (idx, report)
            }
        })
        .buffer_unordered(usize::from(cli.jobs))
        .collect()
        .await;
    reports.sort_by_key(|(idx, _)| *idx);
    let reports: Vec<FileReport> = reports.into_iter().map(|(_, r)| r).collect();

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    // ── Report ───────────────────────────────────────────────────────────
    let failed = reports.iter().filter(|r| r.error.is_some()).count();

    if cli.json {
        let json = serde_json::to_string_pretty(&reports).context("Failed to serialise report")?;
        println!("{json}");
    } else {
        if !show_progress {
            for report in &reports {
                if report.error.is_some() || !cli.quiet {
                    eprintln!("{}", report_line(report));
                }
            }
        }
        if !cli.quiet {
            let done = reports.len() - failed;
            eprintln!(
                "{}  {}/{} files converted in {}ms",
                if failed == 0 { green("✔") } else { red("✘") },
                bold(&done.to_string()),
                reports.len(),
                start.elapsed().as_millis(),
            );
        }
    }

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .soffice_path(&cli.soffice)
        .external_timeout_secs(cli.timeout)
        .native_enabled(!cli.external_only);
    if let Some(ref dir) = cli.work_dir {
        builder = builder.work_dir(dir);
    }
    builder.build().context("Invalid configuration")
}

/// Converted files land next to their input by default.
fn default_output_dir(input: &Path) -> PathBuf {
    match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn progress_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} files  \
         ⏱ {elapsed_precise}  {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
    bar.set_style(style);
    bar.set_prefix("Converting");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn report_line(report: &FileReport) -> String {
    match (&report.converted, &report.error) {
        (Some(c), _) => format!(
            "  {} {}  →  {}  {}",
            green("✓"),
            report.input.display(),
            bold(&c.output.display().to_string()),
            dim(&format!(
                "{} bytes, {}, {}ms",
                c.bytes,
                strategy_label(c.descriptor.strategy),
                c.duration_ms
            )),
        ),
        (None, Some(e)) => format!(
            "  {} {}  {}",
            red("✗"),
            report.input.display(),
            red(&first_line(&e.message)),
        ),
        (None, None) => format!("  ? {}", report.input.display()),
    }
}

fn first_line(s: &str) -> String {
    s.lines().next().unwrap_or_default().to_string()
}

fn strategy_label(strategy: Strategy) -> &'static str {
    match strategy {
        Strategy::Native => "native",
        Strategy::External => "libreoffice",
    }
}

fn print_formats(json: bool) -> Result<()> {
    let formats = supported_formats();
    if json {
        let out = serde_json::to_string_pretty(&formats).context("Failed to serialise formats")?;
        println!("{out}");
        return Ok(());
    }
    println!("{:<16} {:<12} {:<7} Extensions", "Family", "Strategy", "Output");
    println!("{:<16} {:<12} {:<7} ──────────", "──────", "────────", "──────");
    for group in formats {
        println!(
            "{:<16} {:<12} {:<7} {}",
            group.family.label(),
            strategy_label(group.strategy),
            group.target_extension,
            group.extensions.join(", ")
        );
    }
    Ok(())
}
