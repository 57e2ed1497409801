// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// randwerk — batch header/footer margin inspection from the command line.
//
// Entry point. Initialises logging, builds the analysis configuration from an
// optional TOML file plus flags, enumerates the input folder and runs the
// batch with a progress bar fed from the engine's event channel. Ctrl-C
// cancels the run; whatever was analyzed by then is still written.

mod discover;

use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use randwerk_core::config::{AnalysisConfig, OutputFormat, SamplingPolicy};
use randwerk_core::error::{RandwerkError, Result};
use randwerk_core::types::ErrorCategory;
use randwerk_document::FileRasterizer;
use randwerk_engine::{BatchOutcome, CancelToken, RunEvent, analyze_batch, event_channel};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use discover::FileFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SampleMethod {
    /// Analyze every document
    Full,
    /// Sample size from confidence level and margin of error
    Statistical,
    /// A fixed number of randomly chosen documents
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Csv,
    Parquet,
    Sqlite,
}

impl From<FormatArg> for OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Csv => OutputFormat::Tabular,
            FormatArg::Parquet => OutputFormat::Columnar,
            FormatArg::Sqlite => OutputFormat::EmbeddedDb,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "randwerk")]
#[command(version)]
#[command(about = "Find content in the header and footer margins of PDFs and scanned images", long_about = None)]
struct Cli {
    /// Folder holding the documents to inspect
    #[arg(value_name = "FOLDER")]
    folder: PathBuf,

    /// Descend into subfolders
    #[arg(short, long)]
    recursive: bool,

    /// Include PDF files (default)
    #[arg(long, overrides_with = "no_pdf")]
    pdf: bool,

    /// Skip PDF files
    #[arg(long, overrides_with = "pdf")]
    no_pdf: bool,

    /// Include image files (default)
    #[arg(long, overrides_with = "no_images")]
    images: bool,

    /// Skip image files
    #[arg(long, overrides_with = "images")]
    no_images: bool,

    /// Margin band height in percent of page height (0.1 to 10)
    #[arg(short, long, value_name = "PERCENT")]
    threshold: Option<f64>,

    /// Parallel workers (default: all cores)
    #[arg(short, long, value_name = "N")]
    workers: Option<usize>,

    /// Document sampling method
    #[arg(long, value_enum)]
    sample: Option<SampleMethod>,

    /// Confidence level for statistical sampling, in percent
    #[arg(long, value_name = "PERCENT")]
    confidence: Option<f64>,

    /// Margin of error for statistical sampling, in percent
    #[arg(long, value_name = "PERCENT")]
    margin_of_error: Option<f64>,

    /// Number of documents for random sampling
    #[arg(long, value_name = "N")]
    sample_size: Option<usize>,

    /// Seed for the sampling draw
    #[arg(long)]
    seed: Option<u64>,

    /// Results dataset format
    #[arg(short, long, value_enum)]
    format: Option<FormatArg>,

    /// Results dataset path; reports are written next to it
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// TOML file with analysis settings; flags override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn filter(&self) -> FileFilter {
        // Of each pair only the flag given last is set.
        FileFilter {
            pdf: self.pdf || !self.no_pdf,
            images: self.images || !self.no_images,
        }
    }

    /// Load the configuration file, if any, and lay the flags over it.
    fn analysis_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_toml_file(path)?,
            None => AnalysisConfig::default(),
        };

        if let Some(threshold) = self.threshold {
            config.threshold_percent = threshold;
        }
        if let Some(workers) = self.workers {
            config.worker_count = Some(workers);
        }
        if let Some(format) = self.format {
            config.output_format = format.into();
        }
        if let Some(output) = &self.output {
            config.output_destination = output.clone();
        }
        config.sampling = self.sampling_policy(&config.sampling)?;

        config.validate()?;
        Ok(config)
    }

    /// `--sample` picks the method; the other sampling flags refine whichever
    /// method is in effect, including one loaded from the configuration file.
    fn sampling_policy(&self, current: &SamplingPolicy) -> Result<SamplingPolicy> {
        let (method, confidence, margin_of_error, n, seed) = match *current {
            SamplingPolicy::Full => (SampleMethod::Full, 95.0, 5.0, None, None),
            SamplingPolicy::Statistical {
                confidence,
                margin_of_error,
                seed,
            } => (SampleMethod::Statistical, confidence, margin_of_error, None, seed),
            SamplingPolicy::RandomN { n, seed } => (SampleMethod::Random, 95.0, 5.0, Some(n), seed),
        };
        let seed = self.seed.or(seed);

        Ok(match self.sample.unwrap_or(method) {
            SampleMethod::Full => {
                let refined = self.seed.is_some()
                    || self.confidence.is_some()
                    || self.margin_of_error.is_some()
                    || self.sample_size.is_some();
                if refined {
                    return Err(RandwerkError::Config(
                        "sampling flags need --sample statistical or --sample random".into(),
                    ));
                }
                SamplingPolicy::Full
            }
            SampleMethod::Statistical => SamplingPolicy::Statistical {
                confidence: self.confidence.unwrap_or(confidence),
                margin_of_error: self.margin_of_error.unwrap_or(margin_of_error),
                seed,
            },
            SampleMethod::Random => SamplingPolicy::RandomN {
                n: self.sample_size.or(n).ok_or_else(|| {
                    RandwerkError::Config("--sample random needs --sample-size".into())
                })?,
                seed,
            },
        })
    }
}

/// First interrupt cancels the run so partial results get written; a second
/// one exits at once.
fn interrupt_handler(cancel: CancelToken) -> impl Fn() + Send + 'static {
    move || {
        if cancel.is_cancelled() {
            std::process::exit(130);
        }
        warn!("Interrupted, finishing current pages and writing partial results");
        cancel.cancel();
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents {msg}",
    )
    .map(|s| s.progress_chars("=> "))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

fn run(cli: &Cli) -> Result<BatchOutcome> {
    let config = cli.analysis_config()?;
    let paths = discover::enumerate(&cli.folder, cli.recursive, cli.filter())?;
    let documents = discover::documents(&paths);
    info!(
        folder = %cli.folder.display(),
        documents = documents.len(),
        threshold = config.threshold_percent,
        format = config.output_format.label(),
        "Starting analysis"
    );

    let cancel = CancelToken::new();
    if let Err(e) = ctrlc::set_handler(interrupt_handler(cancel.clone())) {
        warn!(error = %e, "Could not install the Ctrl-C handler");
    }

    let (events_tx, events_rx) = event_channel();
    let bar = progress_bar();
    let bar_view = bar.clone();
    let listener = thread::spawn(move || {
        for event in events_rx.iter() {
            match event {
                RunEvent::Progress(progress) => {
                    bar_view.set_length(progress.documents_total as u64);
                    bar_view.set_position(progress.documents_done as u64);
                    let eta = progress
                        .eta()
                        .map(|eta| format!(", eta {}s", eta.as_secs()))
                        .unwrap_or_default();
                    bar_view.set_message(format!(
                        "({} pages, {} flagged, {} errors, {:.1} docs/s{eta})",
                        progress.pages_done,
                        progress.pages_flagged,
                        progress.errors,
                        progress.rate()
                    ));
                }
                RunEvent::DocumentFinished(_) | RunEvent::Error(_) => {}
            }
        }
    });

    let outcome = analyze_batch(
        documents,
        &config,
        &FileRasterizer,
        Some(events_tx),
        &cancel,
    );
    // The sender is dropped once the pool finishes, which ends the listener.
    if listener.join().is_err() {
        error!("Progress display thread panicked");
    }
    bar.finish_and_clear();
    outcome
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(batch) => {
            let summary = &batch.outcome.summary;
            println!(
                "Analyzed {} pages in {} of {} documents: {} flagged ({} header, {} footer)",
                summary.pages_analyzed,
                summary.documents_done,
                summary.documents_total,
                summary.pages_flagged,
                summary.header_flagged,
                summary.footer_flagged,
            );
            println!("Results:  {}", batch.written.dataset.display());
            println!("Report:   {}", batch.written.report.display());
            if summary.cancelled {
                println!("Cancelled: results are partial");
            }
            if let Some(errors) = &batch.written.error_report {
                println!("Errors:   {} ({} rows)", errors.display(), batch.written.error_rows);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, category = %e.category(), "Analysis failed");
            eprintln!("randwerk: {e}");
            if e.category() == ErrorCategory::Configuration {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("randwerk").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn flags_override_defaults() {
        let cli = parse(&[
            "/scans",
            "--threshold",
            "2.5",
            "--format",
            "parquet",
            "--sample",
            "statistical",
            "--seed",
            "9",
        ]);
        let config = cli.analysis_config().unwrap();
        assert_eq!(config.threshold_percent, 2.5);
        assert_eq!(config.output_format, OutputFormat::Columnar);
        assert_eq!(
            config.sampling,
            SamplingPolicy::Statistical {
                confidence: 95.0,
                margin_of_error: 5.0,
                seed: Some(9),
            }
        );
    }

    #[test]
    fn random_sampling_needs_a_size() {
        let cli = parse(&["/scans", "--sample", "random"]);
        assert!(matches!(
            cli.analysis_config(),
            Err(RandwerkError::Config(_))
        ));

        let cli = parse(&["/scans", "--sample", "random", "--sample-size", "12"]);
        assert_eq!(
            cli.analysis_config().unwrap().sampling,
            SamplingPolicy::RandomN { n: 12, seed: None }
        );
    }

    #[test]
    fn later_filter_flag_wins() {
        let cli = parse(&["/scans", "--no-pdf", "--pdf", "--no-images"]);
        assert_eq!(
            cli.filter(),
            FileFilter {
                pdf: true,
                images: false,
            }
        );
    }

    #[test]
    fn config_file_is_overlaid_by_flags() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("randwerk.toml");
        std::fs::write(
            &file,
            "threshold_percent = 3.0\noutput_format = \"embedded_db\"\n\n[sampling]\nmethod = \"random_n\"\nn = 5\n",
        )
        .unwrap();

        let cli = parse(&["/scans", "--config", file.to_str().unwrap(), "--threshold", "1.5"]);
        let config = cli.analysis_config().unwrap();
        assert_eq!(config.threshold_percent, 1.5);
        assert_eq!(config.output_format, OutputFormat::EmbeddedDb);
        assert_eq!(config.sampling, SamplingPolicy::RandomN { n: 5, seed: None });
    }

    #[test]
    fn sampling_flags_refine_the_configured_method() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("randwerk.toml");
        std::fs::write(
            &file,
            "[sampling]\nmethod = \"statistical\"\nconfidence = 90.0\nmargin_of_error = 3.0\n",
        )
        .unwrap();
        let config = file.to_str().unwrap();

        let cli = parse(&["/scans", "--config", config, "--seed", "4"]);
        assert_eq!(
            cli.analysis_config().unwrap().sampling,
            SamplingPolicy::Statistical {
                confidence: 90.0,
                margin_of_error: 3.0,
                seed: Some(4),
            }
        );

        let cli = parse(&["/scans", "--config", config, "--margin-of-error", "8"]);
        assert_eq!(
            cli.analysis_config().unwrap().sampling,
            SamplingPolicy::Statistical {
                confidence: 90.0,
                margin_of_error: 8.0,
                seed: None,
            }
        );

        std::fs::write(&file, "[sampling]\nmethod = \"random_n\"\nn = 5\nseed = 1\n").unwrap();
        let cli = parse(&["/scans", "--config", config, "--sample-size", "8"]);
        assert_eq!(
            cli.analysis_config().unwrap().sampling,
            SamplingPolicy::RandomN { n: 8, seed: Some(1) }
        );
    }

    #[test]
    fn sampling_flags_without_a_sampling_method_rejected() {
        let cli = parse(&["/scans", "--seed", "4"]);
        assert!(matches!(
            cli.analysis_config(),
            Err(RandwerkError::Config(_))
        ));
    }

    #[test]
    fn first_interrupt_cancels_the_run() {
        let cancel = CancelToken::new();
        let handler = interrupt_handler(cancel.clone());
        assert!(!cancel.is_cancelled());
        handler();
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let cli = parse(&["/scans", "--threshold", "12"]);
        assert!(matches!(
            cli.analysis_config(),
            Err(RandwerkError::Config(_))
        ));
    }
}
