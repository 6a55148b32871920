//! Screenshot sorter: binary entrypoint.
//! Dry-run triage of a screenshot folder, or one-off classification of text.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use screenshot_sorter::classifier::{start_hot_reload_thread, Classifier, ClassifierHandle};
use screenshot_sorter::config::{resolve_config_path, ENV_CONFIG_PATH};
use screenshot_sorter::dedup::{ExactDuplicates, PerceptualDuplicates};
use screenshot_sorter::ocr::{SidecarText, TesseractCli, TextExtractor};
use screenshot_sorter::rules::Activation;
use screenshot_sorter::scan::{render_report, run_scan, ScanOptions, DEFAULT_MAX_FILES};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Sort screenshots into life-management categories by their OCR text.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Classifier bundle (overrides SORTER_CONFIG_PATH)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify every image in a folder and print a report. Nothing is moved.
    Scan {
        /// Folder with screenshots
        #[arg(long = "input-dir", alias = "input_dir")]
        input_dir: PathBuf,

        /// Classify a random sample of N files instead of the first ones
        #[arg(long)]
        sample: Option<usize>,

        /// Upper bound on files classified in one run
        #[arg(long, default_value_t = DEFAULT_MAX_FILES)]
        max_files: usize,

        /// Seed for --sample (reproducible runs)
        #[arg(long)]
        seed: Option<u64>,

        /// Log which rule tier fired for every file
        #[arg(long)]
        debug: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        #[arg(long, value_enum, default_value_t = ExtractorKind::Tesseract)]
        extractor: ExtractorKind,
    },
    /// Classify text given on the command line.
    Classify {
        #[arg(long)]
        debug: bool,

        #[arg(required = true)]
        text: Vec<String>,
    },
    /// List rule blocks in priority order.
    Rules,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExtractorKind {
    /// Run the tesseract binary
    Tesseract,
    /// Read `<image>.txt` next to each image
    Sidecar,
}

/// Logs go to stderr so `--json` output on stdout stays clean.
/// SORTER_LOG_JSON=1 switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("screenshot_sorter=info,categorize=info,warn"));
    let json = std::env::var("SORTER_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    // .env may carry SORTER_CONFIG_PATH / SORTER_CONFIDENCE_FLOOR / SORTER_HOT_RELOAD
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    if let Some(path) = &cli.config {
        std::env::set_var(ENV_CONFIG_PATH, path);
    }

    let classifier = Classifier::load().context("loading classifier bundle")?;

    match cli.command {
        Command::Scan {
            input_dir,
            sample,
            max_files,
            seed,
            debug,
            json,
            extractor,
        } => {
            let handle = ClassifierHandle::new(classifier);
            start_hot_reload_thread(handle.clone(), resolve_config_path());

            let extractor: Box<dyn TextExtractor> = match extractor {
                ExtractorKind::Tesseract => Box::new(TesseractCli::default()),
                ExtractorKind::Sidecar => Box::new(SidecarText),
            };
            let opts = ScanOptions {
                input_dir,
                max_files,
                sample,
                seed,
                debug,
            };
            let mut dupes = ExactDuplicates::new();
            let mut look_alikes = PerceptualDuplicates::new();
            let report = run_scan(
                &opts,
                &handle,
                extractor.as_ref(),
                &mut dupes,
                Some(&mut look_alikes),
            )?;

            if report.total_found == 0 {
                info!(dir = %opts.input_dir.display(), "no images (.heic .jpg .jpeg .png) found");
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", render_report(&report));
            }
        }
        Command::Classify { debug, text } => {
            let result = classifier.categorize(&text.join(" "), debug);
            println!("{}", serde_json::to_string(&result)?);
        }
        Command::Rules => {
            println!("bundle version {}", classifier.version());
            for (i, block) in classifier.rules().blocks().iter().enumerate() {
                let shape = match &block.activation {
                    Activation::CountThreshold { min_hits, .. } => format!("count >= {min_hits}"),
                    Activation::Tiered { .. } => "tiered".to_string(),
                };
                println!(
                    "{:>2}. {:<16} {:<10} {} keywords",
                    i + 1,
                    block.category,
                    shape,
                    block.keyword_count()
                );
            }
            println!("fallback categories: {}", classifier.categories().join(", "));
        }
    }
    Ok(())
}
