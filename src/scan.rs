// src/scan.rs
//! Dry-run batch scan over a screenshot folder. Files are only read, never
//! moved: the outcome is a [`ScanReport`].

use crate::classifier::{preview, ClassifierHandle, UNASSIGNED};
use crate::dedup::DuplicateOracle;
use crate::ocr::TextExtractor;
use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const IMAGE_EXTENSIONS: &[&str] = &["heic", "jpg", "jpeg", "png"];
pub const DEFAULT_MAX_FILES: usize = 100;

const REPORT_PREVIEW_CHARS: usize = 150;
const CONSOLE_PREVIEW_CHARS: usize = 80;
const EMPTY_PREVIEW: &str = "[empty]";

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Image file names directly inside `dir`, sorted.
pub fn list_images(dir: &Path) -> anyhow::Result<Vec<String>> {
    if !dir.exists() {
        return Err(anyhow!("input folder does not exist: {}", dir.display()));
    }
    if !dir.is_dir() {
        return Err(anyhow!("input path is not a folder: {}", dir.display()));
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && is_image_file(&path) {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// First `max_files`, or a random sample of `sample` files capped by
/// `max_files`. A sample at least as large as the folder takes the first
/// `max_files` instead.
pub fn select_files(
    mut all: Vec<String>,
    max_files: usize,
    sample: Option<usize>,
    seed: Option<u64>,
) -> Vec<String> {
    match sample {
        Some(n) if n > 0 && n < all.len() => {
            let mut rng = match seed {
                Some(s) => StdRng::seed_from_u64(s),
                None => StdRng::from_os_rng(),
            };
            all.shuffle(&mut rng);
            all.truncate(n.min(max_files));
            all
        }
        _ => {
            all.truncate(max_files);
            all
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub input_dir: PathBuf,
    pub max_files: usize,
    pub sample: Option<usize>,
    pub seed: Option<u64>,
    pub debug: bool,
}

impl ScanOptions {
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            max_files: DEFAULT_MAX_FILES,
            sample: None,
            seed: None,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanEntry {
    pub filename: String,
    pub text_preview: String,
    pub matched: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryBucket {
    pub category: String,
    pub entries: Vec<ScanEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateKind {
    /// Byte-identical; the file is skipped.
    Exact,
    /// Same perceptual hash; reported, and the file is still classified.
    Visual,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateEntry {
    pub file: String,
    pub original: String,
    pub kind: DuplicateKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanError {
    pub file: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub generated_at: DateTime<Utc>,
    pub input_dir: String,
    pub extractor: String,
    pub classifier_version: String,
    pub total_found: usize,
    pub tested: usize,
    pub sample: Option<usize>,
    /// Configured categories in table order, then Unassigned.
    pub buckets: Vec<CategoryBucket>,
    pub duplicates: Vec<DuplicateEntry>,
    pub errors: Vec<ScanError>,
}

impl ScanReport {
    pub fn bucket(&self, category: &str) -> Option<&CategoryBucket> {
        self.buckets.iter().find(|b| b.category == category)
    }

    fn bucket_mut(&mut self, category: &str) -> Option<&mut CategoryBucket> {
        self.buckets.iter_mut().find(|b| b.category == category)
    }

    pub fn count(&self, category: &str) -> usize {
        self.bucket(category).map(|b| b.entries.len()).unwrap_or(0)
    }

    pub fn unassigned_count(&self) -> usize {
        self.count(UNASSIGNED)
    }

    pub fn classified_count(&self) -> usize {
        self.buckets.iter().map(|b| b.entries.len()).sum()
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Duplicate check → extract → categorize for every selected file.
///
/// `duplicates` decides which files are skipped. `visual`, when given, only
/// flags look-alikes: they are reported and classified anyway.
pub fn run_scan(
    opts: &ScanOptions,
    classifier: &ClassifierHandle,
    extractor: &dyn TextExtractor,
    duplicates: &mut dyn DuplicateOracle,
    mut visual: Option<&mut dyn DuplicateOracle>,
) -> anyhow::Result<ScanReport> {
    let all = list_images(&opts.input_dir)?;
    let total_found = all.len();
    let selected = select_files(all, opts.max_files, opts.sample, opts.seed);
    info!(
        dir = %opts.input_dir.display(),
        found = total_found,
        testing = selected.len(),
        extractor = extractor.name(),
        "dry run started"
    );

    let buckets: Vec<CategoryBucket> = classifier
        .categories()
        .into_iter()
        .chain(std::iter::once(UNASSIGNED.to_string()))
        .map(|category| CategoryBucket {
            category,
            entries: Vec::new(),
        })
        .collect();

    let mut report = ScanReport {
        generated_at: Utc::now(),
        input_dir: opts.input_dir.display().to_string(),
        extractor: extractor.name().to_string(),
        classifier_version: classifier.version(),
        total_found,
        tested: selected.len(),
        sample: opts.sample,
        buckets,
        duplicates: Vec::new(),
        errors: Vec::new(),
    };

    for (idx, name) in selected.iter().enumerate() {
        let path = opts.input_dir.join(name);
        match duplicates.check(&path) {
            Ok(Some(original)) => {
                debug!(file = %name, original = %original.display(), "duplicate skipped");
                report.duplicates.push(DuplicateEntry {
                    file: name.clone(),
                    original: file_label(&original),
                    kind: DuplicateKind::Exact,
                });
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(file = %name, error = %e, "file skipped");
                report.errors.push(ScanError {
                    file: name.clone(),
                    message: format!("{e:#}"),
                });
                continue;
            }
        }

        if let Some(visual) = visual.as_mut() {
            match visual.check(&path) {
                Ok(Some(original)) => {
                    debug!(file = %name, original = %original.display(), "visual duplicate");
                    report.duplicates.push(DuplicateEntry {
                        file: name.clone(),
                        original: file_label(&original),
                        kind: DuplicateKind::Visual,
                    });
                }
                Ok(None) => {}
                Err(e) => warn!(file = %name, error = %e, "visual duplicate check failed"),
            }
        }

        let text = extractor.extract_text(&path);
        let result = classifier.categorize(&text, opts.debug);
        debug!(
            n = idx + 1,
            of = selected.len(),
            file = %name,
            category = %result.category,
            "classified"
        );

        let text_preview = if text.trim().is_empty() {
            EMPTY_PREVIEW.to_string()
        } else {
            preview(&text, REPORT_PREVIEW_CHARS)
        };
        let entry = ScanEntry {
            filename: name.clone(),
            text_preview,
            matched: result.matched_terms,
        };
        match report.bucket_mut(&result.category) {
            Some(bucket) => bucket.entries.push(entry),
            // a reload between listing buckets and classifying can add categories
            None => report.buckets.push(CategoryBucket {
                category: result.category,
                entries: vec![entry],
            }),
        }
    }

    info!(
        tested = report.tested,
        duplicates = report.duplicates.len(),
        errors = report.errors.len(),
        unassigned = report.unassigned_count(),
        "dry run finished"
    );
    Ok(report)
}

fn one_line(s: &str, max_chars: usize) -> String {
    preview(&s.replace('\n', " "), max_chars)
}

fn matched_line(matched: &[String]) -> String {
    if matched.is_empty() {
        "(none)".to_string()
    } else {
        matched.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Console summary: counts, first two files per category, first five
/// unassigned files.
pub fn render_report(report: &ScanReport) -> String {
    let rule = "=".repeat(70);
    let mut out = String::new();
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "DRY RUN RESULTS  ({})", report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "folder:      {}", report.input_dir);
    let _ = writeln!(out, "found:       {}", report.total_found);
    match report.sample {
        Some(n) => {
            let _ = writeln!(out, "tested:      {} (random sample of {n})", report.tested);
        }
        None => {
            let _ = writeln!(out, "tested:      {}", report.tested);
        }
    }
    let _ = writeln!(out, "duplicates:  {}", report.duplicates.len());
    let _ = writeln!(out, "errors:      {}", report.errors.len());
    let _ = writeln!(out);
    let _ = writeln!(out, "CATEGORIES:");

    for bucket in report.buckets.iter().filter(|b| b.category != UNASSIGNED) {
        if bucket.entries.is_empty() {
            continue;
        }
        let _ = writeln!(out, "  {}: {}", bucket.category, bucket.entries.len());
        for e in bucket.entries.iter().take(2) {
            let _ = writeln!(out, "    - {}", preview(&e.filename, 50));
            if e.text_preview != EMPTY_PREVIEW {
                let _ = writeln!(out, "      \"{}...\"", one_line(&e.text_preview, CONSOLE_PREVIEW_CHARS));
                let _ = writeln!(out, "      matched: {}", matched_line(&e.matched));
            }
        }
    }

    if let Some(un) = report.bucket(UNASSIGNED).filter(|b| !b.entries.is_empty()) {
        let pct = if report.tested > 0 {
            un.entries.len() as f64 / report.tested as f64 * 100.0
        } else {
            0.0
        };
        let _ = writeln!(out, "  {}: {} ({pct:.1}%)", UNASSIGNED, un.entries.len());
        for e in un.entries.iter().take(5) {
            let _ = writeln!(out, "    - {}", preview(&e.filename, 50));
            let _ = writeln!(out, "      \"{}...\"", one_line(&e.text_preview, CONSOLE_PREVIEW_CHARS));
        }
    }

    if !report.duplicates.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "DUPLICATES:");
        for d in &report.duplicates {
            match d.kind {
                DuplicateKind::Exact => {
                    let _ = writeln!(out, "  {} = {}", d.file, d.original);
                }
                DuplicateKind::Visual => {
                    let _ = writeln!(out, "  {} ~ {} (looks alike)", d.file, d.original);
                }
            }
        }
    }
    if !report.errors.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "ERRORS:");
        for e in &report.errors {
            let _ = writeln!(out, "  {}: {}", e.file, e.message);
        }
    }
    let _ = writeln!(out, "{rule}");
    out
}
