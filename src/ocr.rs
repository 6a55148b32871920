// src/ocr.rs
//! Text extraction seam. The classifier only ever sees a string: either the
//! lowercased OCR text or an error sentinel starting with [`OCR_ERROR_MARKER`].

use anyhow::{anyhow, Context};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// Prefix of every failed extraction. The detail after it is never inspected.
pub const OCR_ERROR_MARKER: &str = "[CHYBA";

pub const DEFAULT_TESSERACT_BIN: &str = "tesseract";
pub const DEFAULT_OCR_LANGS: &str = "ces+eng";

pub fn is_ocr_error(text: &str) -> bool {
    text.trim_start().starts_with(OCR_ERROR_MARKER)
}

pub fn error_sentinel(detail: impl std::fmt::Display) -> String {
    format!("{OCR_ERROR_MARKER}: {detail}]")
}

pub trait TextExtractor {
    /// Never fails: errors come back as [`error_sentinel`] strings so a batch
    /// run keeps going.
    fn extract_text(&self, image: &Path) -> String;

    fn name(&self) -> &'static str;
}

/// Runs the `tesseract` CLI (`-l ces+eng --oem 3 --psm 6`) and reads stdout.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    pub binary: PathBuf,
    pub langs: String,
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_TESSERACT_BIN),
            langs: DEFAULT_OCR_LANGS.to_string(),
        }
    }
}

impl TesseractCli {
    fn run(&self, image: &Path) -> anyhow::Result<String> {
        let out = Command::new(&self.binary)
            .arg(image)
            .arg("stdout")
            .args(["-l", self.langs.as_str(), "--oem", "3", "--psm", "6"])
            .output()
            .with_context(|| format!("spawning {}", self.binary.display()))?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(anyhow!(
                "tesseract exited with {}: {}",
                out.status,
                stderr.trim()
            ));
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_lowercase())
    }
}

impl TextExtractor for TesseractCli {
    fn extract_text(&self, image: &Path) -> String {
        match self.run(image) {
            Ok(text) => {
                debug!(file = %image.display(), chars = text.chars().count(), "ocr done");
                text
            }
            Err(e) => {
                warn!(file = %image.display(), error = %e, "ocr failed");
                error_sentinel(e)
            }
        }
    }

    fn name(&self) -> &'static str {
        "tesseract"
    }
}

/// Pre-extracted text stored next to the image as `<image>.txt`
/// (e.g. `IMG_0001.png.txt`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SidecarText;

impl SidecarText {
    pub fn sidecar_path(image: &Path) -> PathBuf {
        let mut os = image.as_os_str().to_owned();
        os.push(".txt");
        PathBuf::from(os)
    }
}

impl TextExtractor for SidecarText {
    fn extract_text(&self, image: &Path) -> String {
        let path = Self::sidecar_path(image);
        match fs::read_to_string(&path) {
            Ok(text) => text.trim().to_lowercase(),
            Err(e) => {
                debug!(file = %path.display(), error = %e, "no sidecar text");
                error_sentinel(e)
            }
        }
    }

    fn name(&self) -> &'static str {
        "sidecar"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_tmp_dir() -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("sorter_ocr_test_{nanos}"));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn sentinel_shape() {
        let s = error_sentinel("boom");
        assert_eq!(s, "[CHYBA: boom]");
        assert!(is_ocr_error(&s));
        assert!(is_ocr_error("  [CHYBA: x]"));
        assert!(!is_ocr_error("chyba v receptu"));
        assert!(!is_ocr_error(""));
    }

    #[test]
    fn sidecar_reads_and_lowercases() {
        let dir = unique_tmp_dir();
        let img = dir.join("IMG_1.png");
        fs::write(&img, b"not really a png").unwrap();
        fs::write(dir.join("IMG_1.png.txt"), "  Recept na MUFFINY \n").unwrap();

        assert_eq!(SidecarText.extract_text(&img), "recept na muffiny");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_sidecar_is_a_sentinel() {
        let dir = unique_tmp_dir();
        let out = SidecarText.extract_text(&dir.join("nothing.jpg"));
        assert!(is_ocr_error(&out), "{out}");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_tesseract_binary_is_a_sentinel() {
        let cli = TesseractCli {
            binary: PathBuf::from("/nonexistent/bin/tesseract-xyz"),
            ..TesseractCli::default()
        };
        let out = cli.extract_text(Path::new("whatever.png"));
        assert!(is_ocr_error(&out), "{out}");
        assert_eq!(cli.name(), "tesseract");
    }

    #[test]
    fn sidecar_path_appends_extension() {
        assert_eq!(
            SidecarText::sidecar_path(Path::new("/a/b/shot.JPG")),
            PathBuf::from("/a/b/shot.JPG.txt")
        );
    }
}
