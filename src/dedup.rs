// src/dedup.rs
//! Duplicate detection for one scan run: byte-identical files by content
//! digest, and visually identical images by perceptual hash.

use anyhow::Context;
use image_hasher::{HashAlg, Hasher, HasherConfig};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

const CHUNK: usize = 64 * 1024;

pub trait DuplicateOracle {
    /// `Some(original)` when `file` duplicates one seen earlier in this run,
    /// otherwise remember it and return `None`.
    fn check(&mut self, file: &Path) -> anyhow::Result<Option<PathBuf>>;

    fn is_duplicate(&mut self, file: &Path) -> anyhow::Result<bool> {
        Ok(self.check(file)?.is_some())
    }
}

/// SHA-256 of the file contents, lowercase hex.
pub fn file_digest(path: &Path) -> anyhow::Result<String> {
    let mut f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("reading {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    Ok(out)
}

/// Remembers the first file per content digest.
#[derive(Debug, Default)]
pub struct ExactDuplicates {
    seen: HashMap<String, PathBuf>,
}

impl ExactDuplicates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl DuplicateOracle for ExactDuplicates {
    fn check(&mut self, file: &Path) -> anyhow::Result<Option<PathBuf>> {
        let digest = file_digest(file)?;
        if let Some(original) = self.seen.get(&digest) {
            return Ok(Some(original.clone()));
        }
        self.seen.insert(digest, file.to_path_buf());
        Ok(None)
    }
}

/// DCT mean hash over an 8x8 grid, the classic pHash. Two images are
/// duplicates when their hashes are equal.
pub struct PerceptualDuplicates {
    hasher: Hasher,
    seen: HashMap<String, PathBuf>,
}

impl Default for PerceptualDuplicates {
    fn default() -> Self {
        Self::new()
    }
}

impl PerceptualDuplicates {
    pub fn new() -> Self {
        let hasher = HasherConfig::new()
            .hash_size(8, 8)
            .hash_alg(HashAlg::Mean)
            .preproc_dct()
            .to_hasher();
        Self {
            hasher,
            seen: HashMap::new(),
        }
    }

    /// Base64 of the perceptual hash, or `None` when the file does not decode.
    pub fn image_hash(&self, path: &Path) -> Option<String> {
        match image::open(path) {
            Ok(img) => Some(self.hasher.hash_image(&img).to_base64()),
            Err(e) => {
                debug!(file = %path.display(), error = %e, "no perceptual hash");
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl DuplicateOracle for PerceptualDuplicates {
    /// Undecodable images (HEIC, truncated files) are never duplicates.
    fn check(&mut self, file: &Path) -> anyhow::Result<Option<PathBuf>> {
        let Some(hash) = self.image_hash(file) else {
            return Ok(None);
        };
        if let Some(original) = self.seen.get(&hash) {
            return Ok(Some(original.clone()));
        }
        self.seen.insert(hash, file.to_path_buf());
        Ok(None)
    }
}
