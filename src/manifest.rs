//! Utterance manifests (`<utterance_id> <wav_path>` per line) and the
//! clean/noisy pairing the datasets are built on.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::error::ManifestError;

/// One manifest row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub utterance_id: String,
    pub path: PathBuf,
}

impl ManifestEntry {
    pub fn new(utterance_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            utterance_id: utterance_id.into(),
            path: path.into(),
        }
    }
}

/// Ordered manifest rows. Order is preserved and duplicates are kept.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    /// Read and parse a manifest file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        Ok(Self::parse(&text, path)?)
    }

    /// Parse manifest text. `source` is only used in error messages.
    ///
    /// Fields are whitespace-separated; blank lines are skipped and anything
    /// after the second field is ignored.
    pub fn parse(text: &str, source: &Path) -> std::result::Result<Self, ManifestError> {
        let mut entries = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let mut fields = line.split_whitespace();
            let Some(utterance_id) = fields.next() else {
                continue;
            };
            let Some(path) = fields.next() else {
                return Err(ManifestError::MalformedLine {
                    path: source.to_path_buf(),
                    line: lineno + 1,
                    content: line.to_string(),
                });
            };
            entries.push(ManifestEntry::new(utterance_id, path));
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ManifestEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }
}

/// A clean manifest and a noisy manifest that reference the same utterances
/// in the same order.
#[derive(Debug, Clone)]
pub struct ManifestPair {
    clean: Manifest,
    noisy: Manifest,
}

impl ManifestPair {
    /// Pair two manifests, rejecting length or id disagreement.
    pub fn new(clean: Manifest, noisy: Manifest) -> std::result::Result<Self, ManifestError> {
        if let Some((row, (c, n))) = clean
            .entries
            .iter()
            .zip(noisy.entries.iter())
            .enumerate()
            .find(|(_, (c, n))| c.utterance_id != n.utterance_id)
        {
            return Err(ManifestError::Misaligned {
                row,
                clean_id: c.utterance_id.clone(),
                noisy_id: n.utterance_id.clone(),
            });
        }

        if clean.len() != noisy.len() {
            return Err(ManifestError::LengthMismatch {
                clean: clean.len(),
                noisy: noisy.len(),
            });
        }

        Ok(Self { clean, noisy })
    }

    /// Load both manifests from disk and pair them.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(clean: P, noisy: Q) -> Result<Self> {
        let clean_path = clean.as_ref();
        let noisy_path = noisy.as_ref();
        let clean = Manifest::load(clean_path)?;
        let noisy = Manifest::load(noisy_path)?;
        Self::new(clean, noisy).with_context(|| {
            format!(
                "in {} and {}",
                clean_path.display(),
                noisy_path.display()
            )
        })
    }

    /// Number of paired rows
    pub fn len(&self) -> usize {
        self.noisy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.noisy.is_empty()
    }

    /// The (clean, noisy) rows at `row`
    pub fn get(&self, row: usize) -> Option<(&ManifestEntry, &ManifestEntry)> {
        Some((self.clean.get(row)?, self.noisy.get(row)?))
    }

    pub fn clean(&self) -> &Manifest {
        &self.clean
    }

    pub fn noisy(&self) -> &Manifest {
        &self.noisy
    }
}
