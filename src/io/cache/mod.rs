//! Persistent comparison cache.
//!
//! One JSON document per ordered pair, addressed by artifact identity under a
//! metric-set version directory. Documents carry both content fingerprints;
//! a document whose fingerprints no longer match the artifacts is stale and
//! reads as absent.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::api::results::SimilarityRecord;
use crate::core::artifact::{ArtifactId, CodeArtifact};
use crate::core::errors::{CodesimError, Result};
use crate::core::similarity::SimilarityCalculator;

/// Fingerprint recorded for an artifact whose content could not be read.
/// Never equal to a SHA-256 digest, so the entry goes stale once the file
/// becomes readable.
pub const UNREADABLE_FINGERPRINT: &str = "unreadable";

/// Cache address of one ordered comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComparisonKey {
    /// Reference artifact identity
    pub reference: ArtifactId,
    /// Candidate artifact identity
    pub candidate: ArtifactId,
    /// Reference content fingerprint
    pub reference_fingerprint: String,
    /// Candidate content fingerprint
    pub candidate_fingerprint: String,
    /// Metric-set version tag
    pub metric_set_version: String,
}

impl ComparisonKey {
    /// Key for comparing `candidate` against `reference`. Both must belong to
    /// the same experiment bucket.
    pub fn new(
        reference: &CodeArtifact,
        candidate: &CodeArtifact,
        metric_set_version: impl Into<String>,
    ) -> Result<Self> {
        Self::from_parts(
            reference.id(),
            reference.fingerprint(),
            candidate.id(),
            candidate.fingerprint(),
            metric_set_version,
        )
    }

    /// Key from identities and fingerprints. An artifact that could not be
    /// read is keyed with [`UNREADABLE_FINGERPRINT`].
    pub fn from_parts(
        reference: &ArtifactId,
        reference_fingerprint: &str,
        candidate: &ArtifactId,
        candidate_fingerprint: &str,
        metric_set_version: impl Into<String>,
    ) -> Result<Self> {
        if reference.bucket_key() != candidate.bucket_key() {
            return Err(CodesimError::validation(format!(
                "cannot key a comparison across buckets: {reference} vs {candidate}"
            )));
        }
        Ok(Self {
            reference: reference.clone(),
            candidate: candidate.clone(),
            reference_fingerprint: reference_fingerprint.to_string(),
            candidate_fingerprint: candidate_fingerprint.to_string(),
            metric_set_version: metric_set_version.into(),
        })
    }

    /// Path of the document relative to the cache root.
    pub fn relative_path(&self) -> PathBuf {
        let id = &self.reference;
        PathBuf::from(path_component(&self.metric_set_version))
            .join(path_component(&id.challenge))
            .join(path_component(&id.prompt))
            .join(path_component(&id.temperature))
            .join(path_component(&id.model))
            .join(format!(
                "iter_{}__iter_{}.json",
                self.reference.iteration, self.candidate.iteration
            ))
    }
}

/// Replace anything that could escape the cache directory.
fn path_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c == '/' || c == '\\' || c == '\0' { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => format!("_{cleaned}_"),
        _ => cleaned,
    }
}

/// Document persisted for each comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredComparison {
    /// Reference artifact identity
    pub reference: ArtifactId,
    /// Candidate artifact identity
    pub candidate: ArtifactId,
    /// Reference content fingerprint at compute time
    pub reference_fingerprint: String,
    /// Candidate content fingerprint at compute time
    pub candidate_fingerprint: String,
    /// Metric-set version tag
    pub metric_set_version: String,
    /// The comparison result
    pub record: SimilarityRecord,
}

impl StoredComparison {
    fn matches(&self, key: &ComparisonKey) -> bool {
        self.reference == key.reference
            && self.candidate == key.candidate
            && self.reference_fingerprint == key.reference_fingerprint
            && self.candidate_fingerprint == key.candidate_fingerprint
            && self.metric_set_version == key.metric_set_version
    }
}

/// Storage of comparison records.
pub trait ComparisonStore: Send + Sync {
    /// Version tag stamped into every key built for this store.
    fn metric_set_version(&self) -> &str;

    /// Stored record for `key`, if present and current.
    fn get(&self, key: &ComparisonKey) -> Result<Option<SimilarityRecord>>;

    /// Insert or fully overwrite the record for `key`.
    fn put(&self, key: &ComparisonKey, record: &SimilarityRecord) -> Result<()>;

    /// Whether a current record exists for `key`.
    fn exists(&self, key: &ComparisonKey) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Filesystem store writing one pretty-printed JSON file per comparison.
#[derive(Debug, Clone)]
pub struct JsonComparisonStore {
    root: PathBuf,
    metric_set_version: String,
}

impl JsonComparisonStore {
    /// Store rooted at `root`; documents live under `root/<metric_set_version>`.
    pub fn new(root: impl Into<PathBuf>, metric_set_version: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            metric_set_version: metric_set_version.into(),
        }
    }

    /// Cache root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of the document for `key`.
    pub fn entry_path(&self, key: &ComparisonKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// Directory holding every document of this store's metric-set version.
    pub fn version_dir(&self) -> PathBuf {
        self.root.join(path_component(&self.metric_set_version))
    }

    /// Every readable document of this metric-set version, in path order.
    /// Corrupt documents are logged and skipped.
    pub fn stored_comparisons(&self) -> Result<Vec<StoredComparison>> {
        let version_dir = self.version_dir();
        if !version_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();
        for entry in WalkDir::new(&version_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| version_dir.display().to_string());
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "directory walk failed"));
                CodesimError::cache_io("Failed to walk cache directory", path, source)
            })?;

            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(document) = self.read_document(path)? {
                documents.push(document);
            }
        }
        Ok(documents)
    }

    fn read_document(&self, path: &Path) -> Result<Option<StoredComparison>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CodesimError::cache_io(
                    "Failed to read cache entry",
                    path.display().to_string(),
                    e,
                ))
            }
        };

        match serde_json::from_str::<StoredComparison>(&content) {
            Ok(document) => Ok(Some(document)),
            Err(e) => {
                warn!("Ignoring corrupt cache entry {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }
}

impl ComparisonStore for JsonComparisonStore {
    fn metric_set_version(&self) -> &str {
        &self.metric_set_version
    }

    fn get(&self, key: &ComparisonKey) -> Result<Option<SimilarityRecord>> {
        let path = self.entry_path(key);
        match self.read_document(&path)? {
            Some(document) if document.matches(key) => Ok(Some(document.record)),
            Some(_) => {
                debug!("Stale cache entry {}", path.display());
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn put(&self, key: &ComparisonKey, record: &SimilarityRecord) -> Result<()> {
        let path = self.entry_path(key);
        let shown = path.display().to_string();
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent).map_err(|e| {
            CodesimError::cache_io(
                "Failed to create cache directory",
                parent.display().to_string(),
                e,
            )
        })?;

        let document = StoredComparison {
            reference: key.reference.clone(),
            candidate: key.candidate.clone(),
            reference_fingerprint: key.reference_fingerprint.clone(),
            candidate_fingerprint: key.candidate_fingerprint.clone(),
            metric_set_version: key.metric_set_version.clone(),
            record: record.clone(),
        };
        let content = serde_json::to_string_pretty(&document)?;

        // Unique temp name so concurrent writers never share a partial file
        let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        fs::write(&temp_path, content).map_err(|e| {
            CodesimError::cache_io("Failed to write cache entry", temp_path.display().to_string(), e)
        })?;

        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(CodesimError::cache_io("Failed to rename cache entry", shown, e));
        }

        debug!("Cached comparison {}", shown);
        Ok(())
    }
}

/// How [`cached_compare`] produced its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Served from the store
    Hit,
    /// Computed and written to the store
    Computed,
}

/// Look up a comparison, computing and storing it on a miss.
///
/// `force_recompute` skips the lookup and overwrites any stored record.
pub fn cached_compare(
    calculator: &SimilarityCalculator,
    store: &dyn ComparisonStore,
    reference: &CodeArtifact,
    candidate: &CodeArtifact,
    force_recompute: bool,
) -> Result<(SimilarityRecord, CacheOutcome)> {
    let key = ComparisonKey::new(reference, candidate, store.metric_set_version())?;

    if !force_recompute {
        if let Some(record) = store.get(&key)? {
            return Ok((record, CacheOutcome::Hit));
        }
    }

    let record = calculator.compare(reference, candidate);
    store.put(&key, &record)?;
    Ok((record, CacheOutcome::Computed))
}

#[cfg(test)]
mod tests;
