//! Artifact identity, experiment buckets, and temperature folder parsing.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::errors::Result;
use crate::core::file_utils::{content_fingerprint, FileReader};

/// Identity of one generated artifact within the experiment space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactId {
    /// Challenge name (e.g. `calculator`)
    pub challenge: String,
    /// Prompt strategy name (e.g. `5-role-zero_shot`)
    pub prompt: String,
    /// Temperature folder label (e.g. `temp_0.6`)
    pub temperature: String,
    /// Generation iteration number
    pub iteration: u32,
    /// Model name (e.g. `claude`)
    pub model: String,
}

impl ArtifactId {
    /// Key of the experiment bucket this artifact belongs to.
    pub fn bucket_key(&self) -> BucketKey {
        BucketKey {
            model: self.model.clone(),
            challenge: self.challenge.clone(),
            prompt: self.prompt.clone(),
            temperature: self.temperature.clone(),
        }
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/iteration_{}/{}",
            self.challenge, self.prompt, self.temperature, self.iteration, self.model
        )
    }
}

/// Where an artifact lives on disk, before its content is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLocation {
    /// Artifact identity
    pub id: ArtifactId,
    /// Source file path
    pub path: PathBuf,
}

impl ArtifactLocation {
    /// Read the artifact's source text.
    pub fn load(&self) -> Result<CodeArtifact> {
        let source = FileReader::read_to_string(&self.path)?;
        Ok(CodeArtifact::new(self.id.clone(), Some(self.path.clone()), source))
    }
}

/// A generated artifact with its immutable source text.
#[derive(Debug, Clone)]
pub struct CodeArtifact {
    id: ArtifactId,
    path: Option<PathBuf>,
    source: Arc<str>,
    fingerprint: String,
}

impl CodeArtifact {
    /// Build an artifact from source text.
    pub fn new(id: ArtifactId, path: Option<PathBuf>, source: impl Into<Arc<str>>) -> Self {
        let source: Arc<str> = source.into();
        let fingerprint = content_fingerprint(&source);
        Self {
            id,
            path,
            source,
            fingerprint,
        }
    }

    /// Artifact identity
    pub fn id(&self) -> &ArtifactId {
        &self.id
    }

    /// Source path, when the artifact came from disk
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Source text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// SHA-256 hex digest of the source text
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Grouping key of an experiment bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketKey {
    /// Model name
    pub model: String,
    /// Challenge name
    pub challenge: String,
    /// Prompt strategy name
    pub prompt: String,
    /// Temperature folder label
    pub temperature: String,
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.model, self.challenge, self.prompt, self.temperature
        )
    }
}

/// Artifacts sharing model, challenge, prompt and temperature.
#[derive(Debug, Clone)]
pub struct ExperimentBucket {
    /// Bucket key
    pub key: BucketKey,
    /// Members ordered by iteration
    pub members: Vec<ArtifactLocation>,
}

impl ExperimentBucket {
    /// Every ordered (reference, candidate) pair across distinct iterations.
    pub fn ordered_pairs(&self) -> Vec<(usize, usize)> {
        let n = self.members.len();
        let mut pairs = Vec::with_capacity(n.saturating_mul(n.saturating_sub(1)));
        for reference in 0..n {
            for candidate in 0..n {
                if reference != candidate
                    && self.members[reference].id.iteration != self.members[candidate].id.iteration
                {
                    pairs.push((reference, candidate));
                }
            }
        }
        pairs
    }
}

/// Sampling parameters encoded in a temperature folder label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TemperatureParams {
    /// Sampling temperature
    pub temperature: Option<f64>,
    /// Top-k cutoff
    pub top_k: Option<u32>,
    /// Nucleus sampling threshold
    pub top_p: Option<f64>,
}

impl TemperatureParams {
    /// Parse labels such as `temp_0.6` or `temp_1.0_top_k_40_top_p_0.9`.
    ///
    /// Unrecognised or malformed segments are ignored.
    pub fn parse(label: &str) -> Self {
        let parts: Vec<&str> = label.split('_').collect();
        let mut params = Self::default();
        for (i, part) in parts.iter().enumerate() {
            let Some(value) = parts.get(i + 1) else {
                break;
            };
            match *part {
                "temp" => params.temperature = value.parse().ok(),
                "k" => params.top_k = value.parse().ok(),
                "p" => params.top_p = value.parse().ok(),
                _ => {}
            }
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(iteration: u32) -> ArtifactLocation {
        ArtifactLocation {
            id: ArtifactId {
                challenge: "calculator".into(),
                prompt: "zero_shot".into(),
                temperature: "temp_0.2".into(),
                iteration,
                model: "claude".into(),
            },
            path: PathBuf::from(format!("iteration_{iteration}/claude.py")),
        }
    }

    #[test]
    fn test_ordered_pairs_exclude_self_and_keep_direction() {
        let bucket = ExperimentBucket {
            key: location(1).id.bucket_key(),
            members: vec![location(1), location(2), location(3)],
        };

        let pairs = bucket.ordered_pairs();
        assert_eq!(pairs.len(), 6);
        assert!(pairs.contains(&(0, 1)));
        assert!(pairs.contains(&(1, 0)));
        assert!(!pairs.iter().any(|(r, c)| r == c));
    }

    #[test]
    fn test_ordered_pairs_skip_duplicate_iterations() {
        let bucket = ExperimentBucket {
            key: location(1).id.bucket_key(),
            members: vec![location(1), location(1)],
        };
        assert!(bucket.ordered_pairs().is_empty());
    }

    #[test]
    fn test_temperature_label_parsing() {
        let params = TemperatureParams::parse("temp_1.0_top_k_40_top_p_0.9");
        assert_eq!(params.temperature, Some(1.0));
        assert_eq!(params.top_k, Some(40));
        assert_eq!(params.top_p, Some(0.9));

        let params = TemperatureParams::parse("temp_0.6");
        assert_eq!(params.temperature, Some(0.6));
        assert_eq!(params.top_k, None);

        assert_eq!(TemperatureParams::parse("warm"), TemperatureParams::default());
    }

    #[test]
    fn test_artifact_fingerprint_follows_source() {
        let a = CodeArtifact::new(location(1).id, None, "x = 1\n");
        let b = CodeArtifact::new(location(2).id, None, "x = 1\n");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.source(), "x = 1\n");
        assert!(a.path().is_none());
    }

    #[test]
    fn test_display_mirrors_directory_layout() {
        assert_eq!(
            location(7).id.to_string(),
            "calculator/zero_shot/temp_0.2/iteration_7/claude"
        );
    }
}
