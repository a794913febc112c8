//! Artifact discovery over the experiment directory layout.
//!
//! Layout: `<root>[/code]/<challenge>/<prompt>/<temp_*>/iteration_<n>/<model>.<ext>`.
//! The tree is read-only to this crate.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::core::artifact::{ArtifactId, ArtifactLocation, BucketKey, ExperimentBucket};
use crate::core::errors::{CodesimError, Result};

/// Directory holding generated code inside an experiment root.
pub const CODE_DIR: &str = "code";

/// File stem of generation metadata stored beside artifacts.
pub const GENERATION_PARAMS_STEM: &str = "generation_params";

/// Prefix of iteration directories.
const ITERATION_PREFIX: &str = "iteration_";

/// Prefix of temperature directories.
const TEMPERATURE_PREFIX: &str = "temp";

/// `<root>/code` when it exists, otherwise `root` itself.
pub fn code_root(experiment_root: &Path) -> PathBuf {
    let nested = experiment_root.join(CODE_DIR);
    if nested.is_dir() {
        nested
    } else {
        experiment_root.to_path_buf()
    }
}

/// Discover every artifact under an experiment root, sorted by identity.
pub fn discover_artifacts(experiment_root: &Path, extension: &str) -> Result<Vec<ArtifactLocation>> {
    if !experiment_root.is_dir() {
        return Err(CodesimError::input(
            experiment_root.display().to_string(),
            "experiment root is not a readable directory",
        ));
    }

    let root = code_root(experiment_root);
    let mut locations = Vec::new();

    for entry in WalkDir::new(&root).min_depth(5).max_depth(5).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                let source = err
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "walk failed"));
                return Err(CodesimError::input_io(root.display().to_string(), source));
            }
            Err(err) => {
                warn!("Skipping unreadable part of the experiment tree: {}", err);
                continue;
            }
        };

        // Symlinks are kept so a dangling link surfaces as an input error later
        if entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }

        match identify(&root, path) {
            Some(id) => locations.push(ArtifactLocation {
                id,
                path: path.to_path_buf(),
            }),
            None => debug!("Ignoring file outside the artifact layout: {}", path.display()),
        }
    }

    locations.sort_by(|a, b| a.id.cmp(&b.id));
    info!(
        "Discovered {} artifacts under {}",
        locations.len(),
        root.display()
    );
    Ok(locations)
}

/// Derive an artifact identity from a path five levels below `root`.
fn identify(root: &Path, path: &Path) -> Option<ArtifactId> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    let [challenge, prompt, temperature, iteration_dir, file_name] = parts.as_slice() else {
        return None;
    };

    if !temperature.starts_with(TEMPERATURE_PREFIX) {
        return None;
    }
    let iteration = iteration_dir.strip_prefix(ITERATION_PREFIX)?.parse().ok()?;
    let model = Path::new(file_name).file_stem()?.to_str()?;
    if model == GENERATION_PARAMS_STEM || model.is_empty() {
        return None;
    }

    Some(ArtifactId {
        challenge: challenge.to_string(),
        prompt: prompt.to_string(),
        temperature: temperature.to_string(),
        iteration,
        model: model.to_string(),
    })
}

/// Group artifacts into buckets ordered by key, members ordered by iteration.
pub fn group_into_buckets(locations: Vec<ArtifactLocation>) -> Vec<ExperimentBucket> {
    let mut grouped: BTreeMap<BucketKey, Vec<ArtifactLocation>> = BTreeMap::new();
    for location in locations {
        grouped
            .entry(location.id.bucket_key())
            .or_default()
            .push(location);
    }

    grouped
        .into_iter()
        .map(|(key, mut members)| {
            members.sort_by_key(|m| m.id.iteration);
            ExperimentBucket { key, members }
        })
        .collect()
}
