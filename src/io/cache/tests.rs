use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::TempDir;

use crate::api::results::DelegateStatus;
use crate::core::config::CodesimConfig;
use crate::detectors::delegate::{
    DelegateCapability, DelegateError, DelegateScores, SimilarityDelegate,
};

#[derive(Default)]
struct CountingDelegate {
    calls: AtomicUsize,
}

impl SimilarityDelegate for CountingDelegate {
    fn name(&self) -> &str {
        "counting"
    }

    fn score(&self, _: &str, _: &str, _: &str) -> std::result::Result<DelegateScores, DelegateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(DelegateScores {
            weighted_ngram: 0.9,
            syntax_match: 0.8,
            dataflow_match: 0.7,
        })
    }
}

fn artifact(iteration: u32, source: &str) -> CodeArtifact {
    CodeArtifact::new(
        ArtifactId {
            challenge: "calculator".into(),
            prompt: "zero_shot".into(),
            temperature: "temp_0.6".into(),
            iteration,
            model: "claude".into(),
        },
        None,
        source,
    )
}

fn store_in(dir: &TempDir) -> JsonComparisonStore {
    JsonComparisonStore::new(dir.path(), "v1")
}

const REFERENCE: &str = "def add(a, b):\n    return a + b\n";
const CANDIDATE: &str = "def add(x, y):\n    return x + y\n";

#[test]
fn key_path_follows_identity_layout() {
    let key = ComparisonKey::new(&artifact(1, REFERENCE), &artifact(3, CANDIDATE), "v1").unwrap();
    assert_eq!(
        key.relative_path(),
        PathBuf::from("v1/calculator/zero_shot/temp_0.6/claude/iter_1__iter_3.json")
    );
}

#[test]
fn key_rejects_pairs_across_buckets() {
    let reference = artifact(1, REFERENCE);
    let mut other_id = reference.id().clone();
    other_id.model = "gemini".into();
    let candidate = CodeArtifact::new(other_id, None, CANDIDATE);
    assert!(ComparisonKey::new(&reference, &candidate, "v1").is_err());
}

#[test]
fn path_components_cannot_escape() {
    assert_eq!(path_component("../x"), ".._x");
    assert_eq!(path_component(".."), "_.._");
    assert_eq!(path_component("temp_0.6"), "temp_0.6");
}

#[test]
fn put_then_get_roundtrips_record() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let calc = SimilarityCalculator::with_defaults();
    let (reference, candidate) = (artifact(1, REFERENCE), artifact(2, CANDIDATE));
    let key = ComparisonKey::new(&reference, &candidate, "v1").unwrap();

    assert!(!store.exists(&key).unwrap());
    let record = calc.compare(&reference, &candidate);
    store.put(&key, &record).unwrap();

    assert!(store.exists(&key).unwrap());
    assert_eq!(store.get(&key).unwrap(), Some(record));

    // No temp files are left behind.
    let leftovers: Vec<_> = fs::read_dir(store.entry_path(&key).parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn changed_content_makes_entry_stale() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let calc = SimilarityCalculator::with_defaults();
    let reference = artifact(1, REFERENCE);

    let (_, outcome) = cached_compare(&calc, &store, &reference, &artifact(2, CANDIDATE), false).unwrap();
    assert_eq!(outcome, CacheOutcome::Computed);

    let edited = artifact(2, "def add(x, y):\n    return y + x\n");
    let key = ComparisonKey::new(&reference, &edited, "v1").unwrap();
    assert_eq!(store.get(&key).unwrap(), None);

    let (_, outcome) = cached_compare(&calc, &store, &reference, &edited, false).unwrap();
    assert_eq!(outcome, CacheOutcome::Computed);
}

#[test]
fn corrupt_entry_reads_as_absent() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let key = ComparisonKey::new(&artifact(1, REFERENCE), &artifact(2, CANDIDATE), "v1").unwrap();

    let path = store.entry_path(&key);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "{ truncated").unwrap();

    assert_eq!(store.get(&key).unwrap(), None);
    assert!(store.stored_comparisons().unwrap().is_empty());
}

#[test]
fn cached_compare_is_idempotent_and_skips_delegate() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let delegate = Arc::new(CountingDelegate::default());
    let calc = SimilarityCalculator::new(
        &CodesimConfig::default(),
        DelegateCapability::new(delegate.clone()),
    );
    let (reference, candidate) = (artifact(1, REFERENCE), artifact(2, CANDIDATE));

    let (first, outcome) = cached_compare(&calc, &store, &reference, &candidate, false).unwrap();
    assert_eq!(outcome, CacheOutcome::Computed);
    assert_eq!(first.delegate_status, DelegateStatus::Computed);
    assert_eq!(delegate.calls.load(Ordering::SeqCst), 1);

    let (second, outcome) = cached_compare(&calc, &store, &reference, &candidate, false).unwrap();
    assert_eq!(outcome, CacheOutcome::Hit);
    assert_eq!(second, first);
    assert_eq!(delegate.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn force_recompute_overwrites() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let delegate = Arc::new(CountingDelegate::default());
    let calc = SimilarityCalculator::new(
        &CodesimConfig::default(),
        DelegateCapability::new(delegate.clone()),
    );
    let (reference, candidate) = (artifact(1, REFERENCE), artifact(2, CANDIDATE));

    let (first, _) = cached_compare(&calc, &store, &reference, &candidate, false).unwrap();
    let (second, outcome) = cached_compare(&calc, &store, &reference, &candidate, true).unwrap();

    assert_eq!(outcome, CacheOutcome::Computed);
    assert_eq!(delegate.calls.load(Ordering::SeqCst), 2);
    assert!(second.same_scores(&first));
    assert_eq!(store.stored_comparisons().unwrap().len(), 1);
}

#[test]
fn metric_versions_are_isolated() {
    let dir = TempDir::new().unwrap();
    let calc = SimilarityCalculator::with_defaults();
    let (reference, candidate) = (artifact(1, REFERENCE), artifact(2, CANDIDATE));

    let v1 = JsonComparisonStore::new(dir.path(), "v1");
    let v2 = JsonComparisonStore::new(dir.path(), "v2");
    cached_compare(&calc, &v1, &reference, &candidate, false).unwrap();

    let (_, outcome) = cached_compare(&calc, &v2, &reference, &candidate, false).unwrap();
    assert_eq!(outcome, CacheOutcome::Computed);
    assert_eq!(v1.stored_comparisons().unwrap().len(), 1);
    assert_eq!(v2.stored_comparisons().unwrap().len(), 1);
}

#[test]
fn directionality_is_preserved() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let calc = SimilarityCalculator::with_defaults();
    let (a, b) = (artifact(1, REFERENCE), artifact(2, CANDIDATE));

    cached_compare(&calc, &store, &a, &b, false).unwrap();
    let reverse = ComparisonKey::new(&b, &a, "v1").unwrap();
    assert!(!store.exists(&reverse).unwrap());
}

#[cfg(unix)]
#[test]
fn unwritable_store_is_a_cache_error() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocked");
    fs::write(&blocker, "not a directory").unwrap();

    let store = JsonComparisonStore::new(&blocker, "v1");
    let key = ComparisonKey::new(&artifact(1, REFERENCE), &artifact(2, CANDIDATE), "v1").unwrap();
    let record = SimilarityCalculator::with_defaults().compare_sources(REFERENCE, CANDIDATE);

    let err = store.put(&key, &record).unwrap_err();
    assert!(matches!(err, CodesimError::CacheIo { .. }));
    assert!(err.is_fatal());
}
