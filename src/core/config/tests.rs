use super::*;
use crate::core::errors::CodesimError;
use tempfile::TempDir;

fn expect_config_error<T: std::fmt::Debug>(result: Result<T>) -> CodesimError {
    result.expect_err("expected validation failure")
}

#[test]
fn default_config_validates_successfully() {
    CodesimConfig::default()
        .validate()
        .expect("codesim default");
}

#[test]
fn bleu_order_bounds() {
    let mut config = BleuConfig::default();
    config.max_order = 0;
    let err = expect_config_error(config.validate());
    assert!(matches!(err, CodesimError::Config { .. }));

    config.max_order = 12;
    let err = expect_config_error(config.validate());
    assert!(format!("{err}").contains("max_order"), "unexpected: {err}");
}

#[test]
fn composite_weights_reject_negative_and_all_zero() {
    let mut weights = CompositeWeights::default();
    weights.delegate = -0.1;
    assert!(weights.validate().is_err());

    let weights = CompositeWeights {
        bleu: 0.0,
        structural: 0.0,
        delegate: 0.0,
    };
    let err = expect_config_error(weights.validate());
    assert!(format!("{err}").contains("must not all be zero"));
}

#[test]
fn batch_config_rejects_zero_limits_and_dotted_extension() {
    let mut config = BatchConfig::default();
    config.workers = 0;
    assert!(config.validate().is_err());

    let mut config = BatchConfig::default();
    config.pair_timeout_secs = 0;
    assert!(config.validate().is_err());

    let mut config = BatchConfig::default();
    config.source_extension = ".py".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn metric_set_version_must_be_path_safe() {
    let mut config = CacheConfig::default();
    config.metric_set_version = "../escape".to_string();
    assert!(config.validate().is_err());

    config.metric_set_version = "v2.1-bleu4".to_string();
    config.validate().expect("path-safe tag");
}

#[test]
fn delegate_command_needs_a_program() {
    let mut config = DelegateConfig::default();
    config.command = Some(vec![]);
    assert!(config.validate().is_err());

    config.command = Some(vec!["codebleu-wrapper".to_string(), "--json".to_string()]);
    config.validate().expect("program given");
}

#[test]
fn cache_dir_resolves_relative_to_experiment_root() {
    let root = Path::new("/data/run");
    let mut config = CodesimConfig::default();
    assert_eq!(
        config.cache_dir_for(root),
        PathBuf::from("/data/run/similarity_analysis")
    );

    config.cache.directory = Some(PathBuf::from("cache"));
    assert_eq!(config.cache_dir_for(root), PathBuf::from("/data/run/cache"));

    config.cache.directory = Some(PathBuf::from("/tmp/shared"));
    assert_eq!(config.cache_dir_for(root), PathBuf::from("/tmp/shared"));
}

#[test]
fn yaml_roundtrip_preserves_overrides() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("codesim.yml");

    let mut config = CodesimConfig::default();
    config.bleu.max_order = 3;
    config.batch.workers = 2;
    config.delegate.command = Some(vec!["python3".into(), "score.py".into()]);
    config.to_yaml_file(&path).unwrap();

    let loaded = CodesimConfig::from_yaml_file(&path).unwrap();
    assert_eq!(loaded.bleu.max_order, 3);
    assert_eq!(loaded.batch.workers, 2);
    assert_eq!(
        loaded.delegate.command,
        Some(vec!["python3".to_string(), "score.py".to_string()])
    );
}

#[test]
fn partial_yaml_fills_defaults() {
    let yaml = "bleu:\n  max_order: 2\n";
    let config: CodesimConfig = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.bleu.max_order, 2);
    assert_eq!(config.cache.metric_set_version, "v1");
    assert_eq!(config.batch.source_extension, "py");
    config.validate().unwrap();
}
