//! Failures detected before any stage runs

use config_loader::{load_params, parse_selector, request_from_selectors};
use contracts::{FieldKind, ModuleGroup, PipelineError, StageType};
use module_registry::PipelineBuilder;

use crate::support::{builtin_registry, request};

contracts::config_record! {
    #[derive(Debug, Clone, Default)]
    struct LevelConfig {
        level: i64,
    }
}

#[test]
fn test_parameter_without_value_is_malformed() {
    match parse_selector("foo::bar") {
        Err(PipelineError::MalformedSpec { selector, message }) => {
            assert_eq!(selector, "foo::bar");
            assert!(message.contains("missing a value"), "got: {message}");
        }
        other => panic!("expected a malformed selector, got {other:?}"),
    }

    let err = request_from_selectors(
        ModuleGroup::Backup,
        "file::path=/tmp/a",
        Some("zstd::fast"),
        None,
        "stdout",
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::MalformedSpec { .. }));
}

#[test]
fn test_unknown_sink_is_reported_with_its_key() {
    let registry = builtin_registry();
    let request = request(ModuleGroup::Backup, "file::path=/tmp/a", None, None, "nope");

    let err = PipelineBuilder::new(&registry).build(&request).unwrap_err();
    match &err {
        PipelineError::ModuleNotFound { group, stage, name } => {
            assert_eq!(*group, ModuleGroup::Backup);
            assert_eq!(*stage, StageType::Sink);
            assert_eq!(name, "nope");
        }
        other => panic!("expected module not found, got {other:?}"),
    }
    assert_eq!(err.to_string(), "module backup/sink/nope not found");
}

#[test]
fn test_module_in_the_wrong_slot_is_not_found() {
    let registry = builtin_registry();
    let request = request(ModuleGroup::Restore, "stdin", Some("aesgcm::key=k"), None, "stdout");

    let err = PipelineBuilder::new(&registry).build(&request).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::ModuleNotFound { stage: StageType::Compress, ref name, .. } if name == "aesgcm"
    ));
}

#[test]
fn test_params_coerce_by_field_kind() {
    let selector = parse_selector("zstd::level=9::unused_key=x").unwrap();
    let mut config = LevelConfig::default();
    load_params(&mut config, &selector.params).unwrap();
    assert_eq!(config.level, 9);

    let selector = parse_selector("zstd::level=nine").unwrap();
    let mut config = LevelConfig::default();
    match load_params(&mut config, &selector.params) {
        Err(PipelineError::InvalidParamType { key, value, expected, .. }) => {
            assert_eq!(key, "level");
            assert_eq!(value, "nine");
            assert_eq!(expected, FieldKind::Integer);
        }
        other => panic!("expected an invalid parameter, got {other:?}"),
    }
    assert_eq!(config.level, 0);
}

#[test]
fn test_invalid_module_config_fails_init() {
    let registry = builtin_registry();
    let request = request(ModuleGroup::Backup, "stdin", Some("zstd::level=40"), None, "stdout");

    let err = PipelineBuilder::new(&registry).build(&request).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::ModuleInitFailed { stage: StageType::Compress, ref name, .. } if name == "zstd"
    ));
}
