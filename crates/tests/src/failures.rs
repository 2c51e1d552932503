//! Runtime failure containment

use std::time::Duration;

use contracts::{ModuleError, ModuleGroup, PipelineError, StageType};
use module_registry::ModuleRegistry;
use stage_runtime::mock::{MemorySource, PassThrough};
use stage_runtime::CoordinatorConfig;

use crate::support::{builtin_registry, payload, request, run_request};

/// Built-ins plus an in-memory source and a few misbehaving encrypt stages
fn registry_with_faults(data: Vec<u8>) -> ModuleRegistry {
    let mut registry = builtin_registry();
    registry.register_fn(ModuleGroup::Backup, move || MemorySource::new(data.clone()));
    registry.register_fn(ModuleGroup::Backup, || {
        PassThrough::encrypt().with_name("flaky").fail_after(64 * 1024)
    });
    registry.register_fn(ModuleGroup::Backup, || {
        PassThrough::encrypt().with_name("panicky").panic_after(16 * 1024)
    });
    registry.register_fn(ModuleGroup::Backup, || {
        PassThrough::compress().with_name("stuck").stall()
    });
    registry
}

#[tokio::test]
async fn test_encrypt_failure_terminates_every_stage() {
    let registry = registry_with_faults(payload(2 << 20));
    let request = request(ModuleGroup::Backup, "memory", Some("zstd::level=1"), Some("flaky"), "log");

    let report = run_request(&registry, &request, CoordinatorConfig::default())
        .await
        .unwrap();
    assert_eq!(report.outcomes.len(), 4);
    assert!(!report.is_success());

    let root = report.root_cause().unwrap();
    assert_eq!((root.stage, root.name.as_str()), (StageType::Encrypt, "flaky"));
    assert!(matches!(root.error(), Some(ModuleError::Codec(_))));
    assert_eq!(report.failures().filter(|o| o.is_root_cause()).count(), 1);

    match report.into_result() {
        Err(PipelineError::RunError { stage, name, .. }) => {
            assert_eq!(stage, StageType::Encrypt);
            assert_eq!(name, "flaky");
        }
        other => panic!("expected a run error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_panicking_stage_is_the_root_cause() {
    let registry = registry_with_faults(payload(512 * 1024));
    let request = request(ModuleGroup::Backup, "memory", None, Some("panicky"), "log");

    let report = run_request(&registry, &request, CoordinatorConfig::default())
        .await
        .unwrap();
    let root = report.root_cause().unwrap();
    assert_eq!(root.name, "panicky");
    match root.error() {
        Some(ModuleError::Panicked(message)) => {
            assert!(message.contains("injected panic"), "got: {message}")
        }
        other => panic!("expected a panic, got {other:?}"),
    }
}

#[tokio::test]
async fn test_deadline_cancels_stalled_pipeline() {
    let registry = registry_with_faults(payload(64 * 1024));
    let request = request(ModuleGroup::Backup, "memory", Some("stuck"), None, "log");
    let config = CoordinatorConfig {
        deadline: Some(Duration::from_millis(300)),
        ..Default::default()
    };

    let report = run_request(&registry, &request, config).await.unwrap();
    assert!(!report.is_success());
    assert_eq!(report.outcomes.len(), 3);
    assert!(report.duration < Duration::from_secs(5));
    assert!(matches!(
        report.outcomes[1].error(),
        Some(ModuleError::Cancelled)
    ));
}

#[tokio::test]
async fn test_failing_dump_command_is_reported_as_source() {
    let registry = builtin_registry();
    let request = request(ModuleGroup::Backup, "command::program=false", Some("lz4"), None, "log");

    let report = run_request(&registry, &request, CoordinatorConfig::default())
        .await
        .unwrap();
    match report.into_result() {
        Err(PipelineError::RunError { stage, name, source }) => {
            assert_eq!(stage, StageType::Source);
            assert_eq!(name, "command");
            assert!(matches!(source, ModuleError::Process { .. }));
        }
        other => panic!("expected a run error, got {other:?}"),
    }
}
