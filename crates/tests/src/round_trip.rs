//! Backup then restore through real codecs and files

use std::path::Path;

use config_loader::{ConfigFormat, ConfigLoader};
use contracts::{ModuleGroup, PipelineError, StageType};
use stage_runtime::CoordinatorConfig;

use crate::support::{builtin_registry, payload, request, run_request};

fn file_selector(path: &Path) -> String {
    format!("file::path={}", path.display())
}

async fn backup_and_restore(compress: Option<&str>, encrypt_backup: Option<&str>, encrypt_restore: Option<&str>) {
    let registry = builtin_registry();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("db.sql");
    let archive = dir.path().join("db.archive");
    let restored = dir.path().join("restored.sql");

    let original = payload(1 << 20);
    std::fs::write(&input, &original).unwrap();

    let backup = request(
        ModuleGroup::Backup,
        &file_selector(&input),
        compress,
        encrypt_backup,
        &file_selector(&archive),
    );
    let report = run_request(&registry, &backup, CoordinatorConfig::default())
        .await
        .unwrap();
    assert!(report.is_success(), "backup failed: {:?}", report.root_cause());

    let stored = std::fs::read(&archive).unwrap();
    assert_ne!(stored, original);

    // Restore names the decompressor in the compress slot and the decryptor
    // in the encrypt slot; the restore group runs decrypt first.
    let restore = request(
        ModuleGroup::Restore,
        &file_selector(&archive),
        compress.map(|sel| sel.split("::").next().unwrap_or(sel)),
        encrypt_restore,
        &file_selector(&restored),
    );
    let report = run_request(&registry, &restore, CoordinatorConfig::default())
        .await
        .unwrap();
    assert!(report.is_success(), "restore failed: {:?}", report.root_cause());

    assert_eq!(std::fs::read(&restored).unwrap(), original);
}

#[tokio::test]
async fn test_zstd_and_aesgcm_round_trip() {
    backup_and_restore(
        Some("zstd::level=6"),
        Some("aesgcm::key=correct horse::chunk_size=10000"),
        Some("aesgcm::key=correct horse"),
    )
    .await;
}

#[tokio::test]
async fn test_lz4_and_aesgcm_round_trip() {
    backup_and_restore(
        Some("lz4::block_size=4096"),
        Some("aesgcm::key=s3cret"),
        Some("aesgcm::key=s3cret"),
    )
    .await;
}

#[tokio::test]
async fn test_compression_only_round_trip() {
    backup_and_restore(Some("zstd"), None, None).await;
}

#[tokio::test]
async fn test_encryption_only_round_trip() {
    backup_and_restore(None, Some("aesgcm::key=k"), Some("aesgcm::key=k")).await;
}

#[tokio::test]
async fn test_restore_with_wrong_key_fails_at_encrypt_stage() {
    let registry = builtin_registry();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let archive = dir.path().join("archive.bin");
    std::fs::write(&input, payload(200_000)).unwrap();

    let backup = request(
        ModuleGroup::Backup,
        &file_selector(&input),
        Some("lz4"),
        Some("aesgcm::key=right"),
        &file_selector(&archive),
    );
    run_request(&registry, &backup, CoordinatorConfig::default())
        .await
        .unwrap()
        .into_result()
        .unwrap();

    let restore = request(
        ModuleGroup::Restore,
        &file_selector(&archive),
        Some("lz4"),
        Some("aesgcm::key=wrong"),
        "log",
    );
    let report = run_request(&registry, &restore, CoordinatorConfig::default())
        .await
        .unwrap();
    assert_eq!(report.outcomes.len(), 4);

    match report.into_result() {
        Err(PipelineError::RunError { stage, name, source }) => {
            assert_eq!(stage, StageType::Encrypt);
            assert_eq!(name, "aesgcm");
            assert!(source.to_string().contains("authentication failed"), "got: {source}");
        }
        other => panic!("expected a run error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_round_trip_from_manifests() {
    let registry = builtin_registry();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let archive = dir.path().join("nested/archive.bin");
    let restored = dir.path().join("restored.bin");
    let original = payload(300_000);
    std::fs::write(&input, &original).unwrap();

    let backup = format!(
        r#"
group = "backup"
source = {{ module = "file", params = {{ path = "{input}", buffer_size = 1024 }} }}
compress = {{ module = "zstd", params = {{ level = 12 }} }}
encrypt = "aesgcm::key=manifest-key"
sink = {{ module = "file", params = {{ path = "{archive}", create_dirs = true, fsync = true }} }}
"#,
        input = input.display(),
        archive = archive.display(),
    );
    let restore = format!(
        r#"
group = "restore"
source = "file::path={archive}"
compress = "zstd"
encrypt = {{ module = "aesgcm", params = {{ key = "manifest-key" }} }}
sink = "file::path={restored}"
"#,
        archive = archive.display(),
        restored = restored.display(),
    );

    for manifest in [backup, restore] {
        let manifest = ConfigLoader::load_from_str(&manifest, ConfigFormat::Toml).unwrap();
        let request = ConfigLoader::request_from_manifest(&manifest).unwrap();
        run_request(&registry, &request, CoordinatorConfig::default())
            .await
            .unwrap()
            .into_result()
            .unwrap();
    }

    assert_eq!(std::fs::read(&restored).unwrap(), original);
}
