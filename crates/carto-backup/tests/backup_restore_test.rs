//! End-to-end tests driving the facade the way an embedding server would.

use async_trait::async_trait;
use carto_backup::{BackupError, BackupFacade, BackupFacadeBuilder, ExecutionAdapter, ExecutionKind, ExecutionStatus};
use carto_catalog::{
    Catalog, ConfigFacade, GlobalInfo, LayerGroupInfo, LayerInfo, LocalResourceStore,
    LoggingInfo, NamespaceInfo, PluginConfigProvider, ResourceInfo, ResourceKind, ResourceStore,
    ServiceInfo, SettingsInfo, StoreInfo, StoreKind, StyleInfo, WorkspaceInfo,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;

struct TestSystem {
    facade: BackupFacade,
    catalog: Arc<Catalog>,
    config: Arc<ConfigFacade>,
    data_dir: TempDir,
}

fn system() -> TestSystem {
    system_with(|b| b)
}

fn system_with(tune: impl FnOnce(BackupFacadeBuilder) -> BackupFacadeBuilder) -> TestSystem {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let data_dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(Catalog::new(data_dir.path()));
    let config = Arc::new(ConfigFacade::new());
    let store: Arc<dyn ResourceStore> = Arc::new(LocalResourceStore::new(data_dir.path()));
    let builder = BackupFacadeBuilder::new(Arc::clone(&catalog), Arc::clone(&config), store);
    TestSystem { facade: tune(builder).build(), catalog, config, data_dir }
}

/// One workspace, one datastore, six global styles, nothing published.
fn seed_simple(catalog: &Catalog, config: &ConfigFacade) {
    catalog.add_workspace(WorkspaceInfo::new("bk")).unwrap();
    catalog.add_namespace(NamespaceInfo::new("bk", "http://bk.example.org")).unwrap();
    catalog.add_store(StoreInfo::new("shapes", "bk", StoreKind::Data)).unwrap();
    for name in ["point", "line", "polygon", "raster", "generic", "default"] {
        catalog.add_style(StyleInfo::new(name)).unwrap();
    }
    config.set_global(GlobalInfo { update_sequence: 7, ..Default::default() });
    config.set_logging(LoggingInfo::default());
    config.set_service(ServiceInfo::new("map"));
}

fn seed_full(catalog: &Catalog, config: &ConfigFacade) {
    seed_simple(catalog, config);
    catalog
        .add_resource(ResourceInfo::new("streams", "shapes", "bk", ResourceKind::FeatureType))
        .unwrap();
    catalog
        .add_layer(LayerInfo {
            id: None,
            name: "streams".into(),
            resource: "streams".into(),
            workspace: "bk".into(),
            default_style: "line".into(),
            styles: vec!["generic".into()],
            enabled: true,
        })
        .unwrap();
    catalog
        .add_layer_group(LayerGroupInfo {
            id: None,
            name: "basemap".into(),
            workspace: None,
            layers: vec!["bk:streams".into()],
            styles: vec!["line".into()],
        })
        .unwrap();
    let mut ws_service = ServiceInfo::new("feature");
    ws_service.workspace = Some("bk".into());
    config.set_service(ws_service);
    config.set_settings(SettingsInfo {
        workspace: Some("bk".into()),
        title: Some("bk local".into()),
        ..Default::default()
    });
}

async fn wait_for_terminal(execution: &Arc<ExecutionAdapter>) -> ExecutionStatus {
    for _ in 0..400 {
        if execution.status().is_terminal() {
            return execution.status();
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("execution {} did not reach a terminal status", execution.id());
}

async fn backup_to(source: &TestSystem, target: &PathBuf) {
    let execution = source.facade.run_backup_async(target, false, &[]).await.unwrap();
    assert_eq!(wait_for_terminal(&execution).await, ExecutionStatus::Completed);
}

#[tokio::test]
async fn test_backup_writes_archive_tree() {
    let sys = system();
    seed_simple(&sys.catalog, &sys.config);
    // auxiliary folders: the top-level filter keeps properties, drops logs
    let live = LocalResourceStore::new(sys.data_dir.path());
    live.write("logs/logging.properties", bytes::Bytes::from_static(b"l=INFO")).await.unwrap();
    live.write("logs/server.log", bytes::Bytes::from_static(b"...")).await.unwrap();
    live.write("palettes/gray.png", bytes::Bytes::from_static(b"png")).await.unwrap();

    let out = tempfile::tempdir().unwrap();
    let target = out.path().join("archive");
    backup_to(&sys, &target).await;

    assert!(target.join("backup.json").is_file());
    assert!(target.join("global.json").is_file());
    assert!(target.join("logging.json").is_file());
    assert!(target.join("services/map.json").is_file());
    assert!(target.join("workspaces/bk/workspace.json").is_file());
    assert!(target.join("workspaces/bk/namespace.json").is_file());
    assert!(target.join("workspaces/bk/datastores/shapes/datastore.json").is_file());
    assert!(target.join("workspaces/default.json").is_file());
    assert!(target.join("logs/logging.properties").is_file());
    assert!(!target.join("logs/server.log").exists());
    assert!(target.join("palettes/gray.png").is_file());

    let styles = std::fs::read_dir(target.join("styles"))
        .unwrap()
        .filter(|e| {
            e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".json")
        })
        .count();
    assert_eq!(styles, 6);
}

#[tokio::test]
async fn test_backup_output_carries_no_entity_ids() {
    let sys = system();
    let mut ws = WorkspaceInfo::new("bk");
    ws.id = Some("ws-42".into());
    sys.catalog.add_workspace(ws).unwrap();

    let out = tempfile::tempdir().unwrap();
    let target = out.path().join("archive");
    backup_to(&sys, &target).await;

    let raw = std::fs::read_to_string(target.join("workspaces/bk/workspace.json")).unwrap();
    assert!(!raw.contains("\"id\""));
}

#[tokio::test]
async fn test_backup_then_restore_roundtrip() {
    let source = system();
    seed_simple(&source.catalog, &source.config);
    let out = tempfile::tempdir().unwrap();
    let archive = out.path().join("simple");
    backup_to(&source, &archive).await;

    let target = system();
    let execution = target.facade.run_restore_async(&archive, &[]).await.unwrap();
    assert_eq!(wait_for_terminal(&execution).await, ExecutionStatus::Completed);
    assert!(execution.failures().is_empty());

    assert_eq!(target.catalog.workspace_count(), 1);
    assert_eq!(target.catalog.store_count(), 1);
    assert_eq!(target.catalog.resource_count(), 0);
    assert_eq!(target.catalog.style_count(), 6);
    assert_eq!(target.catalog.layer_count(), 0);
    assert_eq!(target.catalog.layer_group_count(), 0);
    assert_eq!(target.catalog.default_workspace().unwrap().name, "bk");
    assert_eq!(target.catalog.default_namespace().unwrap().prefix, "bk");

    // the live configuration was re-pointed, not patched
    assert_eq!(target.config.reload_generation(), 1);
    assert_eq!(target.config.global().update_sequence, 7);
    assert!(target.config.service(None, "map").is_some());
}

#[tokio::test]
async fn test_full_catalog_roundtrip() {
    let source = system();
    seed_full(&source.catalog, &source.config);
    let out = tempfile::tempdir().unwrap();
    let archive = out.path().join("full");
    backup_to(&source, &archive).await;

    let target = system();
    let execution = target.facade.run_restore_async(&archive, &[]).await.unwrap();
    assert_eq!(wait_for_terminal(&execution).await, ExecutionStatus::Completed);

    let layer = target.catalog.layer("bk", "streams").unwrap();
    assert_eq!(layer.default_style, "line");
    assert_eq!(layer.styles, vec!["generic".to_string()]);
    assert!(target.catalog.resource("bk", "streams").is_some());
    assert!(target.catalog.layer_group(None, "basemap").is_some());
    assert!(target.config.service(Some("bk"), "feature").is_some());
    assert_eq!(
        target.config.settings(Some("bk")).unwrap().title.as_deref(),
        Some("bk local")
    );
}

#[tokio::test]
async fn test_hard_restore_rewrites_data_directory() {
    let source = system();
    seed_simple(&source.catalog, &source.config);
    let out = tempfile::tempdir().unwrap();
    let archive = out.path().join("simple");
    backup_to(&source, &archive).await;

    let target = system();
    target.catalog.add_workspace(WorkspaceInfo::new("stale")).unwrap();
    let live = LocalResourceStore::new(target.data_dir.path());
    live.write("workspaces/stale/workspace.json", bytes::Bytes::from_static(b"{}"))
        .await
        .unwrap();

    let execution = target.facade.run_restore_async(&archive, &[]).await.unwrap();
    assert_eq!(wait_for_terminal(&execution).await, ExecutionStatus::Completed);

    assert!(target.data_dir.path().join("workspaces/bk/workspace.json").is_file());
    assert!(target.data_dir.path().join("global.json").is_file());
    assert!(!target.data_dir.path().join("workspaces/stale").exists());
    assert!(target.catalog.workspace("stale").is_none());
}

#[tokio::test]
async fn test_dry_run_restore_leaves_live_state_untouched() {
    let source = system();
    seed_simple(&source.catalog, &source.config);
    let out = tempfile::tempdir().unwrap();
    let archive = out.path().join("simple");
    backup_to(&source, &archive).await;

    let target = system();
    target.catalog.add_workspace(WorkspaceInfo::new("keep")).unwrap();

    let execution = target
        .facade
        .run_restore_async(&archive, &["dry-run".to_string()])
        .await
        .unwrap();
    assert_eq!(wait_for_terminal(&execution).await, ExecutionStatus::Completed);

    assert_eq!(target.catalog.workspace_count(), 1);
    assert!(target.catalog.workspace("keep").is_some());
    assert_eq!(target.config.reload_generation(), 0);
    assert!(!target.data_dir.path().join("global.json").exists());
}

#[tokio::test]
async fn test_failed_restore_leaves_live_state_untouched() {
    let source = system();
    seed_simple(&source.catalog, &source.config);
    let out = tempfile::tempdir().unwrap();
    let archive = out.path().join("simple");
    backup_to(&source, &archive).await;
    std::fs::write(archive.join("styles/point.json"), b"not json").unwrap();

    let target = system();
    let execution = target.facade.run_restore_async(&archive, &[]).await.unwrap();
    assert_eq!(wait_for_terminal(&execution).await, ExecutionStatus::Failed);
    assert!(!execution.failures().is_empty());

    assert_eq!(target.catalog.workspace_count(), 0);
    assert_eq!(target.config.reload_generation(), 0);
}

#[tokio::test]
async fn test_best_effort_downgrades_corrupt_entity() {
    let source = system();
    seed_simple(&source.catalog, &source.config);
    let out = tempfile::tempdir().unwrap();
    let archive = out.path().join("simple");
    backup_to(&source, &archive).await;
    std::fs::write(archive.join("styles/point.json"), b"not json").unwrap();

    let target = system();
    let execution = target
        .facade
        .run_restore_async(&archive, &["best-effort=true".to_string()])
        .await
        .unwrap();
    assert_eq!(wait_for_terminal(&execution).await, ExecutionStatus::Completed);
    assert!(execution.failures().is_empty());
    assert!(!execution.warnings().is_empty());

    // everything but the corrupt style made it in, and the run committed
    assert_eq!(target.catalog.style_count(), 5);
    assert_eq!(target.catalog.workspace_count(), 1);
    assert_eq!(target.config.reload_generation(), 1);
}

#[tokio::test]
async fn test_dry_run_backup_leaves_existing_archive_intact() {
    let sys = system();
    seed_simple(&sys.catalog, &sys.config);
    let out = tempfile::tempdir().unwrap();
    let target = out.path().join("archive");
    backup_to(&sys, &target).await;
    assert!(target.join("backup.json").is_file());

    let execution = sys
        .facade
        .run_backup_async(&target, true, &["dry-run".to_string()])
        .await
        .unwrap();
    assert_eq!(wait_for_terminal(&execution).await, ExecutionStatus::Completed);

    // the earlier archive survives a dry run, even with overwrite set
    assert!(target.join("backup.json").is_file());
    assert!(target.join("workspaces/bk/workspace.json").is_file());
}

#[tokio::test]
async fn test_existing_target_requires_overwrite() {
    let sys = system();
    seed_simple(&sys.catalog, &sys.config);
    let out = tempfile::tempdir().unwrap();
    let target = out.path().join("archive");
    std::fs::create_dir_all(&target).unwrap();
    std::fs::write(target.join("old.json"), b"{}").unwrap();

    let err = sys.facade.run_backup_async(&target, false, &[]).await.unwrap_err();
    assert!(matches!(err, BackupError::ArchiveAlreadyExists(_)));

    let execution = sys.facade.run_backup_async(&target, true, &[]).await.unwrap();
    assert_eq!(wait_for_terminal(&execution).await, ExecutionStatus::Completed);
    assert!(!target.join("old.json").exists());
    assert!(target.join("backup.json").is_file());
}

#[tokio::test]
async fn test_unreachable_target_path_rejected() {
    let sys = system();
    let out = tempfile::tempdir().unwrap();
    // a file where a parent directory would have to be created
    std::fs::write(out.path().join("blocker"), b"x").unwrap();
    let target = out.path().join("blocker/nested/archive");

    let err = sys.facade.run_backup_async(&target, false, &[]).await.unwrap_err();
    assert!(matches!(err, BackupError::UnreachablePath(_)));
}

#[tokio::test]
async fn test_restore_from_missing_archive_fails() {
    let sys = system();
    let err = sys
        .facade
        .run_restore_async(&PathBuf::from("/nonexistent/archive"), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, BackupError::NotFound(_)));
}

#[tokio::test]
async fn test_unknown_option_rejected_before_launch() {
    let sys = system();
    let out = tempfile::tempdir().unwrap();
    let err = sys
        .facade
        .run_backup_async(&out.path().join("a"), false, &["parallel=4".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, BackupError::InvalidOption(_)));
    assert!(sys.facade.registry().is_empty());
}

/// Plugin whose save hook parks until the test releases it, keeping the
/// job (and the admission gate) open.
struct HoldOpen {
    release: Arc<Notify>,
}

#[async_trait]
impl PluginConfigProvider for HoldOpen {
    fn name(&self) -> &str {
        "hold-open"
    }

    fn file_locations(&self) -> Vec<String> {
        Vec::new()
    }

    async fn save_configuration(
        &self,
        _source: &dyn ResourceStore,
        _target: &dyn ResourceStore,
    ) -> carto_catalog::Result<()> {
        self.release.notified().await;
        Ok(())
    }
}

#[tokio::test]
async fn test_concurrent_launch_rejected_while_job_runs() {
    let release = Arc::new(Notify::new());
    let sys = system_with(|b| {
        b.admission_wait(Duration::ZERO)
            .plugin(Arc::new(HoldOpen { release: Arc::clone(&release) }))
    });
    seed_simple(&sys.catalog, &sys.config);

    let out = tempfile::tempdir().unwrap();
    let first = sys
        .facade
        .run_backup_async(&out.path().join("first"), false, &[])
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sys.facade.running(), Some(ExecutionKind::Backup));

    let err = sys
        .facade
        .run_backup_async(&out.path().join("second"), false, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, BackupError::ConcurrentExecution));
    let err = sys
        .facade
        .run_restore_async(&out.path().join("first"), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, BackupError::ConcurrentExecution));
    // rejected launches register nothing
    assert_eq!(sys.facade.registry().len(), 1);

    release.notify_one();
    assert_eq!(wait_for_terminal(&first).await, ExecutionStatus::Completed);
    assert_eq!(sys.facade.running(), None);

    // the gate is free again
    let third = sys
        .facade
        .run_backup_async(&out.path().join("third"), false, &[])
        .await
        .unwrap();
    release.notify_one();
    assert_eq!(wait_for_terminal(&third).await, ExecutionStatus::Completed);
}

#[tokio::test]
async fn test_manifest_records_launch_options() {
    let sys = system();
    seed_simple(&sys.catalog, &sys.config);
    let out = tempfile::tempdir().unwrap();
    let target = out.path().join("archive");
    let execution = sys
        .facade
        .run_backup_async(&target, false, &["best-effort".to_string()])
        .await
        .unwrap();
    assert_eq!(wait_for_terminal(&execution).await, ExecutionStatus::Completed);

    let manifest = carto_backup::archive::read_manifest(&target).await.unwrap();
    assert_eq!(manifest.version, env!("CARGO_PKG_VERSION"));
    assert_eq!(manifest.options, vec!["dry-run=false", "best-effort=true"]);
}

#[tokio::test]
async fn test_plugin_configuration_roundtrip() {
    struct TilePlugin;

    #[async_trait]
    impl PluginConfigProvider for TilePlugin {
        fn name(&self) -> &str {
            "tile-cache"
        }

        fn file_locations(&self) -> Vec<String> {
            vec!["tilecache/tilecache.json".to_string()]
        }
    }

    let source = system_with(|b| b.plugin(Arc::new(TilePlugin)));
    seed_simple(&source.catalog, &source.config);
    let live = LocalResourceStore::new(source.data_dir.path());
    live.write("tilecache/tilecache.json", bytes::Bytes::from_static(b"{\"grid\":4}"))
        .await
        .unwrap();

    let out = tempfile::tempdir().unwrap();
    let archive = out.path().join("with-plugin");
    backup_to(&source, &archive).await;
    assert!(archive.join("tilecache/tilecache.json").is_file());

    let target = system_with(|b| b.plugin(Arc::new(TilePlugin)));
    let execution = target.facade.run_restore_async(&archive, &[]).await.unwrap();
    assert_eq!(wait_for_terminal(&execution).await, ExecutionStatus::Completed);
    assert_eq!(
        std::fs::read(target.data_dir.path().join("tilecache/tilecache.json")).unwrap(),
        b"{\"grid\":4}"
    );
}

#[tokio::test]
async fn test_registry_tracks_completed_executions() {
    let sys = system();
    seed_simple(&sys.catalog, &sys.config);
    let out = tempfile::tempdir().unwrap();
    let execution = sys
        .facade
        .run_backup_async(&out.path().join("archive"), false, &[])
        .await
        .unwrap();
    assert_eq!(wait_for_terminal(&execution).await, ExecutionStatus::Completed);

    assert_eq!(execution.progress(), (4, 4));
    assert!(execution.ended_at().is_some());
    let found = sys.facade.registry().get(execution.id()).unwrap();
    assert_eq!(found.status(), ExecutionStatus::Completed);
    assert!(sys.facade.registry().running_ids(ExecutionKind::Backup).is_empty());
}
