//! Catalog hierarchy stage.
//!
//! Walks workspaces, stores, resources, layers, styles and layer groups.
//! The backup side mirrors the catalog into the staging tree; the restore
//! side rebuilds the detached working catalog from the extracted archive,
//! in dependency order so every name-based cross reference resolves at
//! insertion time.

use crate::layout::{
    self, DEFAULT_NAMESPACE_FILE, DEFAULT_WORKSPACE_FILE, LAYER_FILE, NAMESPACE_FILE,
    WORKSPACES_DIR, WORKSPACE_FILE,
};
use crate::pipeline::{Stage, StageContext};
use crate::Result;
use async_trait::async_trait;
use carto_catalog::{
    LayerGroupInfo, LayerInfo, NamespaceInfo, ResourceEntry, ResourceInfo, ResourceKind,
    StoreInfo, StoreKind, StyleInfo, WorkspaceInfo,
};
use tracing::debug;

pub struct CatalogStage;

#[async_trait]
impl Stage for CatalogStage {
    fn name(&self) -> &'static str {
        "catalog"
    }

    async fn run(&self, ctx: &StageContext) -> Result<()> {
        if ctx.is_restore() {
            self.restore(ctx).await
        } else {
            self.backup(ctx).await
        }
    }
}

fn dirs_only(e: &ResourceEntry) -> bool {
    e.is_dir
}

fn entity_files(e: &ResourceEntry) -> bool {
    !e.is_dir && e.name.ends_with(".json")
}

impl CatalogStage {
    // ---- backup ------------------------------------------------------

    async fn backup(&self, ctx: &StageContext) -> Result<()> {
        for ws in ctx.catalog.workspaces() {
            if let Err(e) = self.backup_workspace(ctx, &ws).await {
                ctx.handle_entity_error(&format!("workspace {}", ws.name), e)?;
            }
        }
        self.backup_styles(ctx, None).await?;
        self.backup_layer_groups(ctx, None).await?;
        debug!(
            execution = ctx.execution.id(),
            workspaces = ctx.catalog.workspace_count(),
            layers = ctx.catalog.layer_count(),
            "catalog written"
        );
        Ok(())
    }

    async fn backup_workspace(&self, ctx: &StageContext, ws: &WorkspaceInfo) -> Result<()> {
        let staging = ctx.staging.as_ref();
        let ws_dir = layout::workspace_dir(&ws.name);
        ctx.codec.write(staging, &ws_dir, WORKSPACE_FILE, ws).await?;
        if let Some(ns) = ctx.catalog.namespace(&ws.name) {
            ctx.codec.write(staging, &ws_dir, NAMESPACE_FILE, &ns).await?;
        }

        for store in ctx.catalog.stores_by_workspace(&ws.name) {
            if let Err(e) = self.backup_store(ctx, &store).await {
                ctx.handle_entity_error(
                    &format!("store {}:{}", store.workspace, store.name),
                    e,
                )?;
            }
        }

        self.backup_styles(ctx, Some(&ws.name)).await?;
        self.backup_layer_groups(ctx, Some(&ws.name)).await?;
        Ok(())
    }

    async fn backup_store(&self, ctx: &StageContext, store: &StoreInfo) -> Result<()> {
        let staging = ctx.staging.as_ref();
        let store_dir = layout::store_dir(&store.workspace, store.kind, &store.name);
        ctx.codec.write(staging, &store_dir, store.kind.file_name(), store).await?;

        for resource in ctx.catalog.resources_by_store(&store.workspace, &store.name) {
            let res_dir =
                layout::resource_dir(&store.workspace, store.kind, &store.name, &resource.name);
            ctx.codec
                .write(staging, &res_dir, resource.kind.file_name(), &resource)
                .await?;
            // one published layer per resource directory
            for layer in ctx.catalog.layers_by_resource(&resource.workspace, &resource.name) {
                ctx.codec.write(staging, &res_dir, LAYER_FILE, &layer).await?;
            }
        }
        Ok(())
    }

    async fn backup_styles(&self, ctx: &StageContext, workspace: Option<&str>) -> Result<()> {
        let staging = ctx.staging.as_ref();
        let dir = layout::styles_dir(workspace);
        for style in ctx.catalog.styles_by_workspace(workspace) {
            let file = format!("{}.json", style.name);
            if let Err(e) = ctx.codec.write(staging, &dir, &file, &style).await {
                ctx.handle_entity_error(&format!("style {}", style.name), e.into())?;
                continue;
            }
            // carry the style definition document alongside the entity
            let definition = format!("{dir}/{}", style.filename);
            let live = ctx.facade.data_store();
            if live.exists(&definition).await {
                if let Ok(data) = live.read(&definition).await {
                    staging.write(&definition, data).await?;
                }
            }
        }
        Ok(())
    }

    async fn backup_layer_groups(
        &self,
        ctx: &StageContext,
        workspace: Option<&str>,
    ) -> Result<()> {
        let staging = ctx.staging.as_ref();
        let dir = layout::layer_groups_dir(workspace);
        for group in ctx.catalog.layer_groups_by_workspace(workspace) {
            let file = format!("{}.json", group.name);
            if let Err(e) = ctx.codec.write(staging, &dir, &file, &group).await {
                ctx.handle_entity_error(&format!("layer group {}", group.name), e.into())?;
            }
        }
        Ok(())
    }

    // ---- restore -----------------------------------------------------

    async fn restore(&self, ctx: &StageContext) -> Result<()> {
        let staging = ctx.staging.as_ref();
        let workspaces = staging.list(WORKSPACES_DIR, &dirs_only).await?;

        // dependency order: every pass only references entities inserted
        // by an earlier pass
        for entry in &workspaces {
            self.restore_workspace(ctx, &entry.path, &entry.name).await?;
        }
        for entry in &workspaces {
            self.restore_stores(ctx, &entry.path).await?;
        }
        for entry in &workspaces {
            self.restore_resources(ctx, &entry.path).await?;
        }
        self.restore_styles(ctx, None).await?;
        for entry in &workspaces {
            self.restore_styles(ctx, Some(&entry.name)).await?;
        }
        for entry in &workspaces {
            self.restore_layers(ctx, &entry.path).await?;
        }
        self.restore_layer_groups(ctx, None).await?;
        for entry in &workspaces {
            self.restore_layer_groups(ctx, Some(&entry.name)).await?;
        }
        self.restore_defaults(ctx).await?;

        debug!(
            execution = ctx.execution.id(),
            workspaces = ctx.catalog.workspace_count(),
            layers = ctx.catalog.layer_count(),
            "working catalog rebuilt"
        );
        Ok(())
    }

    async fn restore_workspace(&self, ctx: &StageContext, ws_dir: &str, name: &str) -> Result<()> {
        let staging = ctx.staging.as_ref();
        match ctx.codec.read::<WorkspaceInfo>(staging, ws_dir, WORKSPACE_FILE).await {
            Ok(ws) => {
                if let Err(e) = ctx.catalog.add_workspace(ws) {
                    ctx.handle_entity_error(&format!("workspace {name}"), e.into())?;
                }
            }
            Err(e) => ctx.handle_entity_error(&format!("workspace {name}"), e.into())?,
        }
        let ns_path = format!("{ws_dir}/{NAMESPACE_FILE}");
        if staging.exists(&ns_path).await {
            match ctx.codec.read::<NamespaceInfo>(staging, ws_dir, NAMESPACE_FILE).await {
                Ok(ns) => {
                    if let Err(e) = ctx.catalog.add_namespace(ns) {
                        ctx.handle_entity_error(&format!("namespace {name}"), e.into())?;
                    }
                }
                Err(e) => ctx.handle_entity_error(&format!("namespace {name}"), e.into())?,
            }
        }
        Ok(())
    }

    async fn restore_stores(&self, ctx: &StageContext, ws_dir: &str) -> Result<()> {
        let staging = ctx.staging.as_ref();
        for kind in [StoreKind::Data, StoreKind::Coverage] {
            let kind_dir = format!("{ws_dir}/{}", kind.dir_name());
            for entry in staging.list(&kind_dir, &dirs_only).await? {
                match ctx.codec.read::<StoreInfo>(staging, &entry.path, kind.file_name()).await {
                    Ok(store) => {
                        if let Err(e) = ctx.catalog.add_store(store) {
                            ctx.handle_entity_error(&format!("store {}", entry.name), e.into())?;
                        }
                    }
                    Err(e) => {
                        ctx.handle_entity_error(&format!("store {}", entry.name), e.into())?
                    }
                }
            }
        }
        Ok(())
    }

    async fn restore_resources(&self, ctx: &StageContext, ws_dir: &str) -> Result<()> {
        let staging = ctx.staging.as_ref();
        for (kind_dir, res_kind) in [
            (StoreKind::Data.dir_name(), ResourceKind::FeatureType),
            (StoreKind::Coverage.dir_name(), ResourceKind::Coverage),
        ] {
            let kind_path = format!("{ws_dir}/{kind_dir}");
            for store_entry in staging.list(&kind_path, &dirs_only).await? {
                for res_entry in staging.list(&store_entry.path, &dirs_only).await? {
                    match ctx
                        .codec
                        .read::<ResourceInfo>(staging, &res_entry.path, res_kind.file_name())
                        .await
                    {
                        Ok(resource) => {
                            if let Err(e) = ctx.catalog.add_resource(resource) {
                                ctx.handle_entity_error(
                                    &format!("resource {}", res_entry.name),
                                    e.into(),
                                )?;
                            }
                        }
                        Err(e) => ctx.handle_entity_error(
                            &format!("resource {}", res_entry.name),
                            e.into(),
                        )?,
                    }
                }
            }
        }
        Ok(())
    }

    async fn restore_styles(&self, ctx: &StageContext, workspace: Option<&str>) -> Result<()> {
        let staging = ctx.staging.as_ref();
        let dir = layout::styles_dir(workspace);
        for entry in staging.list(&dir, &entity_files).await? {
            match ctx.codec.read::<StyleInfo>(staging, &dir, &entry.name).await {
                Ok(style) => {
                    if let Err(e) = ctx.catalog.add_style(style) {
                        ctx.handle_entity_error(&format!("style {}", entry.name), e.into())?;
                    }
                }
                Err(e) => ctx.handle_entity_error(&format!("style {}", entry.name), e.into())?,
            }
        }
        Ok(())
    }

    async fn restore_layers(&self, ctx: &StageContext, ws_dir: &str) -> Result<()> {
        let staging = ctx.staging.as_ref();
        for kind in [StoreKind::Data, StoreKind::Coverage] {
            let kind_dir = format!("{ws_dir}/{}", kind.dir_name());
            for store_entry in staging.list(&kind_dir, &dirs_only).await? {
                for res_entry in staging.list(&store_entry.path, &dirs_only).await? {
                    let layer_path = format!("{}/{LAYER_FILE}", res_entry.path);
                    if !staging.exists(&layer_path).await {
                        continue;
                    }
                    match ctx.codec.read::<LayerInfo>(staging, &res_entry.path, LAYER_FILE).await {
                        Ok(layer) => {
                            if let Err(e) = ctx.catalog.add_layer(layer) {
                                ctx.handle_entity_error(
                                    &format!("layer {}", res_entry.name),
                                    e.into(),
                                )?;
                            }
                        }
                        Err(e) => ctx
                            .handle_entity_error(&format!("layer {}", res_entry.name), e.into())?,
                    }
                }
            }
        }
        Ok(())
    }

    async fn restore_layer_groups(
        &self,
        ctx: &StageContext,
        workspace: Option<&str>,
    ) -> Result<()> {
        let staging = ctx.staging.as_ref();
        let dir = layout::layer_groups_dir(workspace);
        for entry in staging.list(&dir, &entity_files).await? {
            match ctx.codec.read::<LayerGroupInfo>(staging, &dir, &entry.name).await {
                Ok(group) => {
                    if let Err(e) = ctx.catalog.add_layer_group(group) {
                        ctx.handle_entity_error(
                            &format!("layer group {}", entry.name),
                            e.into(),
                        )?;
                    }
                }
                Err(e) => {
                    ctx.handle_entity_error(&format!("layer group {}", entry.name), e.into())?
                }
            }
        }
        Ok(())
    }

    /// Applies the default workspace/namespace markers written by the
    /// global stage, now that the workspaces exist.
    async fn restore_defaults(&self, ctx: &StageContext) -> Result<()> {
        let staging = ctx.staging.as_ref();
        let ws_marker = format!("{WORKSPACES_DIR}/{DEFAULT_WORKSPACE_FILE}");
        if staging.exists(&ws_marker).await {
            match ctx
                .codec
                .read::<WorkspaceInfo>(staging, WORKSPACES_DIR, DEFAULT_WORKSPACE_FILE)
                .await
            {
                Ok(ws) => {
                    if let Err(e) = ctx.catalog.set_default_workspace(&ws.name) {
                        ctx.handle_entity_error("default workspace", e.into())?;
                    }
                }
                Err(e) => ctx.handle_entity_error("default workspace", e.into())?,
            }
        }
        let ns_marker = format!("{WORKSPACES_DIR}/{DEFAULT_NAMESPACE_FILE}");
        if staging.exists(&ns_marker).await {
            match ctx
                .codec
                .read::<NamespaceInfo>(staging, WORKSPACES_DIR, DEFAULT_NAMESPACE_FILE)
                .await
            {
                Ok(ns) => {
                    if let Err(e) = ctx.catalog.set_default_namespace(&ns.prefix) {
                        ctx.handle_entity_error("default namespace", e.into())?;
                    }
                }
                Err(e) => ctx.handle_entity_error("default namespace", e.into())?,
            }
        }
        Ok(())
    }
}
