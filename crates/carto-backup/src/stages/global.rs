//! Global configuration stage.
//!
//! Handles the configuration that sits outside the workspace hierarchy:
//! global info, settings, logging, service configurations (global and
//! workspace-local) and the default workspace/namespace markers. On
//! restore the stage populates the detached working configuration; the
//! default markers are applied later by the catalog stage, once the
//! workspaces they point at exist.

use crate::layout::{
    self, DEFAULT_NAMESPACE_FILE, DEFAULT_WORKSPACE_FILE, GLOBAL_FILE, LOGGING_FILE,
    SERVICES_DIR, SETTINGS_FILE, WORKSPACES_DIR,
};
use crate::pipeline::{Stage, StageContext};
use crate::Result;
use async_trait::async_trait;
use carto_catalog::{GlobalInfo, LoggingInfo, ResourceEntry, ServiceInfo, SettingsInfo};
use tracing::debug;

pub struct GlobalStage;

#[async_trait]
impl Stage for GlobalStage {
    fn name(&self) -> &'static str {
        "global"
    }

    async fn run(&self, ctx: &StageContext) -> Result<()> {
        if ctx.is_restore() {
            self.restore(ctx).await
        } else {
            self.backup(ctx).await
        }
    }
}

impl GlobalStage {
    async fn backup(&self, ctx: &StageContext) -> Result<()> {
        let staging = ctx.staging.as_ref();
        let codec = &ctx.codec;

        codec.write(staging, "", GLOBAL_FILE, &ctx.config.global()).await?;
        if let Some(settings) = ctx.config.settings(None) {
            codec.write(staging, "", SETTINGS_FILE, &settings).await?;
        }
        codec.write(staging, "", LOGGING_FILE, &ctx.config.logging()).await?;

        for loader in ctx.facade.service_loaders().loaders() {
            if let Some(service) = ctx.config.service(None, loader.type_id()) {
                if let Err(e) = loader.save(&service, staging, SERVICES_DIR).await {
                    ctx.handle_entity_error(&format!("service {}", loader.type_id()), e.into())?;
                }
            }
        }

        if let Some(ws) = ctx.catalog.default_workspace() {
            codec.write(staging, WORKSPACES_DIR, DEFAULT_WORKSPACE_FILE, &ws).await?;
        }
        if let Some(ns) = ctx.catalog.default_namespace() {
            codec.write(staging, WORKSPACES_DIR, DEFAULT_NAMESPACE_FILE, &ns).await?;
        }

        for ws in ctx.catalog.workspaces() {
            if let Some(settings) = ctx.config.settings(Some(&ws.name)) {
                codec
                    .write(staging, &layout::workspace_dir(&ws.name), SETTINGS_FILE, &settings)
                    .await?;
            }
            let services_dir = layout::workspace_services_dir(&ws.name);
            for loader in ctx.facade.service_loaders().loaders() {
                if let Some(service) = ctx.config.service(Some(&ws.name), loader.type_id()) {
                    if let Err(e) = loader.save(&service, staging, &services_dir).await {
                        ctx.handle_entity_error(
                            &format!("service {}:{}", ws.name, loader.type_id()),
                            e.into(),
                        )?;
                    }
                }
            }
        }

        debug!(execution = ctx.execution.id(), "global configuration written");
        Ok(())
    }

    async fn restore(&self, ctx: &StageContext) -> Result<()> {
        let staging = ctx.staging.as_ref();
        let codec = &ctx.codec;

        if staging.exists(GLOBAL_FILE).await {
            match codec.read::<GlobalInfo>(staging, "", GLOBAL_FILE).await {
                Ok(global) => ctx.config.set_global(global),
                Err(e) => ctx.handle_entity_error("global", e.into())?,
            }
        }
        if staging.exists(SETTINGS_FILE).await {
            match codec.read::<SettingsInfo>(staging, "", SETTINGS_FILE).await {
                Ok(settings) => ctx.config.set_settings(settings),
                Err(e) => ctx.handle_entity_error("settings", e.into())?,
            }
        }
        if staging.exists(LOGGING_FILE).await {
            match codec.read::<LoggingInfo>(staging, "", LOGGING_FILE).await {
                Ok(logging) => ctx.config.set_logging(logging),
                Err(e) => ctx.handle_entity_error("logging", e.into())?,
            }
        }

        self.restore_services(ctx, SERVICES_DIR, None).await?;

        for entry in staging.list(WORKSPACES_DIR, &|e: &ResourceEntry| e.is_dir).await? {
            let ws = entry.name.clone();
            let settings_path = format!("{}/{SETTINGS_FILE}", entry.path);
            if staging.exists(&settings_path).await {
                match codec
                    .read::<SettingsInfo>(staging, &entry.path, SETTINGS_FILE)
                    .await
                {
                    Ok(mut settings) => {
                        settings.workspace = Some(ws.clone());
                        ctx.config.set_settings(settings);
                    }
                    Err(e) => ctx.handle_entity_error(&format!("settings {ws}"), e.into())?,
                }
            }
            self.restore_services(ctx, &layout::workspace_services_dir(&ws), Some(&ws)).await?;
        }

        debug!(execution = ctx.execution.id(), "global configuration loaded");
        Ok(())
    }

    async fn restore_services(
        &self,
        ctx: &StageContext,
        dir: &str,
        workspace: Option<&str>,
    ) -> Result<()> {
        let staging = ctx.staging.as_ref();
        for entry in staging.list(dir, &|e: &ResourceEntry| !e.is_dir).await? {
            let Some(loader) = ctx.facade.service_loaders().by_filename(&entry.name) else {
                ctx.execution
                    .add_warning(format!("no service loader for {}", entry.path));
                continue;
            };
            match loader.load(staging, dir).await {
                Ok(service) => {
                    let service = ServiceInfo {
                        workspace: workspace.map(str::to_string),
                        ..service
                    };
                    ctx.config.set_service(service);
                }
                Err(e) => {
                    ctx.handle_entity_error(&format!("service {}", entry.path), e.into())?
                }
            }
        }
        Ok(())
    }
}
