//! Plugin configuration stage.

use crate::pipeline::{Stage, StageContext};
use crate::Result;
use async_trait::async_trait;
use tracing::debug;

/// Runs last: hands each registered plugin provider the staging tree so
/// it can save (backup) or validate (restore) its own configuration
/// files.
pub struct PluginStage;

#[async_trait]
impl Stage for PluginStage {
    fn name(&self) -> &'static str {
        "plugins"
    }

    async fn run(&self, ctx: &StageContext) -> Result<()> {
        let live = ctx.facade.data_store();
        for provider in ctx.facade.plugins() {
            let result = if ctx.is_restore() {
                provider.load_configuration(ctx.staging.as_ref()).await
            } else {
                provider.save_configuration(live.as_ref(), ctx.staging.as_ref()).await
            };
            if let Err(e) = result {
                ctx.handle_entity_error(&format!("plugin {}", provider.name()), e.into())?;
            }
        }
        debug!(
            execution = ctx.execution.id(),
            plugins = ctx.facade.plugins().len(),
            "plugin configurations processed"
        );
        Ok(())
    }
}
