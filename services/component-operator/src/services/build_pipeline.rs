use component_core::crds::BuildConfig;
use component_core::formatters::format_build_selector;
use component_core::models::{BuildStage, BuildState};
use kube::ResourceExt;
use tracing::{info, warn};

use crate::error::AppError;
use crate::services::build_inspector::inspect_build_state;
use crate::services::build_trigger::trigger_build;
use crate::services::cluster::Cluster;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitReason {
    BuildRunning,
    BuildTriggered(String),
    /// Trigger was skipped, e.g. the definition is not visible yet
    NotStarted,
    /// Builder image exists, the runtime stage rebuilds on its image-change trigger
    AwaitingImageChange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineVerdict {
    Ready { image: String },
    Waiting { stage: BuildStage, reason: WaitReason },
}

/// The two chained build stages of one component.
pub struct BuildPipeline<'a, C: ?Sized> {
    pub cluster: &'a C,
    pub component: &'a str,
    pub builder: &'a BuildConfig,
    pub runtime: &'a BuildConfig,
    pub actor: &'a str,
    /// False selects the legacy mode where the runtime stage is triggered directly
    pub image_change_trigger: bool,
}

impl<C> BuildPipeline<'_, C>
where
    C: Cluster + ?Sized,
{
    #[tracing::instrument(
        name = "build_pipeline.advance",
        skip_all,
        fields(component = %self.component),
        err
    )]
    pub async fn advance(&self) -> Result<PipelineVerdict, AppError> {
        let runtime_state = self.inspect(BuildStage::Runtime).await?;
        if let Some(image) = runtime_state.image.clone().filter(|_| runtime_state.image_exists) {
            return Ok(PipelineVerdict::Ready { image });
        }

        let builder_state = self.inspect(BuildStage::Builder).await?;
        if builder_state.build_running {
            return Ok(self.waiting(BuildStage::Builder, WaitReason::BuildRunning));
        }
        if !builder_state.image_exists {
            return self.trigger(BuildStage::Builder, &builder_state).await;
        }

        if runtime_state.build_running {
            return Ok(self.waiting(BuildStage::Runtime, WaitReason::BuildRunning));
        }
        if self.image_change_trigger {
            return Ok(self.waiting(BuildStage::Runtime, WaitReason::AwaitingImageChange));
        }
        self.trigger(BuildStage::Runtime, &runtime_state).await
    }

    fn definition(&self, stage: BuildStage) -> &BuildConfig {
        match stage {
            BuildStage::Builder => self.builder,
            BuildStage::Runtime => self.runtime,
        }
    }

    async fn inspect(&self, stage: BuildStage) -> Result<BuildState, AppError> {
        let definition = self.definition(stage);
        let selector = format_build_selector(self.component, stage);
        let state = inspect_build_state(self.cluster, definition, &selector).await?;

        if let Some(failure) = &state.last_failure {
            warn!(
                "⚠️ Last {} build {} of {} ended {}: {}",
                stage,
                failure.name,
                definition.name_any(),
                failure.phase,
                failure.message.as_deref().unwrap_or("no message")
            );
        }
        Ok(state)
    }

    async fn trigger(
        &self,
        stage: BuildStage,
        state: &BuildState,
    ) -> Result<PipelineVerdict, AppError> {
        let outcome = trigger_build(self.cluster, self.definition(stage), state, self.actor).await?;
        let reason = if outcome.started {
            WaitReason::BuildTriggered(outcome.build_name)
        } else {
            WaitReason::NotStarted
        };
        Ok(self.waiting(stage, reason))
    }

    fn waiting(&self, stage: BuildStage, reason: WaitReason) -> PipelineVerdict {
        info!("⏳ {} waiting on {} stage: {:?}", self.component, stage, reason);
        PipelineVerdict::Waiting { stage, reason }
    }
}
