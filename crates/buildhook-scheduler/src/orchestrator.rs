//! Build pipeline - runs checkout, build and push for one request.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use buildhook_core::{
    BuildLog, BuildResult, BuildSpec, Error, ImageBuilder, Reporter, SourceCheckout, Stage,
    StageFailure,
};
use futures::FutureExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::push::{PushCoordinator, PushTask};

/// Sequences the stages of a build and owns its lifecycle.
pub struct BuildPipeline {
    checkout: Arc<dyn SourceCheckout>,
    builder: Arc<dyn ImageBuilder>,
    pushes: Arc<PushCoordinator>,
    reporter: Arc<dyn Reporter>,
    /// Parent directory for workspaces; the system temp dir when unset
    workspace_root: Option<PathBuf>,
}

impl BuildPipeline {
    pub fn new(
        checkout: Arc<dyn SourceCheckout>,
        builder: Arc<dyn ImageBuilder>,
        pushes: Arc<PushCoordinator>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            checkout,
            builder,
            pushes,
            reporter,
            workspace_root: None,
        }
    }

    /// Create workspaces under the given directory instead of the system temp dir.
    pub fn with_workspace_root(mut self, root: PathBuf) -> Self {
        self.workspace_root = Some(root);
        self
    }

    pub fn push_coordinator(&self) -> &Arc<PushCoordinator> {
        &self.pushes
    }

    /// Run a build as an independent task.
    pub fn spawn(self: &Arc<Self>, spec: BuildSpec) -> JoinHandle<BuildResult> {
        let pipeline = self.clone();
        tokio::spawn(async move { pipeline.run(spec).await })
    }

    /// Run a build to completion.
    ///
    /// Exactly one terminal report is delivered, whichever stage fails.
    pub async fn run(&self, spec: BuildSpec) -> BuildResult {
        let spec = Arc::new(spec);
        let mut result = BuildResult::pending(spec.clone());

        info!(
            build_id = %spec.build_id,
            image = %result.docker_image_name,
            git_ref = %spec.ref_name,
            "Build started"
        );

        if spec.chat_channel.is_some() {
            self.reporter.build_started(&spec).await;
        }

        let log = BuildLog::new(spec.build_id.clone());

        match self.execute(&spec, &log).await {
            Ok(()) => {
                info!(
                    build_id = %spec.build_id,
                    image = %result.docker_image_name,
                    "Build succeeded"
                );
                result.succeed(log.contents());
            }
            Err(failure) => {
                error!(
                    build_id = %spec.build_id,
                    stage = %failure.stage,
                    error = %failure.error,
                    "Build failed"
                );
                result.fail(&failure, log.contents());
            }
        }

        self.reporter.report(&result).await;
        result
    }

    /// Run the stages in order, stopping at the first failure.
    ///
    /// The workspace is dropped, and so removed, when this returns or unwinds.
    async fn execute(&self, spec: &Arc<BuildSpec>, log: &BuildLog) -> Result<(), StageFailure> {
        let workspace = self
            .create_workspace(spec)
            .map_err(|e| StageFailure::new(Stage::Checkout, e))?;

        guarded(
            spec,
            Stage::Checkout,
            self.checkout.checkout(spec, workspace.path(), log),
        )
        .await?;

        guarded(
            spec,
            Stage::Build,
            self.builder.build(spec, workspace.path(), log),
        )
        .await?;

        let (task, completion) = PushTask::new(spec.clone(), log.clone());
        self.pushes.submit(task);
        completion
            .wait()
            .await
            .map_err(|e| StageFailure::new(Stage::Push, e))?;

        Ok(())
    }

    fn create_workspace(&self, spec: &BuildSpec) -> Result<TempDir, Error> {
        let prefix = format!("docker{}-", sanitize(spec.build_id.as_str()));
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);

        let workspace = match &self.workspace_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(workspace)
    }
}

/// Await one stage, turning a panic into a failure of that stage.
///
/// Push panics are caught by the lane worker instead.
async fn guarded<F>(spec: &BuildSpec, stage: Stage, fut: F) -> Result<(), StageFailure>
where
    F: Future<Output = buildhook_core::Result<()>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(outcome) => outcome.map_err(|e| StageFailure::new(stage, e)),
        Err(_) => {
            error!(build_id = %spec.build_id, stage = %stage, "Stage panicked");
            Err(StageFailure::new(
                stage,
                Error::Internal(format!("{} panicked", stage)),
            ))
        }
    }
}

/// Keep only characters that are safe in a directory name.
fn sanitize(id: &str) -> String {
    id.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .take(64)
        .collect()
}
