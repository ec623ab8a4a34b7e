//! Test doubles for the pipeline collaborators.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use buildhook_config::ServiceConfig;
use buildhook_core::{
    BuildArg, BuildId, BuildLog, BuildResult, BuildSpec, GitRefKind, ImageBuilder, ImagePusher,
    Reporter, Result, SourceCheckout,
};
use buildhook_scheduler::{BuildPipeline, PushCoordinator};
use tokio::sync::mpsc;

use crate::AppState;

pub struct NoopCheckout;

#[async_trait]
impl SourceCheckout for NoopCheckout {
    async fn checkout(&self, _spec: &BuildSpec, _workspace: &Path, log: &BuildLog) -> Result<()> {
        log.append_line("Cloning into workspace...");
        Ok(())
    }
}

pub struct NoopBuilder;

#[async_trait]
impl ImageBuilder for NoopBuilder {
    async fn build(&self, _spec: &BuildSpec, _workspace: &Path, log: &BuildLog) -> Result<()> {
        log.append_line("Successfully built 0123abcd");
        Ok(())
    }
}

pub struct NoopPusher;

#[async_trait]
impl ImagePusher for NoopPusher {
    async fn push(&self, _spec: &BuildSpec, _log: &BuildLog) -> Result<()> {
        Ok(())
    }
}

/// Hands every terminal result to the test.
pub struct ChannelReporter {
    pub results: mpsc::UnboundedReceiver<BuildResult>,
}

struct ChannelSink(mpsc::UnboundedSender<BuildResult>);

#[async_trait]
impl Reporter for ChannelSink {
    async fn build_started(&self, _spec: &BuildSpec) {}

    async fn report(&self, result: &BuildResult) {
        let _ = self.0.send(result.clone());
    }
}

/// Fixed configuration, independent of the process environment.
pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        port: 3000,
        docker_host: "unix:///var/run/docker.sock".to_string(),
        docker_cert_path: None,
        registry_addr: "registry.example.com".to_string(),
        watch_center_url: String::new(),
        email_domain: "example.com".to_string(),
        build_history_url: "http://history.example.com/builds".to_string(),
        source_scheme: "https".to_string(),
    }
}

pub fn test_state() -> (AppState, ChannelReporter) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pipeline = BuildPipeline::new(
        Arc::new(NoopCheckout),
        Arc::new(NoopBuilder),
        Arc::new(PushCoordinator::new(Arc::new(NoopPusher))),
        Arc::new(ChannelSink(tx)),
    );
    let state = AppState::new(test_config(), Arc::new(pipeline));
    (state, ChannelReporter { results: rx })
}

pub fn make_spec() -> BuildSpec {
    BuildSpec {
        build_id: BuildId::new("b-9"),
        username: "alice".to_string(),
        build_tag_id: 1,
        source_host: "github.example.com".to_string(),
        source_org: "org".to_string(),
        source_repo: "app".to_string(),
        source_token: "tok".to_string(),
        ref_kind: GitRefKind::Tag,
        ref_name: "v1.2.0".to_string(),
        dockerfile_location: String::new(),
        dockerfile_name: None,
        registry: "registry.example.com".to_string(),
        image_org: "org".to_string(),
        image_repo: "app".to_string(),
        image_tag: "v1.2.0".to_string(),
        push_key_id: "pusher".to_string(),
        push_key_password: "secret".to_string(),
        build_args: vec![BuildArg {
            name: "VERSION".to_string(),
            value: "1.2.0".to_string(),
        }],
        callback_url: String::new(),
        chat_channel: Some("4958".to_string()),
    }
}
