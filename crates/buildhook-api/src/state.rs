//! Application state.

use std::sync::Arc;

use buildhook_config::{DockerEndpoint, ServiceConfig};
use buildhook_core::{Error, Result};
use buildhook_executor::{DockerEngine, GitCheckout, SourceHostClient};
use buildhook_scheduler::{BuildPipeline, PushCoordinator};

use crate::services::WebhookReporter;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub pipeline: Arc<BuildPipeline>,
}

impl AppState {
    pub fn new(config: ServiceConfig, pipeline: Arc<BuildPipeline>) -> Self {
        Self {
            config: Arc::new(config),
            pipeline,
        }
    }

    /// Wire the production collaborators from configuration.
    pub fn from_config(config: ServiceConfig) -> Result<Self> {
        let endpoint = config
            .docker_endpoint()
            .map_err(|e| Error::InvalidInput(e.to_string()))?;
        let email_domain = config.email_domain.clone();

        let engine = Arc::new(match endpoint {
            DockerEndpoint::Unix(addr) => DockerEngine::connect_unix(&addr, email_domain)?,
            DockerEndpoint::Http(addr) => DockerEngine::connect_http(&addr, email_domain)?,
            DockerEndpoint::Tls { addr, tls } => {
                DockerEngine::connect_tls(&addr, &tls.cert, &tls.key, &tls.ca, email_domain)?
            }
        });

        let http = reqwest::Client::new();
        let checkout = Arc::new(GitCheckout::new(SourceHostClient::with_client(
            http.clone(),
            config.source_scheme.clone(),
        )));
        let pushes = Arc::new(PushCoordinator::new(engine.clone()));
        let reporter = Arc::new(WebhookReporter::from_config(http, &config));

        let pipeline = Arc::new(BuildPipeline::new(checkout, engine, pushes, reporter));
        Ok(Self::new(config, pipeline))
    }
}
