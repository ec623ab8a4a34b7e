//! Docker engine backend for image build and push.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bollard::auth::DockerCredentials;
use bollard::image::{BuildImageOptions, PushImageOptions};
use bollard::models::{BuildInfo, PushImageInfo};
use bollard::{API_DEFAULT_VERSION, Docker};
use buildhook_core::{BuildLog, BuildSpec, Error, ImageBuilder, ImagePusher, Result};
use bytes::Bytes;
use futures::StreamExt;
use tracing::info;

use crate::context;

/// Request timeout for engine calls. Builds and pushes stream for a long time.
const ENGINE_TIMEOUT_SECS: u64 = 60 * 60;

/// Builds and pushes images through a Docker engine.
pub struct DockerEngine {
    docker: Docker,
    email_domain: String,
}

impl DockerEngine {
    /// Connect over a unix socket, e.g. `unix:///var/run/docker.sock`.
    pub fn connect_unix(addr: &str, email_domain: impl Into<String>) -> Result<Self> {
        let docker = Docker::connect_with_unix(addr, ENGINE_TIMEOUT_SECS, API_DEFAULT_VERSION)
            .map_err(|e| Error::Internal(format!("docker client: {}", e)))?;
        Ok(Self::with_client(docker, email_domain))
    }

    /// Connect over plain TCP, e.g. `tcp://docker:2375`.
    pub fn connect_http(addr: &str, email_domain: impl Into<String>) -> Result<Self> {
        let docker = Docker::connect_with_http(addr, ENGINE_TIMEOUT_SECS, API_DEFAULT_VERSION)
            .map_err(|e| Error::Internal(format!("docker client: {}", e)))?;
        Ok(Self::with_client(docker, email_domain))
    }

    /// Connect over TLS with client certificates.
    pub fn connect_tls(
        addr: &str,
        cert: &Path,
        key: &Path,
        ca: &Path,
        email_domain: impl Into<String>,
    ) -> Result<Self> {
        let docker = Docker::connect_with_ssl(
            addr,
            key,
            cert,
            ca,
            ENGINE_TIMEOUT_SECS,
            API_DEFAULT_VERSION,
        )
        .map_err(|e| Error::Internal(format!("docker client: {}", e)))?;
        Ok(Self::with_client(docker, email_domain))
    }

    /// Create with a custom Docker client.
    pub fn with_client(docker: Docker, email_domain: impl Into<String>) -> Self {
        Self {
            docker,
            email_domain: email_domain.into(),
        }
    }

    /// Registry identity for a push. This is the registry-side push key, not
    /// the source host token.
    fn credentials(&self, spec: &BuildSpec) -> DockerCredentials {
        DockerCredentials {
            username: Some(spec.push_key_id.clone()),
            password: Some(spec.push_key_password.clone()),
            email: Some(format!("{}@{}", spec.username, self.email_domain)),
            serveraddress: Some(spec.registry.clone()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ImageBuilder for DockerEngine {
    async fn build(&self, spec: &BuildSpec, workspace: &Path, log: &BuildLog) -> Result<()> {
        let dockerfile = workspace.join(spec.dockerfile_path()?);
        if !tokio::fs::try_exists(&dockerfile).await.unwrap_or(false) {
            return Err(Error::DockerfileMissing(dockerfile));
        }

        let context_dir: PathBuf = dockerfile
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| workspace.to_path_buf());
        let context = tokio::task::spawn_blocking(move || context::archive_dir(&context_dir))
            .await
            .map_err(|e| Error::BuildFailed(format!("packaging build context failed: {}", e)))??;

        let tag = spec.image_name_with_tag();
        info!(build_id = %spec.build_id, image = %tag, "Building image");

        let options = BuildImageOptions {
            dockerfile: spec.dockerfile_name().to_string(),
            t: tag.clone(),
            buildargs: build_args(spec),
            nocache: true,
            pull: true,
            rm: true,
            forcerm: true,
            ..Default::default()
        };

        let mut stream = self
            .docker
            .build_image(options, None, Some(Bytes::from(context)));

        while let Some(msg) = stream.next().await {
            match msg {
                Ok(output) => record_build_output(output, log)?,
                Err(e) => return Err(Error::BuildFailed(e.to_string())),
            }
        }

        info!(build_id = %spec.build_id, image = %tag, "Image built");
        Ok(())
    }
}

#[async_trait]
impl ImagePusher for DockerEngine {
    async fn push(&self, spec: &BuildSpec, log: &BuildLog) -> Result<()> {
        let image = spec.image_name();
        info!(build_id = %spec.build_id, image = %image, tag = %spec.image_tag, "Pushing image");

        let options = PushImageOptions {
            tag: spec.image_tag.clone(),
        };
        let mut stream = self
            .docker
            .push_image(&image, Some(options), Some(self.credentials(spec)));

        while let Some(msg) = stream.next().await {
            match msg {
                Ok(output) => record_push_output(output, log)?,
                Err(e) => return Err(Error::PushFailed(e.to_string())),
            }
        }

        info!(build_id = %spec.build_id, image = %image, "Image pushed");
        Ok(())
    }
}

/// Build args in the engine's map form. A repeated name keeps its last value.
fn build_args(spec: &BuildSpec) -> HashMap<String, String> {
    spec.build_args
        .iter()
        .map(|arg| (arg.name.clone(), arg.value.clone()))
        .collect()
}

/// Copy one build progress message into the log, failing on engine errors.
fn record_build_output(output: BuildInfo, log: &BuildLog) -> Result<()> {
    if let Some(stream) = output.stream {
        log.append(&stream);
    }

    if let Some(error) = output.error {
        log.append_line(&error);
        return Err(Error::BuildFailed(error));
    }

    if let Some(detail) = output.error_detail {
        let message = detail
            .message
            .unwrap_or_else(|| "unknown build error".to_string());
        log.append_line(&message);
        return Err(Error::BuildFailed(message));
    }

    if let Some(status) = output.status {
        log.append_line(&status);
    }

    Ok(())
}

/// Copy one push progress message into the log, failing on registry errors.
fn record_push_output(output: PushImageInfo, log: &BuildLog) -> Result<()> {
    if let Some(error) = output.error {
        log.append_line(&error);
        return Err(Error::PushFailed(error));
    }

    if let Some(status) = output.status {
        // Per-layer progress ticks are noise in the captured log
        if !matches!(status.as_str(), "Pushing" | "Preparing" | "Waiting") {
            log.append_line(&status);
        }
    }

    Ok(())
}
