//! Service-wide configuration.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Serialize;

use crate::{ConfigError, ConfigResult};

/// Service-wide configuration.
#[derive(Debug, Clone, Parser, Serialize)]
#[command(name = "buildhook-server")]
#[command(about = "Container image build trigger service", long_about = None)]
pub struct ServiceConfig {
    /// Port the HTTP server listens on
    #[arg(long, env = "SERVER_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Docker engine endpoint (unix://, tcp:// or http://)
    #[arg(long, env = "DOCKER_HOST", default_value = "unix:///var/run/docker.sock")]
    pub docker_host: String,

    /// Directory holding cert.pem, key.pem and ca.pem for a TLS engine connection
    #[arg(long, env = "DOCKER_CERT_PATH")]
    pub docker_cert_path: Option<PathBuf>,

    /// Registry images are pushed to
    #[arg(long, env = "DOCKER_REGISTRY_ADDR", default_value = "")]
    pub registry_addr: String,

    /// Chat notification endpoint; notifications are disabled when empty
    #[arg(long, env = "WATCH_CENTER_URL", default_value = "")]
    pub watch_center_url: String,

    /// Domain used to build the registry identity e-mail (`username@domain`)
    #[arg(long, env = "EMAIL", default_value = "example.com")]
    pub email_domain: String,

    /// Base URL of the build history page linked from notifications
    #[arg(long, env = "BUILD_HISTORY_URL", default_value = "")]
    pub build_history_url: String,

    /// Scheme used to reach the source host API
    #[arg(long, env = "SOURCE_SCHEME", default_value = "https")]
    pub source_scheme: String,
}

/// How to reach the Docker engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerEndpoint {
    Unix(String),
    Http(String),
    Tls { addr: String, tls: DockerTls },
}

/// TLS material for the Docker engine connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerTls {
    pub cert: PathBuf,
    pub key: PathBuf,
    pub ca: PathBuf,
}

impl DockerTls {
    /// TLS files laid out the way the docker CLI expects them.
    pub fn from_dir(dir: &Path) -> Self {
        Self {
            cert: dir.join("cert.pem"),
            key: dir.join("key.pem"),
            ca: dir.join("ca.pem"),
        }
    }
}

impl ServiceConfig {
    /// Check values clap cannot validate on its own.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "port".to_string(),
                message: "must be non-zero".to_string(),
            });
        }
        if self.docker_host.is_empty() {
            return Err(ConfigError::MissingField("docker_host".to_string()));
        }
        self.docker_endpoint()?;
        if !matches!(self.source_scheme.as_str(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                field: "source_scheme".to_string(),
                message: format!("unsupported scheme '{}'", self.source_scheme),
            });
        }
        Ok(())
    }

    /// Resolve the Docker engine endpoint from the host and optional cert dir.
    pub fn docker_endpoint(&self) -> ConfigResult<DockerEndpoint> {
        let host = self.docker_host.as_str();

        if host.starts_with("unix://") || host.starts_with('/') {
            return Ok(DockerEndpoint::Unix(host.to_string()));
        }

        let remote = ["tcp://", "http://", "https://"];
        if !remote.iter().any(|scheme| host.starts_with(scheme)) {
            return Err(ConfigError::InvalidValue {
                field: "docker_host".to_string(),
                message: format!("unsupported docker host '{}'", host),
            });
        }

        match &self.docker_cert_path {
            Some(dir) if !dir.as_os_str().is_empty() => Ok(DockerEndpoint::Tls {
                addr: host.to_string(),
                tls: DockerTls::from_dir(dir),
            }),
            _ => Ok(DockerEndpoint::Http(host.to_string())),
        }
    }

    /// Whether chat notifications are configured.
    pub fn chat_enabled(&self) -> bool {
        !self.watch_center_url.is_empty()
    }
}
