//! Service configuration for buildhook.
//!
//! The configuration is read once at startup from command-line flags and
//! environment variables and handed to each component's constructor.

pub mod error;
pub mod system;

pub use error::{ConfigError, ConfigResult};
pub use system::{DockerEndpoint, DockerTls, ServiceConfig};
