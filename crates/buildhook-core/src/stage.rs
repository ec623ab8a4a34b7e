//! Pipeline stages and the traits their backends implement.
//!
//! A build runs checkout, build and push strictly in that order. Each stage
//! writes its output to the build's [`BuildLog`].

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{BuildLog, BuildSpec, Result};

/// One step of the build pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Checkout,
    Build,
    Push,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Checkout => write!(f, "checkout"),
            Stage::Build => write!(f, "build"),
            Stage::Push => write!(f, "push"),
        }
    }
}

/// Populates a workspace with the requested source revision.
#[async_trait]
pub trait SourceCheckout: Send + Sync {
    async fn checkout(&self, spec: &BuildSpec, workspace: &Path, log: &BuildLog) -> Result<()>;
}

/// Builds the image described by a spec from a checked-out workspace.
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    async fn build(&self, spec: &BuildSpec, workspace: &Path, log: &BuildLog) -> Result<()>;
}

/// Pushes a built image to its registry.
#[async_trait]
pub trait ImagePusher: Send + Sync {
    async fn push(&self, spec: &BuildSpec, log: &BuildLog) -> Result<()>;
}
