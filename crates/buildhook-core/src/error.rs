//! Error types for buildhook.

use std::path::PathBuf;

use thiserror::Error;

use crate::stage::Stage;

#[derive(Debug, Error)]
pub enum Error {
    #[error("repository lookup failed: {0}")]
    LookupFailed(String),

    #[error("checkout failed: {0}")]
    CheckoutFailed(String),

    #[error("invalid submodule spec: {0}")]
    SubmoduleSpecInvalid(String),

    #[error("dockerfile missing: stat {}: no such file or directory", .0.display())]
    DockerfileMissing(PathBuf),

    #[error("image build failed: {0}")]
    BuildFailed(String),

    #[error("image push failed: {0}")]
    PushFailed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A stage error annotated with the stage it came from.
#[derive(Debug, Error)]
#[error("{stage} stage: {error}")]
pub struct StageFailure {
    pub stage: Stage,
    #[source]
    pub error: Error,
}

impl StageFailure {
    pub fn new(stage: Stage, error: Error) -> Self {
        Self { stage, error }
    }
}
