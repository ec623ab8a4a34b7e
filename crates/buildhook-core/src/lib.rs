//! Core domain types and traits for the buildhook image build service.
//!
//! This crate contains:
//! - Build identifiers
//! - The build request (`BuildSpec`) and its outcome (`BuildResult`)
//! - The per-build log capture buffer
//! - Stage traits implemented by the checkout, build and push backends
//! - The result reporter trait

pub mod build;
pub mod error;
pub mod id;
pub mod log;
pub mod report;
pub mod stage;

pub use build::{BuildArg, BuildResult, BuildSpec, GitRefKind};
pub use error::{Error, Result, StageFailure};
pub use id::BuildId;
pub use log::BuildLog;
pub use report::Reporter;
pub use stage::{ImageBuilder, ImagePusher, SourceCheckout, Stage};
