//! Build pipeline orchestration for buildhook.
//!
//! Runs checkout, build and push for each request and serializes registry
//! pushes per image name through per-image lanes.

pub mod orchestrator;
pub mod push;
pub mod worker;

pub use orchestrator::BuildPipeline;
pub use push::{PushCompletion, PushCoordinator, PushTask};
pub use worker::LaneWorker;
