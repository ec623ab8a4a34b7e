//! Checkout, image build and push backends for buildhook.
//!
//! Provides the concrete stage implementations:
//! - Git checkout through the `git` command line
//! - Source host repository lookup over its REST API
//! - Docker engine image build and registry push

pub mod context;
pub mod docker;
pub mod git;
pub mod github;

pub use docker::DockerEngine;
pub use git::GitCheckout;
pub use github::SourceHostClient;
