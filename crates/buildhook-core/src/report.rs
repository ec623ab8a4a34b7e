//! Result reporting.

use async_trait::async_trait;

use crate::{BuildResult, BuildSpec};

/// Delivers build notifications.
///
/// Delivery is best-effort: implementations log failures and never return
/// them, so notification problems cannot change a build's outcome.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Announce that a build has started.
    async fn build_started(&self, spec: &BuildSpec);

    /// Deliver the terminal result of a build.
    async fn report(&self, result: &BuildResult);
}
