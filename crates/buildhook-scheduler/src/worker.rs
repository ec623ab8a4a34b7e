//! Lane worker that drains one image's push queue.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use buildhook_core::{Error, ImagePusher};
use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::push::PushTask;

/// Executes the pushes of one lane, one at a time, oldest first.
pub struct LaneWorker {
    image_name: String,
    pusher: Arc<dyn ImagePusher>,
    queue: mpsc::UnboundedReceiver<PushTask>,
}

impl LaneWorker {
    pub fn new(
        image_name: String,
        pusher: Arc<dyn ImagePusher>,
        queue: mpsc::UnboundedReceiver<PushTask>,
    ) -> Self {
        Self {
            image_name,
            pusher,
            queue,
        }
    }

    /// Run the worker loop.
    ///
    /// The lane's sender lives in the coordinator's registry for the life of
    /// the process, so in practice this loop never ends.
    pub async fn run(mut self) {
        info!(image = %self.image_name, "Starting push lane worker");

        while let Some(task) = self.queue.recv().await {
            let build_id = task.spec.build_id.clone();
            info!(image = %self.image_name, build_id = %build_id, "Push started");

            let outcome = AssertUnwindSafe(self.pusher.push(&task.spec, &task.log))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    error!(image = %self.image_name, build_id = %build_id, "Push panicked");
                    Err(Error::PushFailed("push panicked".to_string()))
                });

            match &outcome {
                Ok(()) => info!(image = %self.image_name, build_id = %build_id, "Push finished"),
                Err(e) => warn!(
                    image = %self.image_name,
                    build_id = %build_id,
                    error = %e,
                    "Push failed"
                ),
            }

            task.complete(outcome);
        }

        info!(image = %self.image_name, "Push lane closed");
    }
}
