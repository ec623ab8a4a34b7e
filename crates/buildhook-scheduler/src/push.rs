//! Push coordinator - serializes registry pushes per image name.
//!
//! Each image name gets a lane: an unbounded FIFO queue drained by exactly
//! one worker task. Pushes for the same image run one at a time in
//! submission order; pushes for different images run independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use buildhook_core::{BuildLog, BuildSpec, Error, ImagePusher, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::worker::LaneWorker;

/// A push waiting in a lane.
pub struct PushTask {
    /// Serialization key, `registry/org/repo`.
    pub image_name: String,
    pub spec: Arc<BuildSpec>,
    pub log: BuildLog,
    done: oneshot::Sender<Result<()>>,
}

impl PushTask {
    /// Create a task and the receiver its outcome will be delivered on.
    pub fn new(spec: Arc<BuildSpec>, log: BuildLog) -> (Self, PushCompletion) {
        let (done, rx) = oneshot::channel();
        let task = Self {
            image_name: spec.image_name(),
            spec,
            log,
            done,
        };
        (task, PushCompletion { rx })
    }

    /// Deliver the push outcome to the submitter.
    pub(crate) fn complete(self, outcome: Result<()>) {
        // The submitter may have gone away; nothing left to tell then
        let _ = self.done.send(outcome);
    }
}

/// Single-use signal fired when a submitted push finishes.
pub struct PushCompletion {
    rx: oneshot::Receiver<Result<()>>,
}

impl PushCompletion {
    /// Wait for the push to finish.
    pub async fn wait(self) -> Result<()> {
        self.rx
            .await
            .map_err(|_| Error::PushFailed("push lane dropped the task".to_string()))?
    }
}

type LaneSender = mpsc::UnboundedSender<PushTask>;

/// Registry of per-image push lanes.
pub struct PushCoordinator {
    pusher: Arc<dyn ImagePusher>,
    lanes: Mutex<HashMap<String, LaneSender>>,
}

impl PushCoordinator {
    pub fn new(pusher: Arc<dyn ImagePusher>) -> Self {
        Self {
            pusher,
            lanes: Mutex::new(HashMap::new()),
        }
    }

    /// Queue a push behind any in-flight or queued push for the same image.
    ///
    /// Returns once the task is accepted into its lane, not when the push
    /// finishes; await the task's [`PushCompletion`] for that. Must be called
    /// from within a Tokio runtime, since a new lane spawns its worker.
    pub fn submit(&self, task: PushTask) {
        let image_name = task.image_name.clone();
        let mut lanes = self.lanes.lock().unwrap_or_else(|e| e.into_inner());

        // Lookup, creation and enqueue all happen under the lock, so two
        // first pushes of a new image can never create two lanes.
        let sender = lanes
            .entry(image_name.clone())
            .or_insert_with(|| self.spawn_lane(&image_name));

        if let Err(mpsc::error::SendError(task)) = sender.send(task) {
            // The lane's worker is gone; replace it and retry on the fresh lane
            info!(image = %image_name, "Recreating push lane");
            let fresh = self.spawn_lane(&image_name);
            if let Err(mpsc::error::SendError(task)) = fresh.send(task) {
                task.complete(Err(Error::PushFailed(format!(
                    "push lane for {} is unavailable",
                    image_name
                ))));
            }
            lanes.insert(image_name.clone(), fresh);
        }

        debug!(image = %image_name, "Push queued");
    }

    /// Number of lanes created so far.
    pub fn lane_count(&self) -> usize {
        self.lanes.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn spawn_lane(&self, image_name: &str) -> LaneSender {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = LaneWorker::new(image_name.to_string(), self.pusher.clone(), rx);
        tokio::spawn(worker.run());
        info!(image = %image_name, "Push lane created");
        tx
    }
}
