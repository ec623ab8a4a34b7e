//! Per-build log capture.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::BuildId;

/// Buffered capture of a build's combined output.
///
/// Every chunk appended is kept for the result callback and also emitted as
/// `debug` events tagged with the build id. Cloning shares the buffer.
#[derive(Debug, Clone)]
pub struct BuildLog {
    build_id: BuildId,
    buffer: Arc<Mutex<String>>,
}

impl BuildLog {
    pub fn new(build_id: BuildId) -> Self {
        Self {
            build_id,
            buffer: Arc::new(Mutex::new(String::new())),
        }
    }

    /// Append a chunk of output.
    pub fn append(&self, chunk: &str) {
        for line in chunk.lines().filter(|l| !l.trim().is_empty()) {
            debug!(build_id = %self.build_id, "{}", line.trim_end());
        }
        self.lock().push_str(chunk);
    }

    /// Append a chunk as a line, adding the trailing newline if missing.
    pub fn append_line(&self, line: &str) {
        if line.ends_with('\n') {
            self.append(line);
        } else {
            self.append(&format!("{}\n", line));
        }
    }

    /// Snapshot of everything captured so far.
    pub fn contents(&self) -> String {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, String> {
        // A panic while appending leaves the buffer readable.
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }
}
