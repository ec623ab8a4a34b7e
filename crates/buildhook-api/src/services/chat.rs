//! Chat notification client.

use reqwest::StatusCode;
use thiserror::Error;
use tracing::debug;

/// Failure to deliver a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),
}

/// Posts messages to a chat relay as `to=<channel>&msg=<text>` forms.
#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    url: String,
}

impl ChatClient {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Send one message. Anything but `200 OK` counts as a failure.
    pub async fn send(&self, to: &str, msg: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .form(&[("to", to), ("msg", msg)])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(NotifyError::Status(status));
        }

        debug!(to = %to, "Chat message sent");
        Ok(())
    }
}
