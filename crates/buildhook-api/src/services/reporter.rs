//! Delivers build results to the caller's callback URL and chat channel.

use async_trait::async_trait;
use buildhook_config::ServiceConfig;
use buildhook_core::{BuildResult, BuildSpec, Reporter};
use tracing::{info, warn};

use crate::services::ChatClient;

/// Which point of the build lifecycle a chat message announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildEvent {
    Started,
    Succeeded,
    Failed,
}

impl BuildEvent {
    fn headline(self) -> &'static str {
        match self {
            BuildEvent::Started => "Image build started",
            BuildEvent::Succeeded => "Image build succeeded",
            BuildEvent::Failed => "Image build failed",
        }
    }
}

/// Chat message text for a build event.
pub fn compose_message(event: BuildEvent, spec: &BuildSpec, history_url: &str) -> String {
    format!(
        "[buildhook] {}\n\n\
         <Image>\n\
         Name: {}\n\n\
         <Source>\n\
         URL: {}\n\
         Branch/Tag: {}\n\n\
         <Result>\n\
         URL: {}/{}\n",
        event.headline(),
        spec.image_name_with_tag(),
        spec.source_url(),
        spec.ref_name,
        history_url.trim_end_matches('/'),
        spec.build_id,
    )
}

/// Production [`Reporter`]: JSON callback plus optional chat messages.
pub struct WebhookReporter {
    client: reqwest::Client,
    chat: Option<ChatClient>,
    history_url: String,
}

impl WebhookReporter {
    pub fn new(
        client: reqwest::Client,
        chat: Option<ChatClient>,
        history_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            chat,
            history_url: history_url.into(),
        }
    }

    pub fn from_config(client: reqwest::Client, config: &ServiceConfig) -> Self {
        let chat = config
            .chat_enabled()
            .then(|| ChatClient::new(client.clone(), config.watch_center_url.clone()));
        Self::new(client, chat, config.build_history_url.clone())
    }

    async fn notify(&self, event: BuildEvent, spec: &BuildSpec) {
        let (Some(chat), Some(channel)) = (&self.chat, spec.chat_channel.as_deref()) else {
            return;
        };

        let message = compose_message(event, spec, &self.history_url);
        if let Err(e) = chat.send(channel, &message).await {
            warn!(
                build_id = %spec.build_id,
                event = ?event,
                error = %e,
                "Chat notification failed"
            );
        }
    }

    async fn post_result(&self, result: &BuildResult) {
        let url = result.build_spec.callback_url.as_str();
        if url.is_empty() {
            warn!(build_id = %result.build_id, "No result callback URL, skipping");
            return;
        }

        match self.client.post(url).json(result).send().await {
            Ok(response) if response.status().is_success() => {
                info!(build_id = %result.build_id, "Result delivered");
            }
            Ok(response) => {
                warn!(
                    build_id = %result.build_id,
                    status = %response.status(),
                    "Result callback rejected"
                );
            }
            Err(e) => {
                warn!(build_id = %result.build_id, error = %e, "Result callback failed");
            }
        }
    }
}

#[async_trait]
impl Reporter for WebhookReporter {
    async fn build_started(&self, spec: &BuildSpec) {
        self.notify(BuildEvent::Started, spec).await;
    }

    async fn report(&self, result: &BuildResult) {
        self.post_result(result).await;

        let event = if result.is_success {
            BuildEvent::Succeeded
        } else {
            BuildEvent::Failed
        };
        self.notify(event, &result.build_spec).await;
    }
}
