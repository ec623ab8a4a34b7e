//! Outbound notification services.

pub mod chat;
pub mod reporter;

pub use chat::{ChatClient, NotifyError};
pub use reporter::WebhookReporter;
