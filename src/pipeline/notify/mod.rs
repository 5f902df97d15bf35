// =====================================================
// OPERATOR NOTIFICATION
// =====================================================

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Longest error excerpt carried in a notification.
pub const MAX_ERROR_EXCERPT_CHARS: usize = 200;

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: &str, subject: &str, message: &str) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    #[serde(default = "default_address")]
    pub sender: String,
    #[serde(default = "default_address")]
    pub recipient: String,
    #[serde(default = "default_subject")]
    pub subject: String,
}

fn default_address() -> String {
    "dba@datacom.com.br".to_string()
}

fn default_subject() -> String {
    "Falha na integração APS".to_string()
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            sender: default_address(),
            recipient: default_address(),
            subject: default_subject(),
        }
    }
}

/// First line of `error_text`, cut to [`MAX_ERROR_EXCERPT_CHARS`] with `...` appended when cut.
pub fn error_excerpt(error_text: &str) -> String {
    let first_line = error_text.lines().next().unwrap_or("").trim();
    let mut out = String::new();
    for (idx, ch) in first_line.chars().enumerate() {
        if idx >= MAX_ERROR_EXCERPT_CHARS {
            out.push_str("...");
            break;
        }
        out.push(ch);
    }
    out
}

pub fn build_failure_message(context: &str, error_text: &str) -> String {
    let excerpt = error_excerpt(error_text);
    if context.trim().is_empty() {
        format!("Error: {}", excerpt)
    } else {
        format!("Failure detected during: {}\n\nError: {}", context, excerpt)
    }
}

/// Sends failure notifications without ever failing itself.
pub struct FailureReporter<'a> {
    notifier: &'a dyn Notifier,
    settings: &'a NotificationSettings,
}

impl<'a> FailureReporter<'a> {
    pub fn new(notifier: &'a dyn Notifier, settings: &'a NotificationSettings) -> Self {
        Self { notifier, settings }
    }

    /// Notifies the operator about `error`. A transport failure is logged and
    /// swallowed so it cannot replace the error being reported.
    pub async fn report(&self, context: &str, error: &PipelineError) {
        log::error!("Failure during {}: {}", context, error);
        let message = build_failure_message(context, &error.to_string());
        match self
            .notifier
            .notify(&self.settings.recipient, &self.settings.subject, &message)
            .await
        {
            Ok(()) => log::info!("Failure notification sent to {}", self.settings.recipient),
            Err(e) => log::warn!("Could not send failure notification: {}", e),
        }
    }
}
