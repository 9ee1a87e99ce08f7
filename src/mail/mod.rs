//! Outbound email.

use async_trait::async_trait;

mod queue;
mod resend;
pub mod templates;

pub use queue::NotificationQueue;
pub use resend::ResendMailer;

/// Plain-text message to a single recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> anyhow::Result<()>;
}

#[cfg(test)]
pub use recording::RecordingMailer;
