use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::{Email, Mailer};

/// Background delivery of notifications that must not hold up a response.
///
/// Messages are sent one at a time by a detached task. A failed delivery is
/// logged and dropped.
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::UnboundedSender<Email>,
}

impl NotificationQueue {
    /// Spawn the delivery task on the current runtime.
    pub fn spawn(mailer: Arc<dyn Mailer>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Email>();
        tokio::spawn(async move {
            while let Some(email) = rx.recv().await {
                match mailer.send(&email).await {
                    Ok(()) => info!(subject = %email.subject, "notification sent"),
                    Err(e) => {
                        error!(error = %e, subject = %email.subject, "notification failed")
                    }
                }
            }
        });
        Self { tx }
    }

    pub fn enqueue(&self, email: Email) {
        if let Err(e) = self.tx.send(email) {
            warn!(subject = %e.0.subject, "notification queue closed, dropping email");
        }
    }
}
