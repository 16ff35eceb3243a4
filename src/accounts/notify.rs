use tracing::info;

use super::AccountError;

/// Outbound message channel (mail in production deployments).
pub trait Notifier: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AccountError>;
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AccountError> {
        info!(to, subject, body, "Notification");
        Ok(())
    }
}
