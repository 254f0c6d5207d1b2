use tracing::{error, info};

/// Toast sink owned by the UI. Fire and forget.
pub trait Notifier: Send + Sync {
    fn notify_success(&self, message: &str);
    fn notify_error(&self, message: &str);
}

/// Sends toasts to the log when no UI is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_success(&self, message: &str) {
        info!(category = "notification", "{}", message);
    }

    fn notify_error(&self, message: &str) {
        error!(category = "notification", "{}", message);
    }
}
