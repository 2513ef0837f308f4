//! Notification seam (toasts in a UI, logs here).

use geopresence_core::Identity;

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Snapshot received; `online` includes the local user.
    Synced { online: usize },
    Joined(Identity),
    Left(Identity),
}

pub trait Notifier: Send {
    fn notify(&mut self, n: Notification);
}

#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&mut self, n: Notification) {
        match n {
            Notification::Synced { online } => tracing::info!(online, "presence synced"),
            Notification::Joined(id) => tracing::info!(user = %id, "user joined"),
            Notification::Left(id) => tracing::info!(user = %id, "user left"),
        }
    }
}
