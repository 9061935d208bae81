use tokio::sync::broadcast;
use tracing::debug;

use crate::models::QueueEvent;

/// Push seam for patient-facing views: every committed entry creation and
/// transition is published here. Patient displays poll the status endpoint
/// today; a websocket layer can attach to `subscribe` without touching the
/// write path. Absent or lagging subscribers never fail a write.
#[derive(Clone)]
pub struct StatusNotifier {
    sender: broadcast::Sender<QueueEvent>,
}

impl StatusNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: QueueEvent) {
        if self.sender.send(event).is_err() {
            debug!("No status subscribers attached, event dropped");
        }
    }
}

impl Default for StatusNotifier {
    fn default() -> Self {
        Self::new()
    }
}
