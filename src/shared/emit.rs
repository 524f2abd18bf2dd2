use tokio::sync::broadcast;
use super::events::WorkspaceEvent;
use super::types::Notice;

const EVENT_CAPACITY: usize = 256;

/// Fan-out channel between workspace surfaces and the UI shell.
///
/// Cloning yields another handle onto the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<WorkspaceEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkspaceEvent> {
        self.sender.subscribe()
    }

    /// Emit an event to every subscriber
    pub fn emit(&self, event: WorkspaceEvent) {
        // No subscribers is fine: nobody is rendering yet
        if self.sender.send(event).is_err() {
            tracing::trace!("[EventBus] Event dropped, no subscribers");
        }
    }

    pub fn notify(&self, notice: Notice) {
        self.emit(WorkspaceEvent::Notification(notice));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect everything currently queued on a receiver. Used by tests and the UI poll loop.
pub fn drain_events(rx: &mut broadcast::Receiver<WorkspaceEvent>) -> Vec<WorkspaceEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                tracing::warn!("[EventBus] Receiver lagged, skipped {} events", skipped);
            }
            Err(_) => break,
        }
    }
    events
}
