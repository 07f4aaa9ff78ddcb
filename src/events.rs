// Application event bus for UI-level occurrences
//
// A broadcast channel decouples emitters (shells, routers, widgets) from
// consumers (the auto-tracker). Publishing with no subscribers is fine;
// slow subscribers lose oldest events rather than blocking emitters.

use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

/// User-interaction event published by the host application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// A completed route change
    Navigation { url: String, title: Option<String> },
    /// A pointer click: the element tag, its visible text, and the page
    /// the click happened on
    Click {
        tag: Option<String>,
        text: String,
        url: Option<String>,
    },
}

/// Broadcast bus carrying [`UiEvent`]s
pub struct EventBus {
    tx: broadcast::Sender<UiEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes an event to all current subscribers
    pub fn publish(&self, event: UiEvent) {
        // A send with no receivers is not an error worth surfacing
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
