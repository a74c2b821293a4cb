//! Event bus carrying lifecycle events.
//!
//! Job completion and application start are published here; the lifecycle
//! bridge subscribes and reloads code loading contexts in response.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

use crate::config::DEFAULT_EVENT_CHANNEL_CAPACITY;
use crate::event::{EventMetadata, LifecycleEvent};

/// Broadcast bus of [`LifecycleEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<(LifecycleEvent, EventMetadata)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CHANNEL_CAPACITY)
    }

    /// Create a bus buffering up to `capacity` events for slow subscribers.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publish an event from the `system` source.
    ///
    /// Returns `true` if there was at least one subscriber.
    pub async fn publish(&self, event: LifecycleEvent) -> bool {
        self.publish_with_source(event, "system").await
    }

    pub async fn publish_with_source(&self, event: LifecycleEvent, source: impl Into<String>) -> bool {
        self.publish_with_metadata(event, EventMetadata::new(source)).await
    }

    pub async fn publish_with_metadata(&self, event: LifecycleEvent, metadata: EventMetadata) -> bool {
        self.tx.send((event, metadata)).is_ok()
    }

    pub fn subscribe(&self) -> EventBusReceiver {
        EventBusReceiver {
            rx: self.tx.subscribe(),
        }
    }

    /// Subscribe to events matching `filter`.
    pub fn subscribe_filtered<F>(&self, filter: F) -> FilteredReceiver<F>
    where
        F: Fn(&LifecycleEvent) -> bool + Send + 'static,
    {
        FilteredReceiver {
            rx: self.tx.subscribe(),
            filter,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver for all events.
pub struct EventBusReceiver {
    rx: broadcast::Receiver<(LifecycleEvent, EventMetadata)>,
}

impl EventBusReceiver {
    /// Receive the next event, `None` once the bus is closed.
    pub async fn recv(&mut self) -> Option<(LifecycleEvent, EventMetadata)> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event receiver lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<(LifecycleEvent, EventMetadata)> {
        self.rx.try_recv().ok()
    }
}

/// Receiver for events matching a filter.
pub struct FilteredReceiver<F>
where
    F: Fn(&LifecycleEvent) -> bool + Send,
{
    rx: broadcast::Receiver<(LifecycleEvent, EventMetadata)>,
    filter: F,
}

impl<F> FilteredReceiver<F>
where
    F: Fn(&LifecycleEvent) -> bool + Send,
{
    pub async fn recv(&mut self) -> Option<(LifecycleEvent, EventMetadata)> {
        loop {
            match self.rx.recv().await {
                Ok((event, meta)) => {
                    if (self.filter)(&event) {
                        return Some((event, meta));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Filtered receiver lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

pub type SharedEventBus = Arc<EventBus>;
