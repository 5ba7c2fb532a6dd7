//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking event publishing from many agents at once.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                 Receivers:
//!   Agent 1 ──┐                        ┌──► supervisor loop (registry state)
//!   Agent 2 ──┼──────► Bus ────────────┤
//!   Agent N ──┤  (broadcast chan)      └──► subscriber listener ──► SubscriberSet
//!   Supervisor┘
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks.
//! - **Bounded capacity**: a single ring buffer stores recent events for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: events are lost if there are no active receivers at send time.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events.
///
/// Cheap to clone; every clone publishes into the same channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    ///
    /// If there are no receivers, the event is dropped.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that will observe subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn receivers_see_events_published_after_subscribe() {
        let bus = Bus::new(8);
        bus.publish(Event::new(EventKind::LoginStarted, "lost"));
        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::SessionReady, "seen"));
        let ev = rx.recv().await.expect("event");
        assert_eq!(ev.kind, EventKind::SessionReady);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let bus = Bus::new(0);
        let _rx = bus.subscribe();
        bus.publish(Event::new(EventKind::LoginStarted, "ok"));
    }
}
