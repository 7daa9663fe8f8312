//! In-process realtime broker. Honors row filters and broadcast event lists the
//! same way the hosted service does, and records every publish.

use std::sync::{Arc, Mutex, MutexGuard};

use super::transport::{
    ChangeKind, EventHandler, RealtimeError, RealtimeTransport, Subscription, SubscriptionId,
    TransportEvent,
};

struct Registered {
    id: SubscriptionId,
    subscription: Subscription,
    handler: EventHandler,
}

#[derive(Default)]
struct LoopbackState {
    next_id: u64,
    registered: Vec<Registered>,
    published: Vec<TransportEvent>,
}

#[derive(Default)]
pub struct LoopbackRealtime {
    state: Mutex<LoopbackState>,
}

impl std::fmt::Debug for LoopbackRealtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("LoopbackRealtime")
            .field("subscriptions", &state.registered.len())
            .field("published", &state.published.len())
            .finish()
    }
}

impl LoopbackRealtime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a row change on `table`, delivered to every matching listener.
    pub fn emit_change(&self, table: &str, kind: ChangeKind, row: serde_json::Value) {
        let targets: Vec<(String, EventHandler)> = {
            let state = self.lock();
            state
                .registered
                .iter()
                .filter_map(|entry| match &entry.subscription {
                    Subscription::TableChanges {
                        channel,
                        table: subscribed_table,
                        listeners,
                    } if subscribed_table == table
                        && listeners.iter().any(|l| l.accepts(kind, &row)) =>
                    {
                        Some((channel.clone(), Arc::clone(&entry.handler)))
                    }
                    _ => None,
                })
                .collect()
        };

        for (channel, handler) in targets {
            handler(TransportEvent {
                channel,
                event: kind.as_str().to_owned(),
                payload: row.clone(),
            });
        }
    }

    /// Everything published through this broker, oldest first.
    pub fn published(&self) -> Vec<TransportEvent> {
        self.lock().published.clone()
    }

    pub fn published_count(&self, event: &str) -> usize {
        self.lock()
            .published
            .iter()
            .filter(|published| published.event == event)
            .count()
    }

    pub fn subscription_count(&self) -> usize {
        self.lock().registered.len()
    }

    fn lock(&self) -> MutexGuard<'_, LoopbackState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RealtimeTransport for LoopbackRealtime {
    fn subscribe(
        &self,
        subscription: Subscription,
        handler: EventHandler,
    ) -> Result<SubscriptionId, RealtimeError> {
        let mut state = self.lock();
        state.next_id += 1;
        let id = SubscriptionId(state.next_id);
        state.registered.push(Registered {
            id,
            subscription,
            handler,
        });
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().registered.retain(|entry| entry.id != id);
    }

    fn publish(
        &self,
        channel: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<(), RealtimeError> {
        let published = TransportEvent {
            channel: channel.to_owned(),
            event: event.to_owned(),
            payload,
        };

        let targets: Vec<EventHandler> = {
            let mut state = self.lock();
            state.published.push(published.clone());
            state
                .registered
                .iter()
                .filter(|entry| match &entry.subscription {
                    Subscription::Broadcast {
                        channel: subscribed,
                        events,
                    } => subscribed == channel && events.iter().any(|e| e == event),
                    Subscription::TableChanges { .. } => false,
                })
                .map(|entry| Arc::clone(&entry.handler))
                .collect()
        };

        for handler in targets {
            handler(published.clone());
        }
        Ok(())
    }
}
