use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use serde_json::json;
use tokio::{runtime::Handle, task::JoinHandle};

use super::{
    channels::{TYPING_CHANNEL, TYPING_START_EVENT, TYPING_STOP_EVENT},
    transport::{RealtimeError, RealtimeTransport},
};
use crate::domain::ids::{ConversationId, UserId};

const TYPING_STOP_PUBLISH_FAILED: &str = "REALTIME_TYPING_STOP_PUBLISH_FAILED";

struct PendingStop {
    generation: u64,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct TimerRegistry {
    pending: HashMap<ConversationId, PendingStop>,
    next_generation: u64,
    closed: bool,
}

/// Debounced outgoing typing signals, one stop timer per conversation.
///
/// A burst of keystrokes publishes a single `typing-start`; the matching
/// `typing-stop` goes out once no keystroke arrived for the debounce window.
pub struct TypingNotifier {
    transport: Arc<dyn RealtimeTransport>,
    runtime: Handle,
    debounce: Duration,
    user_id: UserId,
    user_name: String,
    timers: Arc<Mutex<TimerRegistry>>,
}

impl std::fmt::Debug for TypingNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypingNotifier")
            .field("user_id", &self.user_id)
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

impl TypingNotifier {
    pub fn new(
        transport: Arc<dyn RealtimeTransport>,
        runtime: Handle,
        debounce: Duration,
        user_id: UserId,
        user_name: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            runtime,
            debounce,
            user_id,
            user_name: user_name.into(),
            timers: Arc::new(Mutex::new(TimerRegistry::default())),
        }
    }

    /// Call on every keystroke. Re-arms the stop timer for the conversation.
    pub fn send_typing_start(&self, conversation_id: &ConversationId) -> Result<(), RealtimeError> {
        let mut timers = lock(&self.timers);
        if timers.closed {
            return Err(RealtimeError::Closed);
        }

        match timers.pending.remove(conversation_id) {
            Some(previous) => previous.task.abort(),
            None => self.transport.publish(
                TYPING_CHANNEL,
                TYPING_START_EVENT,
                json!({
                    "conversation_id": conversation_id,
                    "user_id": self.user_id,
                    "user_name": self.user_name,
                }),
            )?,
        }

        timers.next_generation += 1;
        let generation = timers.next_generation;
        let task = self.runtime.spawn(stop_after(
            Arc::clone(&self.timers),
            Arc::clone(&self.transport),
            self.debounce,
            generation,
            conversation_id.clone(),
            self.user_id.clone(),
        ));
        timers
            .pending
            .insert(conversation_id.clone(), PendingStop { generation, task });
        Ok(())
    }

    /// Cancels the pending timer and publishes `typing-stop` right away.
    pub fn send_typing_stop(&self, conversation_id: &ConversationId) -> Result<(), RealtimeError> {
        let mut timers = lock(&self.timers);
        if timers.closed {
            return Err(RealtimeError::Closed);
        }
        if let Some(previous) = timers.pending.remove(conversation_id) {
            previous.task.abort();
        }
        publish_stop(self.transport.as_ref(), conversation_id, &self.user_id)
    }

    pub fn is_typing(&self, conversation_id: &ConversationId) -> bool {
        lock(&self.timers).pending.contains_key(conversation_id)
    }

    /// Cancels every pending timer. Nothing is published afterwards.
    pub fn shutdown(&self) {
        let mut timers = lock(&self.timers);
        timers.closed = true;
        for (_, pending) in timers.pending.drain() {
            pending.task.abort();
        }
    }
}

impl Drop for TypingNotifier {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn stop_after(
    timers: Arc<Mutex<TimerRegistry>>,
    transport: Arc<dyn RealtimeTransport>,
    delay: Duration,
    generation: u64,
    conversation_id: ConversationId,
    user_id: UserId,
) {
    tokio::time::sleep(delay).await;

    // Held across the publish so a concurrent start cannot slip in between.
    let mut timers = lock(&timers);
    let current = timers
        .pending
        .get(&conversation_id)
        .map_or(false, |pending| pending.generation == generation);
    if timers.closed || !current {
        return;
    }
    timers.pending.remove(&conversation_id);

    if let Err(error) = publish_stop(transport.as_ref(), &conversation_id, &user_id) {
        tracing::warn!(
            code = TYPING_STOP_PUBLISH_FAILED,
            conversation_id = %conversation_id,
            error = %error,
            "debounced typing-stop could not be published"
        );
    }
}

fn publish_stop(
    transport: &dyn RealtimeTransport,
    conversation_id: &ConversationId,
    user_id: &UserId,
) -> Result<(), RealtimeError> {
    transport.publish(
        TYPING_CHANNEL,
        TYPING_STOP_EVENT,
        json!({
            "conversation_id": conversation_id,
            "user_id": user_id,
        }),
    )
}

fn lock(timers: &Mutex<TimerRegistry>) -> MutexGuard<'_, TimerRegistry> {
    timers
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
