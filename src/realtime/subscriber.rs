use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::Sender,
    Arc,
};

use serde::Deserialize;

use super::{
    channels::{
        CONVERSATIONS_CHANNEL, CONVERSATIONS_TABLE, MESSAGES_CHANNEL, MESSAGES_TABLE,
        READ_RECEIPTS_CHANNEL, READ_RECEIPTS_TABLE, SENDER_COLUMN, TYPING_CHANNEL,
        TYPING_START_EVENT, TYPING_STOP_EVENT,
    },
    transport::{
        ChangeKind, ChangeListener, EventHandler, RealtimeError, RealtimeTransport, RowFilter,
        Subscription, SubscriptionId, TransportEvent,
    },
};
use crate::domain::{
    conversation::Conversation,
    events::{ReadReceiptEvent, RealtimeEvent},
    ids::{ConversationId, MessageId, UserId},
    message::Message,
    typing::TypingState,
};

const REALTIME_SUBSCRIBED: &str = "REALTIME_SUBSCRIBED";
const REALTIME_SUBSCRIBE_FAILED: &str = "REALTIME_SUBSCRIBE_FAILED";
const REALTIME_UNSUBSCRIBED: &str = "REALTIME_UNSUBSCRIBED";
const REALTIME_PAYLOAD_DECODE_FAILED: &str = "REALTIME_PAYLOAD_DECODE_FAILED";
const REALTIME_EVENT_FORWARD_FAILED: &str = "REALTIME_EVENT_FORWARD_FAILED";

/// Receives decoded push events. Called from the transport's delivery thread.
pub trait RealtimeSink: Send + Sync {
    fn deliver(&self, event: RealtimeEvent);
}

impl RealtimeSink for Sender<RealtimeEvent> {
    fn deliver(&self, event: RealtimeEvent) {
        let kind = event.kind();
        if let Err(error) = self.send(event) {
            tracing::warn!(
                code = REALTIME_EVENT_FORWARD_FAILED,
                event_kind = kind,
                error = %error,
                "realtime event dropped; receiver is gone"
            );
        }
    }
}

/// Owns the four live subscriptions: message lifecycle, conversation lifecycle,
/// typing broadcasts and read receipts.
///
/// Inserts authored by the current user are filtered by the transport; their
/// canonical rows arrive through the send response instead.
pub struct RealtimeSubscriber {
    transport: Arc<dyn RealtimeTransport>,
    subscriptions: Vec<SubscriptionId>,
    active: Arc<AtomicBool>,
}

impl std::fmt::Debug for RealtimeSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeSubscriber")
            .field("subscriptions", &self.subscriptions)
            .field("active", &self.is_active())
            .finish()
    }
}

impl RealtimeSubscriber {
    pub fn start(
        transport: Arc<dyn RealtimeTransport>,
        current_user: UserId,
        sink: Arc<dyn RealtimeSink>,
    ) -> Result<Self, RealtimeError> {
        let active = Arc::new(AtomicBool::new(true));
        let mut subscriber = Self {
            transport,
            subscriptions: Vec::with_capacity(4),
            active,
        };

        let plan: [(Subscription, Decoder); 4] = [
            (
                Subscription::TableChanges {
                    channel: MESSAGES_CHANNEL.to_owned(),
                    table: MESSAGES_TABLE.to_owned(),
                    listeners: vec![
                        ChangeListener::filtered(
                            ChangeKind::Insert,
                            RowFilter::not_equal(SENDER_COLUMN, current_user.as_str()),
                        ),
                        ChangeListener::all(ChangeKind::Update),
                        ChangeListener::all(ChangeKind::Delete),
                    ],
                },
                Decoder::Messages,
            ),
            (
                Subscription::TableChanges {
                    channel: CONVERSATIONS_CHANNEL.to_owned(),
                    table: CONVERSATIONS_TABLE.to_owned(),
                    listeners: vec![
                        ChangeListener::all(ChangeKind::Insert),
                        ChangeListener::all(ChangeKind::Update),
                        ChangeListener::all(ChangeKind::Delete),
                    ],
                },
                Decoder::Conversations,
            ),
            (
                Subscription::Broadcast {
                    channel: TYPING_CHANNEL.to_owned(),
                    events: vec![TYPING_START_EVENT.to_owned(), TYPING_STOP_EVENT.to_owned()],
                },
                Decoder::Typing {
                    current_user: current_user.clone(),
                },
            ),
            (
                Subscription::TableChanges {
                    channel: READ_RECEIPTS_CHANNEL.to_owned(),
                    table: READ_RECEIPTS_TABLE.to_owned(),
                    listeners: vec![ChangeListener::all(ChangeKind::Insert)],
                },
                Decoder::ReadReceipts,
            ),
        ];

        for (subscription, decoder) in plan {
            let channel = subscription.channel().to_owned();
            let handler = subscriber.handler(decoder, Arc::clone(&sink));
            match subscriber.transport.subscribe(subscription, handler) {
                Ok(id) => {
                    tracing::info!(
                        code = REALTIME_SUBSCRIBED,
                        channel = %channel,
                        "realtime channel subscribed"
                    );
                    subscriber.subscriptions.push(id);
                }
                Err(error) => {
                    tracing::warn!(
                        code = REALTIME_SUBSCRIBE_FAILED,
                        channel = %channel,
                        error = %error,
                        "realtime channel subscription failed"
                    );
                    subscriber.shutdown();
                    return Err(error);
                }
            }
        }

        Ok(subscriber)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Releases every subscription. No event reaches the sink afterwards, even one
    /// the transport was already delivering.
    pub fn shutdown(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        for id in self.subscriptions.drain(..) {
            self.transport.unsubscribe(id);
        }
        tracing::info!(code = REALTIME_UNSUBSCRIBED, "realtime subscriptions released");
    }

    fn handler(&self, decoder: Decoder, sink: Arc<dyn RealtimeSink>) -> EventHandler {
        let active = Arc::clone(&self.active);
        Arc::new(move |event: TransportEvent| {
            if !active.load(Ordering::SeqCst) {
                return;
            }
            match decoder.decode(&event) {
                Ok(Some(decoded)) => {
                    tracing::debug!(
                        channel = %event.channel,
                        event_kind = decoded.kind(),
                        "realtime event received"
                    );
                    sink.deliver(decoded);
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(
                        code = REALTIME_PAYLOAD_DECODE_FAILED,
                        channel = %event.channel,
                        event = %event.event,
                        error = %error,
                        "realtime payload could not be decoded; event skipped"
                    );
                }
            }
        })
    }
}

impl Drop for RealtimeSubscriber {
    fn drop(&mut self) {
        if self.is_active() {
            self.shutdown();
        }
    }
}

#[derive(Debug, Clone)]
enum Decoder {
    Messages,
    Conversations,
    Typing { current_user: UserId },
    ReadReceipts,
}

#[derive(Debug, Deserialize)]
struct DeletedMessageRow {
    id: MessageId,
    #[serde(default)]
    conversation_id: Option<ConversationId>,
}

#[derive(Debug, Deserialize)]
struct DeletedConversationRow {
    id: ConversationId,
}

#[derive(Debug, Deserialize)]
struct TypingStopPayload {
    conversation_id: ConversationId,
    user_id: UserId,
}

impl Decoder {
    /// `Ok(None)` means the event is valid but not for this client.
    fn decode(&self, event: &TransportEvent) -> Result<Option<RealtimeEvent>, serde_json::Error> {
        let payload = event.payload.clone();
        let decoded = match self {
            Decoder::Messages => match ChangeKind::parse(&event.event) {
                Some(ChangeKind::Insert) => {
                    Some(RealtimeEvent::MessageInserted(serde_json::from_value::<Message>(payload)?))
                }
                Some(ChangeKind::Update) => {
                    Some(RealtimeEvent::MessageUpdated(serde_json::from_value::<Message>(payload)?))
                }
                Some(ChangeKind::Delete) => {
                    let row: DeletedMessageRow = serde_json::from_value(payload)?;
                    Some(RealtimeEvent::MessageDeleted {
                        message_id: row.id,
                        conversation_id: row.conversation_id,
                    })
                }
                None => None,
            },
            Decoder::Conversations => match ChangeKind::parse(&event.event) {
                Some(ChangeKind::Insert | ChangeKind::Update) => Some(
                    RealtimeEvent::ConversationChanged(serde_json::from_value::<Conversation>(
                        payload,
                    )?),
                ),
                Some(ChangeKind::Delete) => {
                    let row: DeletedConversationRow = serde_json::from_value(payload)?;
                    Some(RealtimeEvent::ConversationDeleted {
                        conversation_id: row.id,
                    })
                }
                None => None,
            },
            Decoder::Typing { current_user } => match event.event.as_str() {
                TYPING_START_EVENT => {
                    let state: TypingState = serde_json::from_value(payload)?;
                    (&state.user_id != current_user).then_some(RealtimeEvent::TypingStarted(state))
                }
                TYPING_STOP_EVENT => {
                    let stop: TypingStopPayload = serde_json::from_value(payload)?;
                    (&stop.user_id != current_user).then_some(RealtimeEvent::TypingStopped {
                        conversation_id: stop.conversation_id,
                        user_id: stop.user_id,
                    })
                }
                _ => None,
            },
            Decoder::ReadReceipts => Some(RealtimeEvent::ReadReceipt(serde_json::from_value::<
                ReadReceiptEvent,
            >(payload)?)),
        };
        Ok(decoded)
    }
}
