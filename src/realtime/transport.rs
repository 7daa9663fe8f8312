//! Subscribe/unsubscribe/publish seam over a push service.

use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INSERT" => Some(ChangeKind::Insert),
            "UPDATE" => Some(ChangeKind::Update),
            "DELETE" => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

/// Server-side row filter evaluated by the transport before delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFilter {
    Equal { column: String, value: String },
    NotEqual { column: String, value: String },
}

impl RowFilter {
    pub fn not_equal(column: &str, value: impl Into<String>) -> Self {
        RowFilter::NotEqual {
            column: column.to_owned(),
            value: value.into(),
        }
    }

    pub fn matches(&self, row: &serde_json::Value) -> bool {
        match self {
            RowFilter::Equal { column, value } => column_value(row, column) == Some(value.as_str()),
            RowFilter::NotEqual { column, value } => {
                column_value(row, column) != Some(value.as_str())
            }
        }
    }
}

fn column_value<'a>(row: &'a serde_json::Value, column: &str) -> Option<&'a str> {
    row.get(column).and_then(serde_json::Value::as_str)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeListener {
    pub kind: ChangeKind,
    pub filter: Option<RowFilter>,
}

impl ChangeListener {
    pub fn all(kind: ChangeKind) -> Self {
        Self { kind, filter: None }
    }

    pub fn filtered(kind: ChangeKind, filter: RowFilter) -> Self {
        Self {
            kind,
            filter: Some(filter),
        }
    }

    pub fn accepts(&self, kind: ChangeKind, row: &serde_json::Value) -> bool {
        self.kind == kind && self.filter.as_ref().map_or(true, |filter| filter.matches(row))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscription {
    /// Row changes on a table.
    TableChanges {
        channel: String,
        table: String,
        listeners: Vec<ChangeListener>,
    },
    /// Client-to-client broadcast events.
    Broadcast {
        channel: String,
        events: Vec<String>,
    },
}

impl Subscription {
    pub fn channel(&self) -> &str {
        match self {
            Subscription::TableChanges { channel, .. } | Subscription::Broadcast { channel, .. } => {
                channel
            }
        }
    }
}

/// One delivery from the transport. For table changes `event` is the change kind
/// (`INSERT`/`UPDATE`/`DELETE`) and `payload` the affected row.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    pub channel: String,
    pub event: String,
    pub payload: serde_json::Value,
}

pub type EventHandler = Arc<dyn Fn(TransportEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RealtimeError {
    #[error("subscription to {channel} rejected: {reason}")]
    SubscribeRejected { channel: String, reason: String },
    #[error("publish on {channel} failed: {reason}")]
    PublishFailed { channel: String, reason: String },
    #[error("realtime client is shut down")]
    Closed,
}

/// Delivery is at-least-once and in order within a channel; nothing is promised
/// across channels.
pub trait RealtimeTransport: Send + Sync {
    fn subscribe(
        &self,
        subscription: Subscription,
        handler: EventHandler,
    ) -> Result<SubscriptionId, RealtimeError>;

    fn unsubscribe(&self, id: SubscriptionId);

    fn publish(
        &self,
        channel: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Result<(), RealtimeError>;
}
