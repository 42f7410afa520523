//! Channel trait and the inbound event envelope.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;

use crate::error::ChannelError;
use crate::form::{Event, ParticipantId, Reply};

/// An event received on a channel, addressed to the form engine.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Name of the channel it arrived on; replies go back the same way.
    pub channel: String,
    pub participant_id: ParticipantId,
    pub event: Event,
    /// Transport-specific data the channel needs to reply (chat id, id of
    /// the message holding the buttons, callback id).
    pub metadata: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    pub fn new(channel: &str, participant_id: impl Into<ParticipantId>, event: Event) -> Self {
        Self {
            channel: channel.to_string(),
            participant_id: participant_id.into(),
            event,
            metadata: serde_json::Value::Null,
            received_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// A string field from the metadata.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    /// An integer field from the metadata.
    pub fn meta_i64(&self, key: &str) -> Option<i64> {
        self.metadata.get(key).and_then(|v| v.as_i64())
    }
}

/// Stream of inbound events from a channel.
pub type EventStream = Pin<Box<dyn Stream<Item = InboundEvent> + Send>>;

/// A transport that delivers participant events and carries replies back.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Start listening. The stream ends when the channel stops.
    async fn start(&self) -> Result<EventStream, ChannelError>;

    /// Deliver the reply to `event`, all of its responses in order.
    async fn respond(&self, event: &InboundEvent, reply: &Reply) -> Result<(), ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError>;
}
