//! Channel manager — merges all channel streams and routes replies back to
//! the channel an event came from.

use futures::stream;
use tracing::{info, warn};

use super::channel::{Channel, EventStream, InboundEvent};
use crate::error::ChannelError;
use crate::form::Reply;

#[derive(Default)]
pub struct ChannelManager {
    channels: Vec<Box<dyn Channel>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, channel: Box<dyn Channel>) {
        info!(channel = channel.name(), "Channel registered");
        self.channels.push(channel);
    }

    pub fn names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    fn get(&self, name: &str) -> Option<&dyn Channel> {
        self.channels
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.as_ref())
    }

    /// Start every channel and merge their streams. A channel that fails to
    /// start is logged and skipped; it is an error only if none starts.
    pub async fn start_all(&self) -> Result<EventStream, ChannelError> {
        let mut streams = Vec::new();
        for channel in &self.channels {
            match channel.start().await {
                Ok(s) => {
                    info!(channel = channel.name(), "Channel started");
                    streams.push(s);
                }
                Err(e) => warn!(channel = channel.name(), error = %e, "Channel failed to start"),
            }
        }

        if streams.is_empty() {
            return Err(ChannelError::StartupFailed {
                name: "all".into(),
                reason: "no channel could be started".into(),
            });
        }

        Ok(Box::pin(stream::select_all(streams)))
    }

    /// Deliver a reply on the channel the event arrived on.
    pub async fn respond(&self, event: &InboundEvent, reply: &Reply) -> Result<(), ChannelError> {
        let channel = self
            .get(&event.channel)
            .ok_or_else(|| ChannelError::UnknownChannel(event.channel.clone()))?;
        channel.respond(event, reply).await
    }

    /// Run every health check; returns the failures.
    pub async fn health_check_all(&self) -> Vec<(String, ChannelError)> {
        let mut failures = Vec::new();
        for channel in &self.channels {
            if let Err(e) = channel.health_check().await {
                failures.push((channel.name().to_string(), e));
            }
        }
        failures
    }

    pub async fn shutdown_all(&self) {
        for channel in &self.channels {
            if let Err(e) = channel.shutdown().await {
                warn!(channel = channel.name(), error = %e, "Channel shutdown failed");
            }
        }
    }
}
