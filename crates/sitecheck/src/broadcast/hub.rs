//! Scoped notification channels.
//!
//! Each job has its own channel, and each role has one for events aimed at
//! everyone holding that role. Subscriptions are checked against the
//! subscriber's role here so the core only ever asks to publish.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use tokio::sync::broadcast;

use super::events::JobEvent;
use crate::error::SubscribeError;
use crate::lifecycle::Role;

/// Where an event is published.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    Job(String),
    Role(Role),
}

impl Channel {
    pub fn job(id: &str) -> Self {
        Channel::Job(id.to_string())
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Job(id) => write!(f, "job:{}", id),
            Channel::Role(role) => write!(f, "role:{}", role.as_str()),
        }
    }
}

/// Publish/subscribe transport. Delivery is best effort: a publish with no
/// subscribers is dropped, and slow subscribers may miss events.
pub trait NotificationTransport: Send + Sync {
    fn publish(&self, channel: &Channel, event: JobEvent);

    fn subscribe(
        &self,
        role: Role,
        channel: &Channel,
    ) -> Result<broadcast::Receiver<JobEvent>, SubscribeError>;
}

/// In-process transport backed by one tokio broadcast channel per scope.
pub struct BroadcastHub {
    capacity: usize,
    channels: Mutex<HashMap<Channel, broadcast::Sender<JobEvent>>>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live receivers on a channel.
    pub fn receiver_count(&self, channel: &Channel) -> usize {
        self.channels
            .lock()
            .ok()
            .and_then(|map| map.get(channel).map(|s| s.receiver_count()))
            .unwrap_or(0)
    }

    fn authorize(role: Role, channel: &Channel) -> Result<(), SubscribeError> {
        let allowed = match channel {
            Channel::Job(_) => true,
            Channel::Role(scope) => role == Role::Administrator || role == *scope,
        };
        if allowed {
            Ok(())
        } else {
            Err(SubscribeError::Unauthorized {
                role,
                channel: channel.to_string(),
            })
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(100)
    }
}

impl NotificationTransport for BroadcastHub {
    fn publish(&self, channel: &Channel, event: JobEvent) {
        let sender = match self.channels.lock() {
            Ok(map) => map.get(channel).cloned(),
            Err(_) => {
                log::warn!("Notification hub lock poisoned; dropping event for {}", channel);
                return;
            }
        };

        if let Some(sender) = sender {
            log::trace!("Publishing {} (seq {}) to {}", event.kind, event.seq, channel);
            // No active receivers is fine
            let _ = sender.send(event);
        }
    }

    fn subscribe(
        &self,
        role: Role,
        channel: &Channel,
    ) -> Result<broadcast::Receiver<JobEvent>, SubscribeError> {
        Self::authorize(role, channel)?;

        let mut map = match self.channels.lock() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        let sender = map
            .entry(channel.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        Ok(sender.subscribe())
    }
}
