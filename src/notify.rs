//! Broadcast hub backing LISTEN/NOTIFY.
//!
//! Channels are keyed by id: `guest_<ulid>` for a guest's personal channel,
//! `property_<ulid>` for property events, `conversation_<ulid>` for chat.
//! The wire layer subscribes on LISTEN and forwards payloads to the client;
//! the engine publishes on every mutation.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<String>>,
}

impl NotifyHub {
    pub fn new() -> Self {
        Self { channels: DashMap::new() }
    }

    /// Subscribe to a channel, creating it if needed.
    pub fn subscribe(&self, key: Ulid) -> broadcast::Receiver<String> {
        self.channels
            .entry(key)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publish a JSON-serialized event. Dropped silently if nobody listens.
    pub fn send_event(&self, key: Ulid, event: &Event) {
        if let Some(tx) = self.channels.get(&key)
            && let Ok(payload) = serde_json::to_string(event)
        {
            let _ = tx.send(payload);
        }
    }

    /// Publish a plain-text payload.
    pub fn send_text(&self, key: Ulid, payload: String) {
        if let Some(tx) = self.channels.get(&key) {
            let _ = tx.send(payload);
        }
    }

    /// Drop channels with no remaining subscribers.
    pub fn prune(&self) {
        self.channels.retain(|_, tx| tx.receiver_count() > 0);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.channels.len()
    }
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyError(pub String);

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "notify failed: {}", self.0)
    }
}

impl std::error::Error for NotifyError {}

/// Out-of-band guest notification seam (waitlist promotions, payment
/// confirmations). Failures are logged, never propagated into the mutation
/// path: the state change already committed.
pub trait Notifier: Send + Sync {
    fn notify_guest(&self, guest: Ulid, message: &str) -> Result<(), NotifyError>;
}

/// Default notifier: publish on the guest's broadcast channel.
pub struct HubNotifier {
    hub: Arc<NotifyHub>,
}

impl HubNotifier {
    pub fn new(hub: Arc<NotifyHub>) -> Self {
        Self { hub }
    }
}

impl Notifier for HubNotifier {
    fn notify_guest(&self, guest: Ulid, message: &str) -> Result<(), NotifyError> {
        self.hub.send_text(guest, message.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_then_send() {
        let hub = NotifyHub::new();
        let key = Ulid::new();
        let mut rx = hub.subscribe(key);
        hub.send_text(key, "hello".into());
        assert_eq!(rx.recv().await.unwrap(), "hello");
    }

    #[test]
    fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        hub.send_text(Ulid::new(), "nobody home".into());
    }

    #[tokio::test]
    async fn prune_drops_dead_channels() {
        let hub = NotifyHub::new();
        let key = Ulid::new();
        {
            let _rx = hub.subscribe(key);
            hub.prune();
            assert_eq!(hub.len(), 1);
        }
        hub.prune();
        assert_eq!(hub.len(), 0);
    }

    #[tokio::test]
    async fn hub_notifier_delivers_to_guest_channel() {
        let hub = Arc::new(NotifyHub::new());
        let guest = Ulid::new();
        let mut rx = hub.subscribe(guest);
        let notifier = HubNotifier::new(hub.clone());
        notifier.notify_guest(guest, "a spot opened up").unwrap();
        assert_eq!(rx.recv().await.unwrap(), "a spot opened up");
    }
}
