//! Notification events for registry mutations
//!
//! Every successful submission, locator update and attachment emits exactly
//! one event after its transaction commits. External indexers subscribe (in
//! process, or over the `/events` WebSocket) to rebuild the evidence graph
//! without replaying the store.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::identifier::{ContentHash, Identifier};
use crate::types::{AgentId, Signature};

/// Registry events emitted by services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryEvent {
    EvidenceSubmitted {
        id: Identifier,
        link: Option<Identifier>,
        content_hash: ContentHash,
        account: AgentId,
        signature: Signature,
        provider: AgentId,
    },
    ResourcesUpdated {
        id: Identifier,
        content_hash: ContentHash,
        resources: String,
        account: AgentId,
        signature: Signature,
        provider: AgentId,
    },
    ExtraInfoAttached {
        id: Identifier,
        parent: Identifier,
        hash: ContentHash,
        account: AgentId,
        signature: Signature,
        provider: AgentId,
    },
}

impl RegistryEvent {
    /// Identifier of the record this event is about
    pub fn id(&self) -> &Identifier {
        match self {
            RegistryEvent::EvidenceSubmitted { id, .. }
            | RegistryEvent::ResourcesUpdated { id, .. }
            | RegistryEvent::ExtraInfoAttached { id, .. } => id,
        }
    }
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    /// Handle an event
    fn on_event(&self, event: &RegistryEvent);
}

/// Event bus for broadcasting registry events
///
/// Writers that go through [`EventBus::commit_and_emit`] commit one at a
/// time, so subscribers receive events in the order the store assigned
/// counters.
pub struct EventBus {
    sender: broadcast::Sender<RegistryEvent>,
    write_lock: Mutex<()>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new event bus with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            write_lock: Mutex::new(()),
        }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: RegistryEvent) {
        trace!(event = ?event, "Emitting registry event");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Run a store write and emit the event it produces under the write lock
    ///
    /// Nothing is emitted when `commit` fails.
    pub fn commit_and_emit<T, E>(
        &self,
        commit: impl FnOnce() -> Result<(T, RegistryEvent), E>,
    ) -> Result<T, E> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (value, event) = commit()?;
        self.emit(event);
        Ok(value)
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging event listener for audit trails
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &RegistryEvent) {
        match event {
            RegistryEvent::EvidenceSubmitted { id, link, provider, .. } => {
                debug!(
                    id = %id,
                    link = ?link.map(|l| l.to_hex()),
                    provider = %provider,
                    "Evidence submitted"
                );
            }
            RegistryEvent::ResourcesUpdated { id, resources, .. } => {
                debug!(id = %id, resources = %resources, "Resources updated");
            }
            RegistryEvent::ExtraInfoAttached { id, parent, provider, .. } => {
                debug!(id = %id, parent = %parent, provider = %provider, "Extra info attached");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_emit_receive() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.emit(RegistryEvent::ResourcesUpdated {
            id: Identifier([1u8; 32]),
            content_hash: ContentHash([3u8; 32]),
            resources: "ipfs://cid".into(),
            account: AgentId::new("acct"),
            signature: Signature::default(),
            provider: AgentId::new("owner"),
        });

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .expect("timeout")
            .expect("receive error");

        match event {
            RegistryEvent::ResourcesUpdated { id, resources, .. } => {
                assert_eq!(id, Identifier([1u8; 32]));
                assert_eq!(resources, "ipfs://cid");
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_event_bus_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        // Should not panic even with no subscribers
        bus.emit(RegistryEvent::ExtraInfoAttached {
            id: Identifier([2u8; 32]),
            parent: Identifier([1u8; 32]),
            hash: ContentHash::ZERO,
            account: AgentId::default(),
            signature: Signature::default(),
            provider: AgentId::default(),
        });
    }

    #[test]
    fn test_failed_commit_emits_nothing() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        let result: Result<(), &str> = bus.commit_and_emit(|| Err("aborted"));
        assert_eq!(result, Err("aborted"));
        assert!(receiver.try_recv().is_err());

        let value = bus
            .commit_and_emit(|| {
                Ok::<_, &str>((
                    7,
                    RegistryEvent::ExtraInfoAttached {
                        id: Identifier([2u8; 32]),
                        parent: Identifier([1u8; 32]),
                        hash: ContentHash::ZERO,
                        account: AgentId::default(),
                        signature: Signature::default(),
                        provider: AgentId::new("op"),
                    },
                ))
            })
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(receiver.try_recv().unwrap().id(), &Identifier([2u8; 32]));
    }

    #[test]
    fn test_event_json_is_tagged() {
        let event = RegistryEvent::EvidenceSubmitted {
            id: Identifier([1u8; 32]),
            link: None,
            content_hash: ContentHash([2u8; 32]),
            account: AgentId::new("a"),
            signature: Signature(vec![0xff]),
            provider: AgentId::new("p"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "evidence_submitted");
        assert_eq!(json["signature"], "ff");
        assert!(json["link"].is_null());
    }
}
