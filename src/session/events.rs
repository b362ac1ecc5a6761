// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Session events and observer registration.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use super::state::ConnectionState;

/// Events emitted by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The connection state changed.
    StateChanged(ConnectionState),
    /// A complete line was read, delimiter stripped.
    LineRead(String),
    /// Bytes were handed to the transport.
    BytesWritten(Vec<u8>),
}

/// Receives events from a session.
///
/// Called on the session task; implementations should return quickly.
pub trait SessionObserver: Send + Sync {
    fn on_event(&self, event: &SessionEvent);
}

impl<F> SessionObserver for F
where
    F: Fn(&SessionEvent) + Send + Sync,
{
    fn on_event(&self, event: &SessionEvent) {
        self(event)
    }
}

/// Observer forwarding every event into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { tx }
    }

    /// Create an observer together with the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SessionObserver for ChannelObserver {
    fn on_event(&self, event: &SessionEvent) {
        // Receiver gone just means nobody listens anymore.
        let _ = self.tx.send(event.clone());
    }
}

/// Handle returned by [`ObserverSet::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Registered observers, notified in registration order.
///
/// Notification works on a snapshot, so observers may subscribe or
/// unsubscribe (even themselves) while an event is being delivered.
#[derive(Default)]
pub struct ObserverSet {
    next_id: AtomicU64,
    observers: RwLock<Vec<(SubscriptionId, Arc<dyn SessionObserver>)>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn SessionObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, observer));
        debug!("Observer {:?} subscribed", id);
        id
    }

    /// Returns `false` if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        let removed = observers.len() != before;
        if removed {
            debug!("Observer {:?} unsubscribed", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    pub fn notify(&self, event: &SessionEvent) {
        let snapshot: Vec<Arc<dyn SessionObserver>> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for observer in snapshot {
            observer.on_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_notify_in_registration_order() {
        let set = ObserverSet::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = seen.clone();
            set.subscribe(Arc::new(move |_: &SessionEvent| seen.lock().push(tag)));
        }

        set.notify(&SessionEvent::LineRead("x".to_string()));
        assert_eq!(*seen.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unsubscribe() {
        let set = ObserverSet::new();
        let (observer, mut rx) = ChannelObserver::channel();
        let id = set.subscribe(Arc::new(observer));
        assert_eq!(set.len(), 1);

        assert!(set.unsubscribe(id));
        assert!(!set.unsubscribe(id));
        assert!(set.is_empty());

        set.notify(&SessionEvent::LineRead("dropped".to_string()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe_during_notification() {
        let set = Arc::new(ObserverSet::new());
        let calls = Arc::new(Mutex::new(0));
        let own_id = Arc::new(Mutex::new(None));

        let observer = {
            let set = set.clone();
            let calls = calls.clone();
            let own_id = own_id.clone();
            move |_: &SessionEvent| {
                *calls.lock() += 1;
                if let Some(id) = own_id.lock().take() {
                    set.unsubscribe(id);
                }
            }
        };
        *own_id.lock() = Some(set.subscribe(Arc::new(observer)));

        set.notify(&SessionEvent::BytesWritten(b"a".to_vec()));
        set.notify(&SessionEvent::BytesWritten(b"b".to_vec()));
        assert_eq!(*calls.lock(), 1);
        assert!(set.is_empty());
    }

    #[test]
    fn test_channel_observer_forwards() {
        let (observer, mut rx) = ChannelObserver::channel();
        observer.on_event(&SessionEvent::StateChanged(ConnectionState::Disconnected));
        assert_eq!(
            rx.try_recv().ok(),
            Some(SessionEvent::StateChanged(ConnectionState::Disconnected))
        );
    }
}
