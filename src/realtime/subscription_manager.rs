use std::sync::mpsc::{self, Receiver, TryRecvError};

use crate::{
    domain::events::{PushEvent, PushTable},
    usecases::contracts::{PushSource, Subscription},
};

const SUBSCRIPTION_FAILED: &str = "PUSH_SUBSCRIPTION_FAILED";
const SUBSCRIPTIONS_DEGRADED: &str = "PUSH_SUBSCRIPTIONS_DEGRADED";
const SUBSCRIPTIONS_READY: &str = "PUSH_SUBSCRIPTIONS_READY";
const SUBSCRIPTIONS_RELEASED: &str = "PUSH_SUBSCRIPTIONS_RELEASED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Unsubscribed,
    Subscribing,
    Subscribed,
    Unsubscribing,
}

/// Owns the push subscriptions for messages, presence and typing.
///
/// Each `setup` opens a fresh event channel, so events queued by a previous
/// generation of subscriptions are never delivered after re-subscribing.
pub struct SubscriptionManager {
    state: SubscriptionState,
    subscriptions: Vec<Box<dyn Subscription>>,
    events: Option<Receiver<PushEvent>>,
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self {
            state: SubscriptionState::Unsubscribed,
            subscriptions: Vec::new(),
            events: None,
        }
    }
}

impl std::fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("state", &self.state)
            .field("tables", &self.active_tables())
            .finish()
    }
}

impl SubscriptionManager {
    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn active_tables(&self) -> Vec<PushTable> {
        self.subscriptions
            .iter()
            .map(|subscription| subscription.table())
            .collect()
    }

    /// Tears down existing subscriptions, then subscribes to every table.
    /// Tables that fail to subscribe are logged and left without push.
    pub fn setup(&mut self, source: &dyn PushSource) -> usize {
        self.cleanup();
        self.state = SubscriptionState::Subscribing;

        let (sink, events) = mpsc::channel();
        for table in PushTable::ALL {
            match source.subscribe(table, sink.clone()) {
                Ok(subscription) => self.subscriptions.push(subscription),
                Err(error) => tracing::warn!(
                    code = SUBSCRIPTION_FAILED,
                    table = table.as_label(),
                    error = %error,
                    "push subscription failed; table will not receive live updates"
                ),
            }
        }

        let active = self.subscriptions.len();
        if active == 0 {
            tracing::warn!(
                code = SUBSCRIPTIONS_DEGRADED,
                "no push subscriptions active; falling back to direct writes only"
            );
            self.state = SubscriptionState::Unsubscribed;
            return 0;
        }

        self.events = Some(events);
        self.state = SubscriptionState::Subscribed;
        tracing::info!(code = SUBSCRIPTIONS_READY, active, "push subscriptions ready");
        active
    }

    /// Releases every subscription. Safe to call repeatedly.
    pub fn cleanup(&mut self) {
        if self.state == SubscriptionState::Unsubscribed && self.subscriptions.is_empty() {
            return;
        }

        self.state = SubscriptionState::Unsubscribing;
        let released = self.subscriptions.len();
        self.subscriptions.clear();
        self.events = None;
        self.state = SubscriptionState::Unsubscribed;

        tracing::info!(code = SUBSCRIPTIONS_RELEASED, released, "push subscriptions released");
    }

    /// Pending events in arrival order, without blocking.
    pub fn drain(&mut self) -> Vec<PushEvent> {
        let Some(events) = &self.events else {
            return Vec::new();
        };

        let mut drained = Vec::new();
        let disconnected = loop {
            match events.try_recv() {
                Ok(event) => drained.push(event),
                Err(TryRecvError::Empty) => break false,
                Err(TryRecvError::Disconnected) => break true,
            }
        };

        if disconnected {
            self.events = None;
        }
        drained
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc::Sender,
        Arc, Mutex,
    };

    use super::*;
    use crate::usecases::contracts::BackendError;

    struct CountedSubscription {
        table: PushTable,
        live: Arc<AtomicUsize>,
    }

    impl Subscription for CountedSubscription {
        fn table(&self) -> PushTable {
            self.table
        }
    }

    impl Drop for CountedSubscription {
        fn drop(&mut self) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct StubPushSource {
        live: Arc<AtomicUsize>,
        rejected: Option<PushTable>,
        sinks: Mutex<Vec<Sender<PushEvent>>>,
    }

    impl StubPushSource {
        fn live(&self) -> usize {
            self.live.load(Ordering::SeqCst)
        }

        fn publish(&self, event: PushEvent) {
            for sink in self.sinks.lock().expect("sinks lock").iter() {
                let _ = sink.send(event.clone());
            }
        }
    }

    impl PushSource for StubPushSource {
        fn subscribe(
            &self,
            table: PushTable,
            sink: Sender<PushEvent>,
        ) -> Result<Box<dyn Subscription>, BackendError> {
            if self.rejected == Some(table) {
                return Err(BackendError::Unavailable);
            }

            self.live.fetch_add(1, Ordering::SeqCst);
            self.sinks.lock().expect("sinks lock").push(sink);
            Ok(Box::new(CountedSubscription {
                table,
                live: Arc::clone(&self.live),
            }))
        }
    }

    fn typing_event() -> PushEvent {
        PushEvent::insert(PushTable::Typing, &serde_json::json!({"user_id": "bob"}))
            .expect("event should build")
    }

    #[test]
    fn setup_subscribes_to_all_tables() {
        let source = StubPushSource::default();
        let mut manager = SubscriptionManager::default();

        assert_eq!(manager.setup(&source), 3);

        assert_eq!(manager.state(), SubscriptionState::Subscribed);
        assert_eq!(manager.active_tables(), PushTable::ALL.to_vec());
        assert_eq!(source.live(), 3);
    }

    #[test]
    fn repeated_setup_never_duplicates_handlers() {
        let source = StubPushSource::default();
        let mut manager = SubscriptionManager::default();

        manager.setup(&source);
        manager.setup(&source);

        assert_eq!(source.live(), 3);
    }

    #[test]
    fn events_from_previous_generation_are_discarded() {
        let source = StubPushSource::default();
        let mut manager = SubscriptionManager::default();
        manager.setup(&source);
        source.publish(typing_event());

        manager.setup(&source);

        assert!(manager.drain().is_empty());
    }

    #[test]
    fn cleanup_releases_everything_and_is_idempotent() {
        let source = StubPushSource::default();
        let mut manager = SubscriptionManager::default();
        manager.setup(&source);

        manager.cleanup();
        manager.cleanup();

        assert_eq!(source.live(), 0);
        assert_eq!(manager.state(), SubscriptionState::Unsubscribed);
        assert!(manager.drain().is_empty());
    }

    #[test]
    fn dropping_manager_releases_subscriptions() {
        let source = StubPushSource::default();
        {
            let mut manager = SubscriptionManager::default();
            manager.setup(&source);
        }

        assert_eq!(source.live(), 0);
    }

    #[test]
    fn failed_table_degrades_without_error() {
        let source = StubPushSource {
            rejected: Some(PushTable::Presence),
            ..StubPushSource::default()
        };
        let mut manager = SubscriptionManager::default();

        assert_eq!(manager.setup(&source), 2);
        assert_eq!(
            manager.active_tables(),
            vec![PushTable::Messages, PushTable::Typing]
        );
    }

    #[test]
    fn drain_returns_events_in_arrival_order() {
        let source = StubPushSource::default();
        let mut manager = SubscriptionManager::default();
        manager.setup(&source);
        let first = typing_event();
        let second = PushEvent::delete(PushTable::Typing, &serde_json::json!({"user_id": "bob"}))
            .expect("event should build");

        // Every subscription shares one sink, so each publish arrives three times.
        source.publish(first.clone());
        source.publish(second.clone());

        let drained = manager.drain();
        assert_eq!(drained.len(), 6);
        assert_eq!(drained[0], first);
        assert_eq!(drained[5], second);
    }
}
