use std::sync::mpsc::Sender;

use tokio::{
    runtime::Handle,
    sync::{broadcast, watch},
};

use crate::{domain::events::{PushEvent, PushTable}, usecases::contracts::Subscription};

const PUSH_RELAY_STARTED: &str = "PUSH_RELAY_STARTED";
const PUSH_RELAY_STOPPED: &str = "PUSH_RELAY_STOPPED";
const PUSH_RELAY_STOP_SIGNAL_SENT: &str = "PUSH_RELAY_STOP_SIGNAL_SENT";
const PUSH_RELAY_SINK_CLOSED: &str = "PUSH_RELAY_SINK_CLOSED";
const PUSH_RELAY_LAGGED: &str = "PUSH_RELAY_LAGGED";

/// Forwards one table's broadcast feed into the shell's event channel until
/// dropped.
#[derive(Debug)]
pub struct PushRelay {
    table: PushTable,
    stop_tx: Option<watch::Sender<bool>>,
}

impl PushRelay {
    pub fn start(
        runtime: &Handle,
        table: PushTable,
        feed: broadcast::Receiver<PushEvent>,
        sink: Sender<PushEvent>,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        runtime.spawn(run_relay(table, feed, sink, stop_rx));

        tracing::info!(
            code = PUSH_RELAY_STARTED,
            table = table.as_label(),
            "push relay started"
        );

        Self {
            table,
            stop_tx: Some(stop_tx),
        }
    }
}

impl Subscription for PushRelay {
    fn table(&self) -> PushTable {
        self.table
    }
}

impl Drop for PushRelay {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
            tracing::info!(
                code = PUSH_RELAY_STOP_SIGNAL_SENT,
                table = self.table.as_label(),
                "push relay stop signal sent"
            );
        }
    }
}

async fn run_relay(
    table: PushTable,
    mut feed: broadcast::Receiver<PushEvent>,
    sink: Sender<PushEvent>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    tracing::info!(
                        code = PUSH_RELAY_STOPPED,
                        table = table.as_label(),
                        "push relay stopped"
                    );
                    return;
                }
            }
            received = feed.recv() => {
                match received {
                    Ok(event) if event.table == table => {
                        if sink.send(event).is_err() {
                            tracing::warn!(
                                code = PUSH_RELAY_SINK_CLOSED,
                                table = table.as_label(),
                                "push relay sink closed"
                            );
                            return;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            code = PUSH_RELAY_LAGGED,
                            table = table.as_label(),
                            skipped,
                            "push relay fell behind; events were skipped"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!(
                            code = PUSH_RELAY_STOPPED,
                            table = table.as_label(),
                            "push feed closed"
                        );
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::mpsc, time::Duration};

    use tokio::runtime::Runtime;

    use super::*;

    fn runtime() -> Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("runtime should build")
    }

    fn event(table: PushTable) -> PushEvent {
        PushEvent::insert(table, &serde_json::json!({"user_id": "bob"})).expect("event should build")
    }

    #[test]
    fn forwards_events_of_its_table_only() {
        let runtime = runtime();
        let (feed_tx, feed_rx) = broadcast::channel(16);
        let (sink_tx, sink_rx) = mpsc::channel();
        let _relay = PushRelay::start(runtime.handle(), PushTable::Typing, feed_rx, sink_tx);

        feed_tx.send(event(PushTable::Presence)).expect("feed should accept");
        feed_tx.send(event(PushTable::Typing)).expect("feed should accept");

        let received = sink_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("typing event should be relayed");
        assert_eq!(received.table, PushTable::Typing);
        assert!(sink_rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn dropping_relay_stops_forwarding() {
        let runtime = runtime();
        let (feed_tx, feed_rx) = broadcast::channel(16);
        let (sink_tx, sink_rx) = mpsc::channel();
        let relay = PushRelay::start(runtime.handle(), PushTable::Messages, feed_rx, sink_tx);

        drop(relay);

        // The relay task owns the sink; once it exits the channel disconnects.
        let _ = feed_tx.send(event(PushTable::Messages));
        let mut disconnected = false;
        for _ in 0..20 {
            match sink_rx.recv_timeout(Duration::from_millis(100)) {
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    disconnected = true;
                    break;
                }
                _ => continue,
            }
        }
        assert!(disconnected);
    }
}
