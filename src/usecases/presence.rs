use chrono::{DateTime, Utc};

use crate::domain::{
    chat_store::ChatStore, errors::ChatError, typing::TypingRow, user::PresenceRow,
};

use super::contracts::{map_source_error, ChatBackend};

const PRESENCE_WRITE_FAILED: &str = "CHAT_PRESENCE_WRITE_FAILED";
const TYPING_WRITE_FAILED: &str = "CHAT_TYPING_WRITE_FAILED";

/// Publishes the current user's own online state.
pub fn update_presence(
    store: &mut ChatStore,
    backend: &dyn ChatBackend,
    is_online: bool,
    now: DateTime<Utc>,
) -> Result<(), ChatError> {
    let row = PresenceRow {
        user_id: store.current_user_id()?.to_owned(),
        is_online,
        last_seen: now,
    };

    backend.upsert_presence(&row).map_err(|error| {
        tracing::warn!(
            code = PRESENCE_WRITE_FAILED,
            user_id = %row.user_id,
            is_online,
            error = %error,
            "presence write failed"
        );
        map_source_error(error)
    })?;

    store.apply_presence(&row);
    Ok(())
}

/// Publishes queued local typing transitions. Typing is best effort: failures
/// are logged and the signal is dropped. Returns how many rows were written.
pub fn flush_typing(store: &mut ChatStore, backend: &dyn ChatBackend, now: DateTime<Utc>) -> usize {
    let signals = store.take_typing_signals();
    let Ok(user_id) = store.current_user_id() else {
        return 0;
    };

    let mut written = 0;
    for signal in signals {
        let row = TypingRow {
            user_id: user_id.to_owned(),
            channel_id: signal.channel_id,
            is_typing: signal.is_typing,
            updated_at: now,
        };

        match backend.upsert_typing(&row) {
            Ok(()) => written += 1,
            Err(error) => tracing::warn!(
                code = TYPING_WRITE_FAILED,
                channel_id = %row.channel_id,
                is_typing = row.is_typing,
                error = %error,
                "typing signal dropped"
            ),
        }
    }

    written
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use super::*;
    use crate::{
        domain::{message::fixtures::at, user::User},
        infra::stubs::StubChatBackend,
        usecases::contracts::BackendError,
    };

    fn store() -> ChatStore {
        let mut store = ChatStore::default();
        store.set_current_user(Some(User::new("alice", "Alice")));
        store
    }

    #[test]
    fn presence_write_marks_user_online_locally() {
        let mut store = store();
        let backend = StubChatBackend::default();

        update_presence(&mut store, &backend, true, at(0)).expect("presence should be written");

        assert!(store.presence().is_online("alice"));
        assert_eq!(backend.calls(), vec!["upsert_presence:alice:true"]);
    }

    #[test]
    fn failed_presence_write_is_reported() {
        let mut store = store();
        let backend = StubChatBackend::default();
        backend.fail_writes(BackendError::Unavailable);

        let result = update_presence(&mut store, &backend, true, at(0));

        assert_eq!(result, Err(ChatError::TemporarilyUnavailable));
        assert!(!store.presence().is_online("alice"));
    }

    #[test]
    fn typing_burst_publishes_start_then_trailing_stop() {
        let mut store = store();
        let backend = StubChatBackend::default();

        store.note_input("c1", at(0));
        store.note_input("c1", at(1));
        assert_eq!(flush_typing(&mut store, &backend, at(1)), 1);

        store.tick(at(2));
        assert_eq!(flush_typing(&mut store, &backend, at(2)), 0);

        store.tick(at(3));
        assert_eq!(flush_typing(&mut store, &backend, at(3)), 1);

        let published: Vec<bool> = backend.typing_rows().iter().map(|row| row.is_typing).collect();
        assert_eq!(published, vec![true, false]);
        assert!(backend.typing_rows().iter().all(|row| row.user_id == "alice"));
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("log lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_typing_writes_are_dropped_with_a_warning() {
        let mut store = store();
        let backend = StubChatBackend::default();
        backend.fail_writes(BackendError::Unavailable);
        store.note_input("c1", at(0));
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();

        let written = tracing::subscriber::with_default(subscriber, || {
            flush_typing(&mut store, &backend, at(0))
        });

        assert_eq!(written, 0);
        assert!(store.take_typing_signals().is_empty());
        assert_eq!(store.error(), None);
        let output = String::from_utf8(log.0.lock().expect("log lock").clone())
            .expect("log output is utf-8");
        assert!(output.contains("WARN"));
        assert!(output.contains(TYPING_WRITE_FAILED));
    }
}
