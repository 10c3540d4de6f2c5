use chrono::{DateTime, Utc};

use crate::{
    domain::{chat_store::ChatStore, errors::ChatError},
    realtime::subscription_manager::SubscriptionManager,
};

use super::{
    contracts::{map_source_error, ChatBackend, IdentitySource, PushSource},
    list_channels::refresh_channels,
    presence::update_presence,
};

const SESSION_STARTED: &str = "CHAT_SESSION_STARTED";
const SESSION_ENDED: &str = "CHAT_SESSION_ENDED";
const SESSION_PRESENCE_FAILED: &str = "CHAT_SESSION_PRESENCE_FAILED";

/// Signs the store in as the identity's user, loads the channel directory,
/// announces presence and opens push subscriptions when `push` is given.
pub fn start_session(
    store: &mut ChatStore,
    backend: &dyn ChatBackend,
    identity: &dyn IdentitySource,
    push: Option<&dyn PushSource>,
    subscriptions: &mut SubscriptionManager,
    now: DateTime<Utc>,
) -> Result<(), ChatError> {
    let user = identity
        .current_user()
        .map_err(map_source_error)?
        .ok_or(ChatError::NotAuthenticated)?;
    let user_id = user.id.clone();
    store.set_current_user(Some(user));

    let channels = refresh_channels(store, backend)?;

    if let Err(error) = update_presence(store, backend, true, now) {
        tracing::warn!(
            code = SESSION_PRESENCE_FAILED,
            is_online = true,
            error = %error,
            "could not announce presence"
        );
    }

    let subscribed = match push {
        Some(source) => subscriptions.setup(source),
        None => 0,
    };

    tracing::info!(
        code = SESSION_STARTED,
        user_id = %user_id,
        channels,
        subscribed,
        "chat session started"
    );
    Ok(())
}

/// Releases subscriptions, announces the user offline and clears all cached
/// state.
pub fn end_session(
    store: &mut ChatStore,
    backend: &dyn ChatBackend,
    subscriptions: &mut SubscriptionManager,
    now: DateTime<Utc>,
) {
    subscriptions.cleanup();

    if store.current_user().is_some() {
        if let Err(error) = update_presence(store, backend, false, now) {
            tracing::warn!(
                code = SESSION_PRESENCE_FAILED,
                is_online = false,
                error = %error,
                "could not announce offline state"
            );
        }
    }

    store.reset();
    tracing::info!(code = SESSION_ENDED, "chat session ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{channel::fixtures::group, message::fixtures::at, user::User},
        infra::stubs::{StubChatBackend, StubIdentity},
        realtime::subscription_manager::SubscriptionState,
    };

    fn backend() -> StubChatBackend {
        StubChatBackend::with_directory(
            vec![group("c1", "General", &["alice", "bob"])],
            vec![User::new("alice", "Alice"), User::new("bob", "Bob")],
        )
    }

    fn alice() -> StubIdentity {
        StubIdentity {
            user: Some(User::new("alice", "Alice")),
        }
    }

    #[test]
    fn start_loads_directory_announces_presence_and_subscribes() {
        let backend = backend();
        let mut store = ChatStore::default();
        let mut subscriptions = SubscriptionManager::default();

        start_session(&mut store, &backend, &alice(), Some(&backend), &mut subscriptions, at(0))
            .expect("session should start");

        assert_eq!(store.current_user_id(), Ok("alice"));
        assert_eq!(store.directory().channels().len(), 1);
        assert!(store.presence().is_online("alice"));
        assert_eq!(subscriptions.state(), SubscriptionState::Subscribed);
        assert_eq!(
            backend.calls()[..3].to_vec(),
            vec!["list_channels:alice", "list_users", "upsert_presence:alice:true"]
        );
    }

    #[test]
    fn missing_identity_is_not_authenticated() {
        let backend = backend();
        let mut store = ChatStore::default();
        let mut subscriptions = SubscriptionManager::default();

        let result = start_session(
            &mut store,
            &backend,
            &StubIdentity::default(),
            None,
            &mut subscriptions,
            at(0),
        );

        assert_eq!(result, Err(ChatError::NotAuthenticated));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn end_releases_subscriptions_and_clears_state() {
        let backend = backend();
        let mut store = ChatStore::default();
        let mut subscriptions = SubscriptionManager::default();
        start_session(&mut store, &backend, &alice(), Some(&backend), &mut subscriptions, at(0))
            .expect("session should start");

        end_session(&mut store, &backend, &mut subscriptions, at(10));

        assert_eq!(subscriptions.state(), SubscriptionState::Unsubscribed);
        assert!(store.current_user().is_none());
        assert!(store.directory().channels().is_empty());
        let last = backend.presence_rows().pop().expect("offline row should be written");
        assert!(!last.is_online);
    }
}
