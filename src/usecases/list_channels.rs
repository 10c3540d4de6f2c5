use crate::domain::{chat_store::ChatStore, errors::ChatError};

use super::contracts::{map_source_error, ChatBackend};

const CHANNELS_LOAD_FAILED: &str = "CHAT_CHANNELS_LOAD_FAILED";
const USERS_LOAD_FAILED: &str = "CHAT_USERS_LOAD_FAILED";

/// Reloads the channel directory and the user profiles used to name direct
/// channels. Returns the number of channels listed.
pub fn refresh_channels(store: &mut ChatStore, backend: &dyn ChatBackend) -> Result<usize, ChatError> {
    let user_id = store.current_user_id()?.to_owned();
    store.set_channels_loading();

    let channels = match backend.list_channels(&user_id) {
        Ok(channels) => channels,
        Err(error) => {
            let error = map_source_error(error);
            tracing::warn!(
                code = CHANNELS_LOAD_FAILED,
                user_id = %user_id,
                error = %error,
                "channel list load failed"
            );
            store.set_channels_failed(&error);
            return Err(error);
        }
    };

    match backend.list_users() {
        Ok(users) => store.set_users(users),
        Err(error) => tracing::warn!(
            code = USERS_LOAD_FAILED,
            error = %error,
            "user profiles load failed; direct channels fall back to ids"
        ),
    }

    let count = channels.len();
    store.set_channels(channels);
    Ok(count)
}
