use crate::domain::{
    chat_store::{ChatStore, DeleteScope},
    errors::ChatError,
    message::MessageId,
};

use super::contracts::{map_source_error, ChatBackend};

const MESSAGE_DELETE_FAILED: &str = "CHAT_MESSAGE_DELETE_FAILED";

/// Marks a message deleted. Repeating a deletion that already happened issues
/// no write.
pub fn delete_message(
    store: &mut ChatStore,
    backend: &dyn ChatBackend,
    message_id: &MessageId,
    scope: DeleteScope,
) -> Result<(), ChatError> {
    let Some(request) = store.prepare_delete(message_id, scope)? else {
        return Ok(());
    };

    let outcome = backend
        .mark_deleted(&request.message_id, scope == DeleteScope::ForEveryone)
        .map_err(map_source_error);
    if let Err(error) = &outcome {
        tracing::warn!(
            code = MESSAGE_DELETE_FAILED,
            message_id = %request.message_id,
            error = %error,
            "message delete failed"
        );
    }

    store.apply_delete(&request, outcome)
}
