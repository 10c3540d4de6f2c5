use chrono::{DateTime, Utc};

use crate::domain::{
    channel::Channel,
    channel_directory::DirectoryUiState,
    chat_store::ChatStore,
    shell_state::{Panel, ShellState},
};

use super::{
    commands::HELP_LINES,
    message_rendering::{build_message_list_elements, element_lines},
};

/// Renders one full text frame of the shell.
pub fn render(store: &ChatStore, state: &ShellState, now: DateTime<Utc>) -> Vec<String> {
    let mut lines = vec![header_line(store)];

    if let Some(error) = store.error() {
        lines.push(format!("! {error}"));
    }

    match state.panel() {
        Panel::Channels => render_channels(store, &mut lines),
        Panel::Conversation => render_conversation(store, now, &mut lines),
        Panel::Search { query, results } => {
            lines.push(format!("Search results for \"{query}\":"));
            if results.is_empty() {
                lines.push("  No messages found.".to_owned());
            }
            for message in results {
                let channel = store
                    .directory()
                    .get(&message.channel_id)
                    .map(|channel| store.channel_name(channel))
                    .unwrap_or_else(|| message.channel_id.clone());
                lines.push(format!(
                    "  [{channel}] {}: {}",
                    message.sender_name(),
                    message.preview()
                ));
            }
        }
        Panel::Help => lines.extend(HELP_LINES.iter().map(|line| format!("  {line}"))),
    }

    lines
}

fn header_line(store: &ChatStore) -> String {
    let user = store
        .current_user()
        .map(|user| user.display_name.as_str())
        .unwrap_or("signed out");
    let unread = store.directory().total_unread();

    if unread == 0 {
        format!("== commhub · {user} ==")
    } else {
        format!("== commhub · {user} · {unread} unread ==")
    }
}

fn render_channels(store: &ChatStore, lines: &mut Vec<String>) {
    match store.directory().ui_state() {
        DirectoryUiState::Loading => {
            lines.push("Loading channels...".to_owned());
            return;
        }
        DirectoryUiState::Empty => {
            lines.push("No channels yet.".to_owned());
            return;
        }
        DirectoryUiState::Error => {
            lines.push("Channels could not be loaded. Try /channels again.".to_owned());
            return;
        }
        DirectoryUiState::Ready => {}
    }

    let channels = store.filtered_channels();
    if channels.is_empty() {
        lines.push(format!(
            "No channels match \"{}\".",
            store.directory().search_query()
        ));
        return;
    }

    let selected = store.selected_channel_id();
    for channel in channels {
        lines.push(channel_line(store, channel, selected == Some(channel.id.as_str())));
    }
}

fn channel_line(store: &ChatStore, channel: &Channel, selected: bool) -> String {
    let cursor = if selected { ">" } else { " " };
    let kind = if channel.is_announcement {
        "!"
    } else if channel.is_direct() {
        "@"
    } else {
        "#"
    };

    let mut line = format!("{cursor} {kind} {}", store.channel_name(channel));
    if channel.unread_count > 0 {
        line.push_str(&format!(" ({})", channel.unread_count));
    }
    if let Some(last) = &channel.last_message {
        line.push_str(&format!("  {}", last.preview));
    }
    line
}

fn render_conversation(store: &ChatStore, now: DateTime<Utc>, lines: &mut Vec<String>) {
    let Some(channel) = store.directory().selected() else {
        lines.push("No channel open. Use /open <name>.".to_owned());
        return;
    };

    lines.push(conversation_title(store, channel, now));

    let viewer = store.current_user_id().unwrap_or_default();
    let messages = store.visible_messages(&channel.id);
    if messages.is_empty() {
        lines.push("  No messages yet.".to_owned());
    }

    let elements =
        build_message_list_elements(&messages, viewer, |message| store.reply_preview(message));
    for element in &elements {
        lines.extend(element_lines(element));
    }

    if let Some(indicator) = store.typing_indicator(&channel.id) {
        lines.push(format!("  {indicator}"));
    }
    if let Some(reply) = store.replying_to() {
        lines.push(format!(
            "  Replying to {}: {} (/cancel to drop)",
            reply.sender_name(),
            reply.preview()
        ));
    }
    let selected = store.selected_in_channel(&channel.id).len();
    if selected > 0 {
        lines.push(format!(
            "  {selected} selected (/forward <channels> to send, /cancel to clear)"
        ));
    }
}

fn conversation_title(store: &ChatStore, channel: &Channel, now: DateTime<Utc>) -> String {
    let name = store.channel_name(channel);
    let viewer = store.current_user_id().unwrap_or_default();

    match channel.counterpart(viewer) {
        Some(user_id) => format!("@ {name} ({})", store.presence().last_seen_label(user_id, now)),
        None => match channel.description.as_deref() {
            Some(description) => format!("# {name} — {description}"),
            None => format!("# {name}"),
        },
    }
}
