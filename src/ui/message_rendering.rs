//! Message list rendering logic.
//!
//! Handles text formatting of a channel history:
//! - Numbered messages, so commands can address them by position
//! - Sender grouping (consecutive messages from same sender show name only once)
//! - Date separators between messages from different days
//! - Reply previews, edit marks, reactions and delivery markers

use chrono::{DateTime, Local, NaiveDate, Utc};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::domain::message::Message;

const INDENT: &str = "      ";
const REPLY_PREVIEW_MAX_WIDTH: usize = 40;

/// Represents a visual element in the messages list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageListElement {
    /// Date separator line (e.g., "——— 14 Feb 2026 ———").
    DateSeparator(String),
    Message {
        position: usize,
        time: String,
        sender: Option<String>,
        content: String,
        reply: Option<String>,
        edited: bool,
        reactions: Option<String>,
        /// Only set on the viewer's own messages.
        delivery: Option<&'static str>,
    },
}

/// Builds a list of visual elements from visible messages, oldest first.
/// `reply_lookup` resolves the message a reply points to.
pub fn build_message_list_elements<'a, F>(
    messages: &[&'a Message],
    viewer_id: &str,
    reply_lookup: F,
) -> Vec<MessageListElement>
where
    F: Fn(&Message) -> Option<&'a Message>,
{
    let mut elements = Vec::new();
    let mut prev_date: Option<NaiveDate> = None;
    let mut prev_sender: Option<&str> = None;

    for (index, &message) in messages.iter().enumerate() {
        let msg_date = local_date(message.created_at);

        if prev_date != Some(msg_date) {
            elements.push(MessageListElement::DateSeparator(format_date(msg_date)));
            prev_sender = None;
        }

        let sender_name = message.sender_name();
        let sender = (prev_sender != Some(sender_name)).then(|| sender_name.to_owned());
        let reply = reply_lookup(message).map(|original| {
            format!("{}: {}", original.sender_name(), truncate(&original.display_content()))
        });

        elements.push(MessageListElement::Message {
            position: index + 1,
            time: format_time(message.created_at),
            sender,
            content: message.display_content(),
            reply,
            edited: message.edited && !message.deleted_for_everyone,
            reactions: (!message.reactions.is_empty()).then(|| message.reactions.summary()),
            delivery: message
                .is_own(viewer_id)
                .then(|| message.delivery_status().marker()),
        });

        prev_date = Some(msg_date);
        prev_sender = Some(sender_name);
    }

    elements
}

/// Text lines for one element.
pub fn element_lines(element: &MessageListElement) -> Vec<String> {
    match element {
        MessageListElement::DateSeparator(date) => vec![String::new(), format!("——— {date} ———")],
        MessageListElement::Message {
            position,
            time,
            sender,
            content,
            reply,
            edited,
            reactions,
            delivery,
        } => {
            let mut lines = Vec::new();
            if let Some(name) = sender {
                lines.push(format!("{INDENT}{name}:"));
            }
            if let Some(reply) = reply {
                lines.push(format!("{INDENT}↳ {reply}"));
            }

            let mut content_lines = content.lines();
            let first = content_lines.next().unwrap_or("[Empty message]");
            let mut head = format!("{:>3} {time:>5} {first}", format!("{position}."));
            if *edited {
                head.push_str(" (edited)");
            }
            if let Some(marker) = delivery {
                head.push(' ');
                head.push_str(marker);
            }
            lines.push(head);
            lines.extend(content_lines.map(|line| format!("{INDENT}    {line}")));

            if let Some(reactions) = reactions {
                lines.push(format!("{INDENT}    [{reactions}]"));
            }
            lines
        }
    }
}

/// Cuts `text` to the preview column budget, counting wide glyphs as two.
fn truncate(text: &str) -> String {
    if text.width() <= REPLY_PREVIEW_MAX_WIDTH {
        return text.to_owned();
    }

    let mut truncated = String::new();
    let mut width = 0;
    for ch in text.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if width + ch_width > REPLY_PREVIEW_MAX_WIDTH - 1 {
            break;
        }
        width += ch_width;
        truncated.push(ch);
    }
    truncated.push('…');
    truncated
}

fn local_date(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Local).date_naive()
}

fn format_date(date: NaiveDate) -> String {
    date.format("%d %b %Y").to_string()
}

fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M").to_string()
}
