use serde::{Deserialize, Serialize};

/// Logical tables that publish change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushTable {
    Messages,
    Presence,
    Typing,
}

impl PushTable {
    pub const ALL: [PushTable; 3] = [Self::Messages, Self::Presence, Self::Typing];

    pub fn as_label(self) -> &'static str {
        match self {
            Self::Messages => "messages",
            Self::Presence => "presence",
            Self::Typing => "typing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushEventType {
    Insert,
    Update,
    Delete,
}

/// Row change notification as delivered by the push service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushEvent {
    pub event_type: PushEventType,
    pub table: PushTable,
    #[serde(default)]
    pub old_row: Option<serde_json::Value>,
    #[serde(default)]
    pub new_row: Option<serde_json::Value>,
}

impl PushEvent {
    pub fn insert<T: Serialize>(table: PushTable, row: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_type: PushEventType::Insert,
            table,
            old_row: None,
            new_row: Some(serde_json::to_value(row)?),
        })
    }

    pub fn update<T: Serialize>(table: PushTable, row: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_type: PushEventType::Update,
            table,
            old_row: None,
            new_row: Some(serde_json::to_value(row)?),
        })
    }

    pub fn delete<T: Serialize>(table: PushTable, row: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_type: PushEventType::Delete,
            table,
            old_row: Some(serde_json::to_value(row)?),
            new_row: None,
        })
    }
}

/// Inputs driving the console shell loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    Tick,
    QuitRequested,
    Command(ShellCommand),
}

/// Parsed console input. Message positions are 1-based indexes into the open channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Send(String),
    Typing,
    ListChannels,
    Open(String),
    Filter(String),
    Reply(usize),
    CancelReply,
    Edit { position: usize, content: String },
    Delete { position: usize, for_everyone: bool },
    React { position: usize, emoji: String },
    Select(usize),
    /// Without a position the selected messages are forwarded.
    Forward { position: Option<usize>, targets: Vec<String> },
    Search(String),
    Help,
    Unknown(String),
}
