//! Inbound events as the form engine sees them, independent of transport.

use serde::{Deserialize, Serialize};

/// Bot commands a participant can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Start,
    Cancel,
    FillForm,
    ShowData,
}

impl Command {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "start" => Some(Self::Start),
            "cancel" => Some(Self::Cancel),
            "fillform" => Some(Self::FillForm),
            "showdata" => Some(Self::ShowData),
            _ => None,
        }
    }

    /// Parse a slash command such as `/fillform` or `/fillform@SomeBot`.
    /// Anything after the first whitespace is ignored.
    pub fn parse_slash(text: &str) -> Option<Self> {
        let word = text.trim().strip_prefix('/')?.split_whitespace().next()?;
        let name = word.split('@').next().unwrap_or(word);
        Self::from_name(&name.to_lowercase())
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Start => "start",
            Self::Cancel => "cancel",
            Self::FillForm => "fillform",
            Self::ShowData => "showdata",
        };
        write!(f, "/{s}")
    }
}

/// One resolution of an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageVariant {
    /// Stable identifier, identical across re-uploads of the same file.
    pub unique_id: String,
    /// Identifier used to fetch or resend the file.
    pub retrieval_id: String,
    /// Byte size, or pixel count when the transport does not report bytes.
    pub size: u64,
}

/// An inbound event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TextMessage { text: String },
    ChoiceSelection { choice_key: String },
    ImageUpload { images: Vec<ImageVariant> },
    Command { command: Command },
}

impl Event {
    pub fn text(text: impl Into<String>) -> Self {
        Self::TextMessage { text: text.into() }
    }

    pub fn choice(key: impl Into<String>) -> Self {
        Self::ChoiceSelection {
            choice_key: key.into(),
        }
    }

    pub fn images(images: Vec<ImageVariant>) -> Self {
        Self::ImageUpload { images }
    }

    pub fn command(command: Command) -> Self {
        Self::Command { command }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::TextMessage { .. } => EventKind::Text,
            Self::ChoiceSelection { .. } => EventKind::Choice,
            Self::ImageUpload { .. } => EventKind::Image,
            Self::Command { .. } => EventKind::Command,
        }
    }
}

/// The kind of an event, used as half of the transition table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Text,
    Choice,
    Image,
    Command,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Text => "text",
            Self::Choice => "choice",
            Self::Image => "image",
            Self::Command => "command",
        };
        write!(f, "{s}")
    }
}
