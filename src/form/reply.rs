//! Outbound responses produced by the form engine.

use serde::Serialize;

use super::model::ParticipantId;

/// A button: the label shown and the key sent back when pressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub label: String,
    pub key: String,
}

/// Choice buttons arranged in rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<Choice>>,
}

impl Keyboard {
    /// Build from a static `(label, key)` layout.
    pub fn from_layout(layout: &[&[(&str, &str)]]) -> Self {
        Self {
            rows: layout
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|(label, key)| Choice {
                            label: (*label).to_string(),
                            key: (*key).to_string(),
                        })
                        .collect()
                })
                .collect(),
        }
    }

    /// All choices in display order.
    pub fn choices(&self) -> impl Iterator<Item = &Choice> {
        self.rows.iter().flatten()
    }
}

/// A single outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    TextReply {
        participant_id: ParticipantId,
        text: String,
    },
    PromptWithChoices {
        participant_id: ParticipantId,
        text: String,
        keyboard: Keyboard,
    },
    RecordReply {
        participant_id: ParticipantId,
        image_retrieval_id: String,
        caption: String,
    },
    /// Replace the message holding the last button prompt instead of sending
    /// a new one. Without a keyboard the stale buttons disappear.
    EditPreviousPrompt {
        participant_id: ParticipantId,
        text: String,
        keyboard: Option<Keyboard>,
    },
}

impl Response {
    pub fn text(participant_id: &ParticipantId, text: impl Into<String>) -> Self {
        Self::TextReply {
            participant_id: participant_id.clone(),
            text: text.into(),
        }
    }

    pub fn participant_id(&self) -> &ParticipantId {
        match self {
            Self::TextReply { participant_id, .. }
            | Self::PromptWithChoices { participant_id, .. }
            | Self::RecordReply { participant_id, .. }
            | Self::EditPreviousPrompt { participant_id, .. } => participant_id,
        }
    }

    /// The visible text of the message (the caption for record replies).
    pub fn body(&self) -> &str {
        match self {
            Self::TextReply { text, .. }
            | Self::PromptWithChoices { text, .. }
            | Self::EditPreviousPrompt { text, .. } => text,
            Self::RecordReply { caption, .. } => caption,
        }
    }
}

/// The reply to one inbound event: one response, optionally followed by an
/// informational message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub response: Response,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<Response>,
}

impl Reply {
    pub fn new(response: Response) -> Self {
        Self {
            response,
            follow_up: None,
        }
    }

    pub fn with_follow_up(mut self, follow_up: Response) -> Self {
        self.follow_up = Some(follow_up);
        self
    }

    /// Responses in delivery order.
    pub fn responses(&self) -> impl Iterator<Item = &Response> {
        std::iter::once(&self.response).chain(self.follow_up.as_ref())
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Self::new(response)
    }
}
