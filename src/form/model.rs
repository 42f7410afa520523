//! Form data models — participants, collected answers, sessions and
//! completed records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::step::Step;

/// Opaque participant identity (a Telegram user id, a CLI user name, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<i64> for ParticipantId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Names of the collected fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Age,
    Gender,
    Photo,
    Education,
    WantsNews,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Name => "name",
            Self::Age => "age",
            Self::Gender => "gender",
            Self::Photo => "photo",
            Self::Education => "education",
            Self::WantsNews => "wants_news",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Undefined,
}

impl Gender {
    /// Map a button key to a gender. Accepts both the button keys the bot
    /// sends (`undefined_gender`) and the bare names.
    pub fn from_choice_key(key: &str) -> Option<Self> {
        match key {
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            "undefined_gender" | "undefined" => Some(Self::Undefined),
            _ => None,
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Male => write!(f, "male"),
            Self::Female => write!(f, "female"),
            Self::Undefined => write!(f, "undefined"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Education {
    Secondary,
    Higher,
    #[serde(rename = "none")]
    NoFormal,
}

impl Education {
    pub fn from_choice_key(key: &str) -> Option<Self> {
        match key {
            "secondary" => Some(Self::Secondary),
            "higher" => Some(Self::Higher),
            "no_edu" | "none" => Some(Self::NoFormal),
            _ => None,
        }
    }
}

impl std::fmt::Display for Education {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Secondary => write!(f, "secondary"),
            Self::Higher => write!(f, "higher"),
            Self::NoFormal => write!(f, "none"),
        }
    }
}

/// The stored photo: a stable unique id plus the id used to fetch or resend it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRef {
    pub unique_id: String,
    pub retrieval_id: String,
}

/// A validated answer, tagged with the field it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Name(String),
    Age(u8),
    Gender(Gender),
    Photo(PhotoRef),
    Education(Education),
    WantsNews(bool),
}

impl FieldValue {
    pub fn field(&self) -> Field {
        match self {
            Self::Name(_) => Field::Name,
            Self::Age(_) => Field::Age,
            Self::Gender(_) => Field::Gender,
            Self::Photo(_) => Field::Photo,
            Self::Education(_) => Field::Education,
            Self::WantsNews(_) => Field::WantsNews,
        }
    }
}

/// Answers collected so far in an active session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collected {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<PhotoRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education: Option<Education>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wants_news: Option<bool>,
}

impl Collected {
    /// Store a value. Returns `false` and leaves the data untouched if the
    /// field is already set.
    pub fn insert(&mut self, value: FieldValue) -> bool {
        if self.contains(value.field()) {
            return false;
        }
        match value {
            FieldValue::Name(v) => self.name = Some(v),
            FieldValue::Age(v) => self.age = Some(v),
            FieldValue::Gender(v) => self.gender = Some(v),
            FieldValue::Photo(v) => self.photo = Some(v),
            FieldValue::Education(v) => self.education = Some(v),
            FieldValue::WantsNews(v) => self.wants_news = Some(v),
        }
        true
    }

    pub fn contains(&self, field: Field) -> bool {
        match field {
            Field::Name => self.name.is_some(),
            Field::Age => self.age.is_some(),
            Field::Gender => self.gender.is_some(),
            Field::Photo => self.photo.is_some(),
            Field::Education => self.education.is_some(),
            Field::WantsNews => self.wants_news.is_some(),
        }
    }

    /// Fields currently set, in collection order.
    pub fn fields(&self) -> Vec<Field> {
        Step::COLLECTION
            .iter()
            .filter_map(Step::field)
            .filter(|f| self.contains(*f))
            .collect()
    }

    /// Convert into complete form data. `None` if any answer is missing.
    pub fn into_form_data(self) -> Option<FormData> {
        Some(FormData {
            name: self.name?,
            age: self.age?,
            gender: self.gender?,
            photo: self.photo?,
            education: self.education?,
            wants_news: self.wants_news?,
        })
    }
}

/// Per-participant progress through the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub participant_id: ParticipantId,
    pub step: Step,
    pub collected: Collected,
    pub started_at: DateTime<Utc>,
}

impl Session {
    /// A fresh session waiting for the first answer.
    pub fn new(participant_id: ParticipantId) -> Self {
        Self {
            participant_id,
            step: Step::Idle.next(),
            collected: Collected::default(),
            started_at: Utc::now(),
        }
    }
}

/// All six answers of a fully traversed form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormData {
    pub name: String,
    pub age: u8,
    pub gender: Gender,
    pub photo: PhotoRef,
    pub education: Education,
    pub wants_news: bool,
}

/// Immutable snapshot of a completed form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedRecord {
    pub participant_id: ParticipantId,
    #[serde(flatten)]
    pub data: FormData,
    pub completed_at: DateTime<Utc>,
}

impl CompletedRecord {
    pub fn new(participant_id: ParticipantId, data: FormData) -> Self {
        Self {
            participant_id,
            data,
            completed_at: Utc::now(),
        }
    }
}
