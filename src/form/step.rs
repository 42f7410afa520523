//! Form steps — the fixed, totally ordered collection sequence.

use serde::{Deserialize, Serialize};

use super::model::Field;

/// One stage of the collection sequence.
///
/// Progresses linearly and wraps: Idle → Name → Age → Gender → Photo →
/// Education → WantsNews → Idle. `Idle` means "no active form".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    Idle,
    Name,
    Age,
    Gender,
    Photo,
    Education,
    WantsNews,
}

impl Step {
    /// The collection steps in order, excluding `Idle`.
    pub const COLLECTION: [Step; 6] = [
        Step::Name,
        Step::Age,
        Step::Gender,
        Step::Photo,
        Step::Education,
        Step::WantsNews,
    ];

    /// Check if advancing from `self` to `target` is valid.
    ///
    /// Only forward moves along the sequence are allowed. Cancellation back to
    /// `Idle` is not an advance and is handled by the session store directly.
    pub fn can_transition_to(&self, target: Step) -> bool {
        use Step::*;
        matches!(
            (self, target),
            (Idle, Name)
                | (Name, Age)
                | (Age, Gender)
                | (Gender, Photo)
                | (Photo, Education)
                | (Education, WantsNews)
                | (WantsNews, Idle)
        )
    }

    /// The next step in the sequence.
    pub fn next(&self) -> Step {
        use Step::*;
        match self {
            Idle => Name,
            Name => Age,
            Age => Gender,
            Gender => Photo,
            Photo => Education,
            Education => WantsNews,
            WantsNews => Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Whether a successful answer at this step completes the form.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::WantsNews)
    }

    /// The field collected at this step, if any.
    pub fn field(&self) -> Option<Field> {
        match self {
            Self::Idle => None,
            Self::Name => Some(Field::Name),
            Self::Age => Some(Field::Age),
            Self::Gender => Some(Field::Gender),
            Self::Photo => Some(Field::Photo),
            Self::Education => Some(Field::Education),
            Self::WantsNews => Some(Field::WantsNews),
        }
    }

    /// Fields that must already be collected when a session sits at this step.
    pub fn preceding_fields(&self) -> Vec<Field> {
        Self::COLLECTION
            .iter()
            .take_while(|s| *s != self)
            .filter_map(Step::field)
            .collect()
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
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
