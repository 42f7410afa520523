//! Step definitions — the transition table of the form.
//!
//! Each collection step names the one event kind it accepts, the validator
//! for that event, where to go on success and what to show. The engine does
//! no per-step branching of its own; everything step-specific lives here.

use super::event::{Event, EventKind};
use super::model::FieldValue;
use super::prompts;
use super::reply::Keyboard;
use super::step::Step;
use super::validate::{self, ValidationFailure};

/// Turns an accepted event into a field value.
pub type Validator = fn(&Event) -> Result<FieldValue, ValidationFailure>;

/// Static description of one collection step.
pub struct StepDef {
    pub step: Step,
    /// The only event kind that can advance this step.
    pub accepts: EventKind,
    pub validate: Validator,
    /// Step entered on success.
    pub next: Step,
    /// Text shown when entering the step.
    pub prompt: &'static str,
    /// Text shown when the answer is rejected.
    pub error: &'static str,
    /// Buttons offered with the prompt and with the error.
    pub choices: Option<&'static [&'static [(&'static str, &'static str)]]>,
}

impl StepDef {
    pub fn keyboard(&self) -> Option<Keyboard> {
        self.choices.map(Keyboard::from_layout)
    }
}

static STEPS: [StepDef; 6] = [
    StepDef {
        step: Step::Name,
        accepts: EventKind::Text,
        validate: accept_name,
        next: Step::Age,
        prompt: prompts::NAME_PROMPT,
        error: prompts::NAME_ERROR,
        choices: None,
    },
    StepDef {
        step: Step::Age,
        accepts: EventKind::Text,
        validate: accept_age,
        next: Step::Gender,
        prompt: prompts::AGE_PROMPT,
        error: prompts::AGE_ERROR,
        choices: None,
    },
    StepDef {
        step: Step::Gender,
        accepts: EventKind::Choice,
        validate: accept_gender,
        next: Step::Photo,
        prompt: prompts::GENDER_PROMPT,
        error: prompts::GENDER_ERROR,
        choices: Some(prompts::GENDER_CHOICES),
    },
    StepDef {
        step: Step::Photo,
        accepts: EventKind::Image,
        validate: accept_photo,
        next: Step::Education,
        prompt: prompts::PHOTO_PROMPT,
        error: prompts::PHOTO_ERROR,
        choices: None,
    },
    StepDef {
        step: Step::Education,
        accepts: EventKind::Choice,
        validate: accept_education,
        next: Step::WantsNews,
        prompt: prompts::EDUCATION_PROMPT,
        error: prompts::EDUCATION_ERROR,
        choices: Some(prompts::EDUCATION_CHOICES),
    },
    StepDef {
        step: Step::WantsNews,
        accepts: EventKind::Choice,
        validate: accept_wants_news,
        next: Step::Idle,
        prompt: prompts::WANTS_NEWS_PROMPT,
        error: prompts::WANTS_NEWS_ERROR,
        choices: Some(prompts::WANTS_NEWS_CHOICES),
    },
];

/// All step definitions in collection order.
pub fn all() -> &'static [StepDef] {
    &STEPS
}

/// Definition of a collection step. `None` for `Idle`.
pub fn definition(step: Step) -> Option<&'static StepDef> {
    STEPS.iter().find(|def| def.step == step)
}

/// Look up the handler for `(step, kind)`. `None` means the event does not
/// belong to this step.
pub fn transition(step: Step, kind: EventKind) -> Option<&'static StepDef> {
    definition(step).filter(|def| def.accepts == kind)
}

fn accept_name(event: &Event) -> Result<FieldValue, ValidationFailure> {
    match event {
        Event::TextMessage { text } => validate::name(text).map(FieldValue::Name),
        _ => Err(ValidationFailure::Empty),
    }
}

fn accept_age(event: &Event) -> Result<FieldValue, ValidationFailure> {
    match event {
        Event::TextMessage { text } => validate::age(text).map(FieldValue::Age),
        _ => Err(ValidationFailure::Empty),
    }
}

fn accept_gender(event: &Event) -> Result<FieldValue, ValidationFailure> {
    match event {
        Event::ChoiceSelection { choice_key } => {
            validate::gender(choice_key).map(FieldValue::Gender)
        }
        _ => Err(ValidationFailure::Empty),
    }
}

fn accept_photo(event: &Event) -> Result<FieldValue, ValidationFailure> {
    match event {
        Event::ImageUpload { images } => validate::largest_photo(images).map(FieldValue::Photo),
        _ => Err(ValidationFailure::NoImage),
    }
}

fn accept_education(event: &Event) -> Result<FieldValue, ValidationFailure> {
    match event {
        Event::ChoiceSelection { choice_key } => {
            validate::education(choice_key).map(FieldValue::Education)
        }
        _ => Err(ValidationFailure::Empty),
    }
}

fn accept_wants_news(event: &Event) -> Result<FieldValue, ValidationFailure> {
    match event {
        Event::ChoiceSelection { choice_key } => {
            validate::wants_news(choice_key).map(FieldValue::WantsNews)
        }
        _ => Err(ValidationFailure::Empty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::event::ImageVariant;

    #[test]
    fn table_covers_every_collection_step_in_order() {
        let steps: Vec<Step> = all().iter().map(|d| d.step).collect();
        assert_eq!(steps, Step::COLLECTION.to_vec());
        assert!(definition(Step::Idle).is_none());
    }

    #[test]
    fn table_follows_step_sequence() {
        for def in all() {
            assert_eq!(def.next, def.step.next(), "{} jumps out of order", def.step);
            assert!(def.step.can_transition_to(def.next));
        }
    }

    #[test]
    fn validators_produce_their_own_field() {
        for def in all() {
            let event = match def.accepts {
                EventKind::Text if def.step == Step::Name => Event::text("Alice"),
                EventKind::Text => Event::text("30"),
                EventKind::Image => Event::images(vec![ImageVariant {
                    unique_id: "u".into(),
                    retrieval_id: "r".into(),
                    size: 1,
                }]),
                EventKind::Choice => {
                    let kb = def.keyboard().unwrap();
                    Event::choice(kb.choices().next().unwrap().key.clone())
                }
                EventKind::Command => unreachable!("no step accepts commands"),
            };
            let value = (def.validate)(&event).unwrap();
            assert_eq!(Some(value.field()), def.step.field());
        }
    }

    #[test]
    fn every_offered_button_validates() {
        for def in all() {
            if let Some(kb) = def.keyboard() {
                for choice in kb.choices() {
                    assert!(
                        (def.validate)(&Event::choice(choice.key.clone())).is_ok(),
                        "button {} rejected at {}",
                        choice.key,
                        def.step
                    );
                }
            }
        }
    }

    #[test]
    fn transition_requires_matching_kind() {
        assert!(transition(Step::Name, EventKind::Text).is_some());
        assert!(transition(Step::Name, EventKind::Choice).is_none());
        assert!(transition(Step::Gender, EventKind::Text).is_none());
        assert!(transition(Step::Photo, EventKind::Image).is_some());
        assert!(transition(Step::Photo, EventKind::Text).is_none());
        assert!(transition(Step::Idle, EventKind::Text).is_none());
    }

    #[test]
    fn choice_steps_have_keyboards() {
        for def in all() {
            assert_eq!(def.accepts == EventKind::Choice, def.choices.is_some());
        }
    }
}
