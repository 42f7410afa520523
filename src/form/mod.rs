//! Questionnaire form — the step sequence, its validators and the engine
//! that drives a participant through it.
//!
//! A participant sends `/fillform`, answers name, age, gender, photo,
//! education and newsletter questions in that order, and ends up with a
//! `CompletedRecord` they can view with `/showdata`.

pub mod engine;
pub mod event;
pub mod model;
pub mod prompts;
pub mod reply;
pub mod step;
pub mod steps;
pub mod validate;

pub use engine::{FormEngine, FormError};
pub use event::{Command, Event, EventKind, ImageVariant};
pub use model::{
    Collected, CompletedRecord, Education, Field, FieldValue, FormData, Gender, ParticipantId,
    PhotoRef, Session,
};
pub use reply::{Choice, Keyboard, Reply, Response};
pub use step::Step;
pub use validate::ValidationFailure;
