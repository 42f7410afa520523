//! Store traits — the only mutable state of the form bot.
//!
//! Both stores are keyed by participant and must be safe for concurrent use
//! by lanes serving different participants.

use async_trait::async_trait;

use crate::form::{Collected, CompletedRecord, FieldValue, FormData, ParticipantId, Session, Step};

/// Per-participant sessions for forms in progress.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Current session, if the participant is filling out a form.
    async fn get(&self, participant: &ParticipantId) -> Option<Session>;

    /// Create a session at the first collection step, or return the existing
    /// one unchanged.
    async fn begin(&self, participant: &ParticipantId) -> Session;

    /// Record `value` and move to `next` in one step.
    ///
    /// Returns `false` without touching anything if there is no session, if
    /// `value` is not the field of the current step, or if `next` is not the
    /// step after the current one.
    async fn advance(&self, participant: &ParticipantId, value: FieldValue, next: Step) -> bool;

    /// Drop the session. Returns whether one existed.
    async fn cancel(&self, participant: &ParticipantId) -> bool;

    /// Remove the session and hand back its collected answers.
    async fn finalize(&self, participant: &ParticipantId) -> Option<Collected>;

    /// Number of forms in progress.
    async fn active_count(&self) -> usize;
}

/// Completed forms, one per participant.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Store a completed form, replacing any earlier one for the participant.
    async fn put(&self, participant: &ParticipantId, data: FormData) -> CompletedRecord;

    async fn get(&self, participant: &ParticipantId) -> Option<CompletedRecord>;

    async fn count(&self) -> usize;
}
