//! Form engine — turns one inbound event into exactly one reply.
//!
//! The engine holds no state of its own. Each event reads the participant's
//! session, consults the step table and writes back through the store
//! before the reply is returned, so callers can deliver the reply without
//! holding anything.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::event::{Command, Event, EventKind};
use super::model::{ParticipantId, Session};
use super::prompts;
use super::reply::{Reply, Response};
use super::step::Step;
use super::steps::{self, StepDef};
use super::validate::ValidationFailure;
use crate::store::{
    InMemoryRecordRepository, InMemorySessionStore, RecordRepository, SessionStore,
};

/// Non-fatal outcomes that decide which informational reply is sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("answer rejected at {step}: {failure}")]
    Validation {
        step: Step,
        failure: ValidationFailure,
    },

    #[error("{kind} event not accepted at {step}")]
    UnknownEventForState { step: Step, kind: EventKind },

    #[error("no form in progress")]
    NoActiveSession,

    #[error("no completed record")]
    MissingRecord,
}

pub struct FormEngine {
    sessions: Arc<dyn SessionStore>,
    records: Arc<dyn RecordRepository>,
}

impl FormEngine {
    pub fn new(sessions: Arc<dyn SessionStore>, records: Arc<dyn RecordRepository>) -> Self {
        Self { sessions, records }
    }

    /// Engine over fresh in-memory stores.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemorySessionStore::new()),
            Arc::new(InMemoryRecordRepository::new()),
        )
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    pub fn records(&self) -> &Arc<dyn RecordRepository> {
        &self.records
    }

    /// Handle one event for one participant.
    ///
    /// Must not run concurrently with another call for the same participant.
    pub async fn handle(&self, participant: &ParticipantId, event: &Event) -> Reply {
        match self.sessions.get(participant).await {
            Some(session) if !session.step.is_idle() => self.handle_active(session, event).await,
            Some(_) => {
                // A finished session that was never finalized; treat as no form.
                self.sessions.cancel(participant).await;
                self.handle_idle(participant, event).await
            }
            None => self.handle_idle(participant, event).await,
        }
    }

    async fn handle_idle(&self, participant: &ParticipantId, event: &Event) -> Reply {
        let Event::Command { command } = event else {
            debug!(participant = %participant, kind = %event.kind(), "Event outside form");
            return Response::text(participant, prompts::ECHO_FALLBACK).into();
        };

        match command {
            Command::Start => Response::text(participant, prompts::WELCOME).into(),
            Command::Cancel => {
                debug!(participant = %participant, error = %FormError::NoActiveSession, "Cancel ignored");
                Response::text(participant, prompts::NOTHING_TO_CANCEL).into()
            }
            Command::FillForm => {
                let session = self.sessions.begin(participant).await;
                info!(participant = %participant, step = %session.step, "Form started");
                self.enter(participant, session.step, false)
            }
            Command::ShowData => match self.records.get(participant).await {
                Some(record) => Response::RecordReply {
                    participant_id: participant.clone(),
                    image_retrieval_id: record.data.photo.retrieval_id.clone(),
                    caption: prompts::record_caption(&record.data),
                }
                .into(),
                None => {
                    debug!(participant = %participant, error = %FormError::MissingRecord, "Nothing to show");
                    Response::text(participant, prompts::NOT_FILLED).into()
                }
            },
        }
    }

    async fn handle_active(&self, session: Session, event: &Event) -> Reply {
        let participant = &session.participant_id;

        if matches!(event, Event::Command { command: Command::Cancel }) {
            self.sessions.cancel(participant).await;
            info!(participant = %participant, step = %session.step, "Form cancelled");
            return Response::text(participant, prompts::CANCELLED).into();
        }

        let Some(current) = steps::definition(session.step) else {
            return Response::text(participant, prompts::ECHO_FALLBACK).into();
        };

        let Some(def) = steps::transition(session.step, event.kind()) else {
            let err = FormError::UnknownEventForState {
                step: session.step,
                kind: event.kind(),
            };
            debug!(participant = %participant, error = %err, "Re-prompting");
            return self.reject(participant, current);
        };

        let value = match (def.validate)(event) {
            Ok(value) => value,
            Err(failure) => {
                let err = FormError::Validation {
                    step: def.step,
                    failure,
                };
                debug!(participant = %participant, error = %err, "Re-prompting");
                return self.reject(participant, def);
            }
        };

        if !self.sessions.advance(participant, value, def.next).await {
            warn!(participant = %participant, step = %def.step, "Session changed underneath the engine");
            return self.reject(participant, def);
        }
        info!(participant = %participant, from = %def.step, to = %def.next, "Step advanced");

        // A button press is answered by editing the message that held the
        // buttons, so the stale keyboard disappears.
        let edit = def.accepts == EventKind::Choice;

        if def.step.is_terminal() {
            self.complete(participant).await
        } else {
            self.enter(participant, def.next, edit)
        }
    }

    /// Prompt for `step`, as a new message or by editing the previous prompt.
    fn enter(&self, participant: &ParticipantId, step: Step, edit: bool) -> Reply {
        let Some(def) = steps::definition(step) else {
            return Response::text(participant, prompts::ECHO_FALLBACK).into();
        };
        let participant_id = participant.clone();
        let text = def.prompt.to_string();

        let response = match (edit, def.keyboard()) {
            (true, keyboard) => Response::EditPreviousPrompt {
                participant_id,
                text,
                keyboard,
            },
            (false, Some(keyboard)) => Response::PromptWithChoices {
                participant_id,
                text,
                keyboard,
            },
            (false, None) => Response::TextReply {
                participant_id,
                text,
            },
        };
        response.into()
    }

    /// Error re-prompt for `def`. Button steps offer their buttons again.
    fn reject(&self, participant: &ParticipantId, def: &StepDef) -> Reply {
        match def.keyboard() {
            Some(keyboard) => Response::PromptWithChoices {
                participant_id: participant.clone(),
                text: def.error.to_string(),
                keyboard,
            }
            .into(),
            None => Response::text(participant, def.error).into(),
        }
    }

    async fn complete(&self, participant: &ParticipantId) -> Reply {
        let data = self
            .sessions
            .finalize(participant)
            .await
            .and_then(|collected| collected.into_form_data());

        let Some(data) = data else {
            warn!(participant = %participant, "Completed session is missing answers");
            return Response::text(participant, prompts::LOST_ANSWERS).into();
        };

        let record = self.records.put(participant, data).await;
        info!(
            participant = %participant,
            completed_at = %record.completed_at,
            "Form completed"
        );

        Reply::new(Response::EditPreviousPrompt {
            participant_id: participant.clone(),
            text: prompts::SAVED.to_string(),
            keyboard: None,
        })
        .with_follow_up(Response::text(participant, prompts::SHOW_DATA_HINT))
    }
}
