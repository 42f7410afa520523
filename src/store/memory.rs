//! In-memory stores. Contents live as long as the process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::traits::{RecordRepository, SessionStore};
use crate::form::{Collected, CompletedRecord, FieldValue, FormData, ParticipantId, Session, Step};

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<ParticipantId, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, participant: &ParticipantId) -> Option<Session> {
        self.sessions.read().await.get(participant).cloned()
    }

    async fn begin(&self, participant: &ParticipantId) -> Session {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(participant.clone())
            .or_insert_with(|| {
                debug!(participant = %participant, "Session created");
                Session::new(participant.clone())
            })
            .clone()
    }

    async fn advance(&self, participant: &ParticipantId, value: FieldValue, next: Step) -> bool {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(participant) else {
            return false;
        };

        if session.step.field() != Some(value.field()) || !session.step.can_transition_to(next) {
            warn!(
                participant = %participant,
                step = %session.step,
                field = %value.field(),
                next = %next,
                "Refusing out-of-order advance"
            );
            return false;
        }

        if !session.collected.insert(value) {
            return false;
        }
        session.step = next;
        true
    }

    async fn cancel(&self, participant: &ParticipantId) -> bool {
        self.sessions.write().await.remove(participant).is_some()
    }

    async fn finalize(&self, participant: &ParticipantId) -> Option<Collected> {
        self.sessions
            .write()
            .await
            .remove(participant)
            .map(|session| session.collected)
    }

    async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[derive(Default)]
pub struct InMemoryRecordRepository {
    records: RwLock<HashMap<ParticipantId, CompletedRecord>>,
}

impl InMemoryRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordRepository for InMemoryRecordRepository {
    async fn put(&self, participant: &ParticipantId, data: FormData) -> CompletedRecord {
        let record = CompletedRecord::new(participant.clone(), data);
        let previous = self
            .records
            .write()
            .await
            .insert(participant.clone(), record.clone());
        if previous.is_some() {
            debug!(participant = %participant, "Replaced earlier record");
        }
        record
    }

    async fn get(&self, participant: &ParticipantId) -> Option<CompletedRecord> {
        self.records.read().await.get(participant).cloned()
    }

    async fn count(&self) -> usize {
        self.records.read().await.len()
    }
}
