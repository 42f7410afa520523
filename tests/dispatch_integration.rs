//! Integration tests for the dispatcher: channels in, replies out.
//!
//! A scripted channel feeds a fixed event sequence and records every
//! response it is asked to deliver.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use tokio::time::timeout;

use form_bot::channels::{Channel, ChannelManager, EventStream, InboundEvent};
use form_bot::dispatch::Dispatcher;
use form_bot::error::ChannelError;
use form_bot::form::prompts;
use form_bot::form::{Command, Event, FormEngine, ImageVariant, ParticipantId, Reply, Response};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

type Delivered = Arc<Mutex<Vec<(String, Response)>>>;

struct ScriptedChannel {
    name: &'static str,
    script: Vec<(&'static str, Event)>,
    delivered: Delivered,
    /// Delay per delivery, to check that slow sends keep order.
    send_delay: Duration,
}

#[async_trait]
impl Channel for ScriptedChannel {
    fn name(&self) -> &str {
        self.name
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        let name = self.name;
        let events: Vec<InboundEvent> = self
            .script
            .iter()
            .map(|(pid, event)| InboundEvent::new(name, *pid, event.clone()))
            .collect();
        Ok(Box::pin(stream::iter(events)))
    }

    async fn respond(&self, event: &InboundEvent, reply: &Reply) -> Result<(), ChannelError> {
        if !self.send_delay.is_zero() {
            tokio::time::sleep(self.send_delay).await;
        }
        let mut delivered = self.delivered.lock().unwrap();
        for response in reply.responses() {
            delivered.push((event.participant_id.to_string(), response.clone()));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

fn photo(size: u64) -> ImageVariant {
    ImageVariant {
        unique_id: format!("u{size}"),
        retrieval_id: format!("r{size}"),
        size,
    }
}

fn full_form(pid: &'static str, name: &'static str) -> Vec<(&'static str, Event)> {
    vec![
        (pid, Event::command(Command::FillForm)),
        (pid, Event::text(name)),
        (pid, Event::text("33")),
        (pid, Event::choice("female")),
        (pid, Event::images(vec![photo(10), photo(90)])),
        (pid, Event::choice("no_edu")),
        (pid, Event::choice("no_news")),
        (pid, Event::command(Command::ShowData)),
    ]
}

/// Interleave two scripts one event at a time.
fn interleave(
    a: Vec<(&'static str, Event)>,
    b: Vec<(&'static str, Event)>,
) -> Vec<(&'static str, Event)> {
    let mut out = Vec::new();
    let mut a = a.into_iter();
    let mut b = b.into_iter();
    loop {
        match (a.next(), b.next()) {
            (None, None) => break,
            (x, y) => out.extend(x.into_iter().chain(y)),
        }
    }
    out
}

fn setup(
    script: Vec<(&'static str, Event)>,
    send_delay: Duration,
) -> (Dispatcher, Delivered, Arc<FormEngine>) {
    let delivered: Delivered = Arc::new(Mutex::new(Vec::new()));
    let mut channels = ChannelManager::new();
    channels.add(Box::new(ScriptedChannel {
        name: "scripted",
        script,
        delivered: Arc::clone(&delivered),
        send_delay,
    }));
    let engine = Arc::new(FormEngine::in_memory());
    (
        Dispatcher::new(Arc::clone(&engine), channels),
        delivered,
        engine,
    )
}

fn bodies(delivered: &Delivered, pid: &str) -> Vec<String> {
    delivered
        .lock()
        .unwrap()
        .iter()
        .filter(|(p, _)| p == pid)
        .map(|(_, r)| r.body().to_string())
        .collect()
}

const EXPECTED: &[&str] = &[
    prompts::NAME_PROMPT,
    prompts::AGE_PROMPT,
    prompts::GENDER_PROMPT,
    prompts::PHOTO_PROMPT,
    prompts::EDUCATION_PROMPT,
    prompts::WANTS_NEWS_PROMPT,
    prompts::SAVED,
    prompts::SHOW_DATA_HINT,
];

#[tokio::test]
async fn interleaved_participants_complete_independently() {
    timeout(TEST_TIMEOUT, async {
        let script = interleave(full_form("1", "Anna"), full_form("2", "Boris"));
        let (dispatcher, delivered, engine) = setup(script, Duration::ZERO);

        dispatcher.run().await.unwrap();

        for pid in ["1", "2"] {
            let got = bodies(&delivered, pid);
            assert_eq!(&got[..EXPECTED.len()], EXPECTED, "participant {pid}");
            assert_eq!(got.len(), EXPECTED.len() + 1);
        }

        let anna = engine.records().get(&ParticipantId::new("1")).await.unwrap();
        assert_eq!(anna.data.name, "Anna");
        assert_eq!(anna.data.photo.retrieval_id, "r90");
        let boris = engine.records().get(&ParticipantId::new("2")).await.unwrap();
        assert_eq!(boris.data.name, "Boris");
        assert_eq!(engine.sessions().active_count().await, 0);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn slow_delivery_keeps_reply_order() {
    timeout(TEST_TIMEOUT, async {
        let (dispatcher, delivered, _engine) =
            setup(full_form("slow", "Carol"), Duration::from_millis(20));

        dispatcher.run().await.unwrap();

        let got = bodies(&delivered, "slow");
        assert_eq!(&got[..EXPECTED.len()], EXPECTED);

        let last = delivered.lock().unwrap().last().cloned().unwrap();
        match last.1 {
            Response::RecordReply {
                image_retrieval_id, ..
            } => assert_eq!(image_retrieval_id, "r90"),
            other => panic!("expected record reply, got {other:?}"),
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn button_answers_edit_the_prompt() {
    timeout(TEST_TIMEOUT, async {
        let (dispatcher, delivered, _engine) = setup(full_form("7", "Dana"), Duration::ZERO);
        dispatcher.run().await.unwrap();

        let responses: Vec<Response> = delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(_, r)| r.clone())
            .collect();

        // Gender prompt offers buttons; answering it edits that message.
        assert!(matches!(responses[2], Response::PromptWithChoices { .. }));
        assert!(matches!(
            responses[3],
            Response::EditPreviousPrompt { keyboard: None, .. }
        ));
        // Education answered by button: the news question replaces it.
        assert!(matches!(
            responses[5],
            Response::EditPreviousPrompt {
                keyboard: Some(_),
                ..
            }
        ));
        assert!(matches!(responses[7], Response::TextReply { .. }));
    })
    .await
    .expect("test timed out");
}
