//! End-to-end conversations through the form engine's public API.

use form_bot::form::prompts;
use form_bot::form::{
    Command, Education, Event, FormEngine, Gender, ImageVariant, ParticipantId, Reply, Response,
    Step,
};

fn photo(unique_id: &str, retrieval_id: &str, size: u64) -> ImageVariant {
    ImageVariant {
        unique_id: unique_id.into(),
        retrieval_id: retrieval_id.into(),
        size,
    }
}

async fn say(engine: &FormEngine, pid: &ParticipantId, event: Event) -> Reply {
    engine.handle(pid, &event).await
}

async fn step_of(engine: &FormEngine, pid: &ParticipantId) -> Step {
    engine
        .sessions()
        .get(pid)
        .await
        .map(|s| s.step)
        .unwrap_or(Step::Idle)
}

/// Drive `pid` through a complete form with the given answers.
async fn fill(engine: &FormEngine, pid: &ParticipantId, name: &str, gender: &str, news: &str) {
    say(engine, pid, Event::command(Command::FillForm)).await;
    say(engine, pid, Event::text(name)).await;
    say(engine, pid, Event::text("27")).await;
    say(engine, pid, Event::choice(gender)).await;
    say(engine, pid, Event::images(vec![photo("u", &format!("{name}-ref"), 10)])).await;
    say(engine, pid, Event::choice("secondary")).await;
    say(engine, pid, Event::choice(news)).await;
}

#[tokio::test]
async fn worked_example_produces_record() {
    let engine = FormEngine::in_memory();
    let alice = ParticipantId::new("alice");

    say(&engine, &alice, Event::command(Command::FillForm)).await;
    say(&engine, &alice, Event::text("Alice")).await;

    let reply = say(&engine, &alice, Event::text("abc")).await;
    assert_eq!(reply.response.body(), prompts::AGE_ERROR);
    assert_eq!(step_of(&engine, &alice).await, Step::Age);

    say(&engine, &alice, Event::text("30")).await;
    say(&engine, &alice, Event::choice("male")).await;
    say(
        &engine,
        &alice,
        Event::images(vec![photo("id1", "ref1", 100), photo("id2", "ref2", 500)]),
    )
    .await;
    say(&engine, &alice, Event::choice("higher")).await;
    let reply = say(&engine, &alice, Event::choice("yes_news")).await;

    assert_eq!(reply.response.body(), prompts::SAVED);
    assert_eq!(
        reply.follow_up.as_ref().map(|r| r.body()),
        Some(prompts::SHOW_DATA_HINT)
    );
    assert_eq!(step_of(&engine, &alice).await, Step::Idle);

    let record = engine.records().get(&alice).await.unwrap();
    assert_eq!(record.data.name, "Alice");
    assert_eq!(record.data.age, 30);
    assert_eq!(record.data.gender, Gender::Male);
    assert_eq!(record.data.photo.retrieval_id, "ref2");
    assert_eq!(record.data.education, Education::Higher);
    assert!(record.data.wants_news);

    let reply = say(&engine, &alice, Event::command(Command::ShowData)).await;
    match reply.response {
        Response::RecordReply {
            image_retrieval_id,
            caption,
            ..
        } => {
            assert_eq!(image_retrieval_id, "ref2");
            assert!(caption.contains("Alice"));
            assert!(caption.contains("30"));
        }
        other => panic!("expected record reply, got {other:?}"),
    }
}

#[tokio::test]
async fn participants_do_not_share_sessions() {
    let engine = FormEngine::in_memory();
    let a = ParticipantId::new("a");
    let b = ParticipantId::new("b");

    say(&engine, &a, Event::command(Command::FillForm)).await;
    say(&engine, &a, Event::text("Anna")).await;

    // b is idle: plain text gets the fallback, not a validation error.
    let reply = say(&engine, &b, Event::text("Bob")).await;
    assert_eq!(reply.response.body(), prompts::ECHO_FALLBACK);
    assert_eq!(step_of(&engine, &b).await, Step::Idle);

    say(&engine, &b, Event::command(Command::FillForm)).await;
    assert_eq!(step_of(&engine, &a).await, Step::Age);
    assert_eq!(step_of(&engine, &b).await, Step::Name);

    say(&engine, &b, Event::command(Command::Cancel)).await;
    assert_eq!(step_of(&engine, &a).await, Step::Age);
    assert_eq!(engine.sessions().active_count().await, 1);
}

#[tokio::test]
async fn cancel_discards_answers() {
    let engine = FormEngine::in_memory();
    let pid = ParticipantId::new("p");

    say(&engine, &pid, Event::command(Command::FillForm)).await;
    say(&engine, &pid, Event::text("Carol")).await;
    say(&engine, &pid, Event::text("40")).await;

    let reply = say(&engine, &pid, Event::command(Command::Cancel)).await;
    assert_eq!(reply.response.body(), prompts::CANCELLED);

    let reply = say(&engine, &pid, Event::command(Command::Cancel)).await;
    assert_eq!(reply.response.body(), prompts::NOTHING_TO_CANCEL);

    let reply = say(&engine, &pid, Event::command(Command::ShowData)).await;
    assert_eq!(reply.response.body(), prompts::NOT_FILLED);

    // A new form starts from scratch.
    say(&engine, &pid, Event::command(Command::FillForm)).await;
    let session = engine.sessions().get(&pid).await.unwrap();
    assert_eq!(session.step, Step::Name);
    assert!(session.collected.fields().is_empty());
}

#[tokio::test]
async fn every_participant_gets_own_record() {
    let engine = FormEngine::in_memory();
    let a = ParticipantId::new("a");
    let b = ParticipantId::new("b");

    fill(&engine, &a, "Anna", "female", "no_news").await;
    fill(&engine, &b, "Boris", "undefined_gender", "yes_news").await;

    assert_eq!(engine.records().count().await, 2);

    let anna = engine.records().get(&a).await.unwrap();
    assert_eq!(anna.data.gender, Gender::Female);
    assert!(!anna.data.wants_news);
    assert_eq!(anna.data.photo.retrieval_id, "Anna-ref");

    let boris = engine.records().get(&b).await.unwrap();
    assert_eq!(boris.data.gender, Gender::Undefined);
    assert!(boris.data.wants_news);
}

#[tokio::test]
async fn record_serializes_flat() {
    let engine = FormEngine::in_memory();
    let pid = ParticipantId::new("77");
    fill(&engine, &pid, "Dana", "female", "yes_news").await;

    let record = engine.records().get(&pid).await.unwrap();
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["participant_id"], "77");
    assert_eq!(json["name"], "Dana");
    assert_eq!(json["age"], 27);
    assert_eq!(json["education"], "secondary");
    assert_eq!(json["wants_news"], true);
    assert_eq!(json["photo"]["retrieval_id"], "Dana-ref");
    assert!(json.get("completed_at").is_some());
}
