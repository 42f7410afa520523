//! Event dispatcher — feeds channel events to the form engine.
//!
//! Each participant gets a lane: a worker task that runs their events
//! through the engine one at a time, and a sender task that delivers the
//! replies in the same order. Participants never wait on each other, and
//! a slow delivery never holds up the next event's processing.
//!
//! A lane retires once its participant has no form in progress, or after
//! sitting idle for a while. Sessions live in the store, so a retired
//! lane loses nothing; the next event simply opens a new one.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channels::{ChannelManager, EventStream, InboundEvent};
use crate::error::Error;
use crate::form::{FormEngine, ParticipantId, Reply};

/// How long a lane with nothing to do stays open.
pub const LANE_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

type Lanes = Arc<Mutex<HashMap<ParticipantId, Lane>>>;

struct Lane {
    id: u64,
    tx: mpsc::UnboundedSender<InboundEvent>,
    worker: JoinHandle<()>,
}

pub struct Dispatcher {
    engine: Arc<FormEngine>,
    channels: Arc<ChannelManager>,
    lanes: Lanes,
    next_lane_id: AtomicU64,
    idle_timeout: Duration,
}

impl Dispatcher {
    pub fn new(engine: Arc<FormEngine>, channels: ChannelManager) -> Self {
        Self {
            engine,
            channels: Arc::new(channels),
            lanes: Arc::new(Mutex::new(HashMap::new())),
            next_lane_id: AtomicU64::new(0),
            idle_timeout: LANE_IDLE_TIMEOUT,
        }
    }

    /// Retire lanes that receive nothing for `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn engine(&self) -> &Arc<FormEngine> {
        &self.engine
    }

    /// Number of participants with an open lane.
    pub async fn lane_count(&self) -> usize {
        self.lanes.lock().await.len()
    }

    /// Start every channel and dispatch until Ctrl+C or until all streams end.
    pub async fn run(&self) -> Result<(), Error> {
        let stream = self.channels.start_all().await?;
        info!(channels = ?self.channels.names(), "Form bot ready and listening");
        self.run_stream(stream).await;
        self.channels.shutdown_all().await;
        Ok(())
    }

    /// Dispatch events from `stream`, then drain every lane.
    pub async fn run_stream(&self, mut stream: EventStream) {
        loop {
            let event = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl+C received, shutting down...");
                    break;
                }
                event = stream.next() => {
                    match event {
                        Some(e) => e,
                        None => {
                            info!("All channel streams ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            self.dispatch(event).await;
        }

        self.drain().await;
    }

    /// Queue an event on its participant's lane, opening one if needed.
    pub async fn dispatch(&self, event: InboundEvent) {
        let participant = event.participant_id.clone();
        debug!(
            participant = %participant,
            channel = %event.channel,
            kind = %event.event.kind(),
            "Dispatching event"
        );

        // Sending under the lock: a retiring worker checks its queue under
        // the same lock, so an event is never left in a closed lane.
        let mut lanes = self.lanes.lock().await;
        let event = match lanes.get(&participant) {
            Some(lane) => match lane.tx.send(event) {
                Ok(()) => return,
                Err(mpsc::error::SendError(event)) => {
                    warn!(participant = %participant, "Lane worker gone, reopening lane");
                    event
                }
            },
            None => event,
        };

        let lane = self.open_lane(participant.clone());
        // A fresh lane's receiver is alive.
        let _ = lane.tx.send(event);
        lanes.insert(participant, lane);
    }

    fn open_lane(&self, participant: ParticipantId) -> Lane {
        let (tx, rx) = mpsc::unbounded_channel::<InboundEvent>();
        let id = self.next_lane_id.fetch_add(1, Ordering::Relaxed);
        debug!(participant = %participant, lane = id, "Opening lane");

        let worker = LaneWorker {
            id,
            participant,
            engine: Arc::clone(&self.engine),
            lanes: Arc::clone(&self.lanes),
            idle_timeout: self.idle_timeout,
            outbox: Outbox::new(Arc::clone(&self.channels)),
        };
        let worker = tokio::spawn(worker.run(rx));

        Lane { id, tx, worker }
    }

    /// Close every lane and wait until queued events are processed and their
    /// replies delivered.
    pub async fn drain(&self) {
        let lanes = std::mem::take(&mut *self.lanes.lock().await);
        let count = lanes.len();

        for (participant, lane) in lanes {
            drop(lane.tx);
            if let Err(e) = lane.worker.await {
                warn!(participant = %participant, error = %e, "Lane worker failed");
            }
        }

        info!(lanes = count, "Dispatcher drained");
    }
}

/// One participant's worker: engine calls in arrival order.
struct LaneWorker {
    id: u64,
    participant: ParticipantId,
    engine: Arc<FormEngine>,
    lanes: Lanes,
    idle_timeout: Duration,
    outbox: Outbox,
}

impl LaneWorker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<InboundEvent>) {
        let mut pending = None;
        loop {
            let event = match pending.take() {
                Some(event) => event,
                None => match tokio::time::timeout(self.idle_timeout, rx.recv()).await {
                    Ok(Some(event)) => event,
                    Ok(None) => break,
                    Err(_) => match self.retire(&mut rx).await {
                        Some(event) => event,
                        None => return,
                    },
                },
            };

            let reply = self.engine.handle(&event.participant_id, &event.event).await;
            self.outbox.push(event, reply);

            if self.engine.sessions().get(&self.participant).await.is_none() {
                match self.retire(&mut rx).await {
                    Some(event) => pending = Some(event),
                    None => return,
                }
            }
        }

        self.outbox.flush().await;
    }

    /// Deliver what is queued, then close the lane unless another event
    /// arrived meanwhile. That event is handed back to be processed.
    async fn retire(
        &mut self,
        rx: &mut mpsc::UnboundedReceiver<InboundEvent>,
    ) -> Option<InboundEvent> {
        // Replies go out before the lane disappears, so a lane opened
        // afterwards cannot overtake them.
        self.outbox.flush().await;

        let mut lanes = self.lanes.lock().await;
        if let Ok(event) = rx.try_recv() {
            return Some(event);
        }
        if lanes
            .get(&self.participant)
            .is_some_and(|lane| lane.id == self.id)
        {
            lanes.remove(&self.participant);
        }
        rx.close();
        debug!(participant = %self.participant, lane = self.id, "Lane retired");
        None
    }
}

/// Ordered reply delivery for one lane. The sender task starts with the
/// first reply and ends on `flush`.
struct Outbox {
    channels: Arc<ChannelManager>,
    queue: Option<(mpsc::UnboundedSender<(InboundEvent, Reply)>, JoinHandle<()>)>,
}

impl Outbox {
    fn new(channels: Arc<ChannelManager>) -> Self {
        Self {
            channels,
            queue: None,
        }
    }

    fn push(&mut self, event: InboundEvent, reply: Reply) {
        let (tx, _) = self
            .queue
            .get_or_insert_with(|| spawn_sender(Arc::clone(&self.channels)));
        if let Err(mpsc::error::SendError((event, _))) = tx.send((event, reply)) {
            warn!(participant = %event.participant_id, "Lane sender gone, reply dropped");
        }
    }

    /// Wait until every queued reply has been delivered.
    async fn flush(&mut self) {
        if let Some((tx, task)) = self.queue.take() {
            drop(tx);
            if let Err(e) = task.await {
                warn!(error = %e, "Lane sender failed");
            }
        }
    }
}

fn spawn_sender(
    channels: Arc<ChannelManager>,
) -> (mpsc::UnboundedSender<(InboundEvent, Reply)>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<(InboundEvent, Reply)>();
    let task = tokio::spawn(async move {
        while let Some((event, reply)) = rx.recv().await {
            if let Err(e) = channels.respond(&event, &reply).await {
                warn!(
                    participant = %event.participant_id,
                    channel = %event.channel,
                    error = %e,
                    "Failed to deliver reply"
                );
            }
        }
    });
    (tx, task)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use futures::stream;
    use tokio::time::timeout;

    use super::*;
    use crate::channels::Channel;
    use crate::error::ChannelError;
    use crate::form::{Command, Event, ImageVariant, prompts};

    type Log = Arc<StdMutex<Vec<(String, String)>>>;

    struct RecordingChannel {
        log: Log,
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            "rec"
        }

        async fn start(&self) -> Result<EventStream, ChannelError> {
            Ok(Box::pin(stream::empty::<InboundEvent>()))
        }

        async fn respond(&self, event: &InboundEvent, reply: &Reply) -> Result<(), ChannelError> {
            let mut log = self.log.lock().unwrap();
            for r in reply.responses() {
                log.push((event.participant_id.to_string(), r.body().to_string()));
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

    fn dispatcher() -> (Dispatcher, Log) {
        let log: Log = Arc::new(StdMutex::new(Vec::new()));
        let mut channels = ChannelManager::new();
        channels.add(Box::new(RecordingChannel {
            log: Arc::clone(&log),
        }));
        (
            Dispatcher::new(Arc::new(FormEngine::in_memory()), channels),
            log,
        )
    }

    fn ev(pid: &str, event: Event) -> InboundEvent {
        InboundEvent::new("rec", pid, event)
    }

    fn bodies_for(log: &Log, pid: &str) -> Vec<String> {
        log.lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == pid)
            .map(|(_, b)| b.clone())
            .collect()
    }

    #[tokio::test]
    async fn replies_keep_per_participant_order() {
        let (dispatcher, log) = dispatcher();
        let events = vec![
            ev("a", Event::command(Command::FillForm)),
            ev("b", Event::command(Command::Start)),
            ev("a", Event::text("Alice")),
            ev("b", Event::command(Command::FillForm)),
            ev("a", Event::text("30")),
            ev("b", Event::text("Bob")),
        ];

        dispatcher.run_stream(Box::pin(stream::iter(events))).await;

        assert_eq!(
            bodies_for(&log, "a"),
            vec![prompts::NAME_PROMPT, prompts::AGE_PROMPT, prompts::GENDER_PROMPT]
        );
        assert_eq!(
            bodies_for(&log, "b"),
            vec![prompts::WELCOME, prompts::NAME_PROMPT, prompts::AGE_PROMPT]
        );
    }

    /// Poll until no lane is open.
    async fn wait_for_no_lanes(dispatcher: &Dispatcher) {
        timeout(Duration::from_secs(5), async {
            while dispatcher.lane_count().await > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("lanes retired");
    }

    #[tokio::test]
    async fn one_lane_per_participant() {
        let (dispatcher, _log) = dispatcher();
        dispatcher
            .dispatch(ev("a", Event::command(Command::FillForm)))
            .await;
        dispatcher.dispatch(ev("a", Event::text("Alice"))).await;
        dispatcher
            .dispatch(ev("b", Event::command(Command::FillForm)))
            .await;
        assert_eq!(dispatcher.lane_count().await, 2);

        dispatcher.drain().await;
        assert_eq!(dispatcher.lane_count().await, 0);
    }

    #[tokio::test]
    async fn lanes_without_a_form_retire() {
        let (dispatcher, log) = dispatcher();
        for i in 0..200 {
            dispatcher
                .dispatch(ev(&format!("p{i}"), Event::command(Command::Cancel)))
                .await;
        }

        wait_for_no_lanes(&dispatcher).await;
        for i in [0, 199] {
            assert_eq!(
                bodies_for(&log, &format!("p{i}")),
                vec![prompts::NOTHING_TO_CANCEL]
            );
        }
    }

    #[tokio::test]
    async fn cancelled_form_retires_lane() {
        let (dispatcher, log) = dispatcher();
        dispatcher
            .dispatch(ev("a", Event::command(Command::FillForm)))
            .await;
        dispatcher.dispatch(ev("a", Event::text("Alice"))).await;
        dispatcher
            .dispatch(ev("a", Event::command(Command::Cancel)))
            .await;

        wait_for_no_lanes(&dispatcher).await;
        assert_eq!(
            bodies_for(&log, "a"),
            vec![prompts::NAME_PROMPT, prompts::AGE_PROMPT, prompts::CANCELLED]
        );
    }

    #[tokio::test]
    async fn completed_form_retires_lane() {
        let (dispatcher, log) = dispatcher();
        let photo = ImageVariant {
            unique_id: "u1".into(),
            retrieval_id: "r1".into(),
            size: 10,
        };
        for event in [
            Event::command(Command::FillForm),
            Event::text("Alice"),
            Event::text("30"),
            Event::choice("female"),
            Event::images(vec![photo]),
            Event::choice("higher"),
            Event::choice("yes_news"),
        ] {
            dispatcher.dispatch(ev("a", event)).await;
        }

        wait_for_no_lanes(&dispatcher).await;
        assert_eq!(
            bodies_for(&log, "a").last().map(String::as_str),
            Some(prompts::SHOW_DATA_HINT)
        );
        assert!(
            dispatcher
                .engine()
                .records()
                .get(&ParticipantId::new("a"))
                .await
                .is_some()
        );
    }

    #[tokio::test]
    async fn idle_lane_retires_and_form_continues() {
        let (dispatcher, log) = dispatcher();
        let dispatcher = dispatcher.with_idle_timeout(Duration::from_millis(20));
        dispatcher
            .dispatch(ev("a", Event::command(Command::FillForm)))
            .await;

        wait_for_no_lanes(&dispatcher).await;
        assert_eq!(bodies_for(&log, "a"), vec![prompts::NAME_PROMPT]);

        dispatcher.dispatch(ev("a", Event::text("Alice"))).await;
        dispatcher.drain().await;
        assert_eq!(
            bodies_for(&log, "a"),
            vec![prompts::NAME_PROMPT, prompts::AGE_PROMPT]
        );
    }

    #[tokio::test]
    async fn dead_lane_is_reopened() {
        let (dispatcher, log) = dispatcher();
        dispatcher
            .dispatch(ev("a", Event::command(Command::FillForm)))
            .await;
        timeout(Duration::from_secs(5), async {
            while bodies_for(&log, "a").is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("first reply delivered");

        {
            let mut lanes = dispatcher.lanes.lock().await;
            let lane = lanes.get_mut(&ParticipantId::new("a")).unwrap();
            lane.worker.abort();
            let _ = (&mut lane.worker).await;
        }

        dispatcher.dispatch(ev("a", Event::text("Alice"))).await;
        dispatcher.drain().await;

        let bodies = bodies_for(&log, "a");
        assert_eq!(bodies.last().map(String::as_str), Some(prompts::AGE_PROMPT));
    }

    #[tokio::test]
    async fn engine_state_survives_drain() {
        let (dispatcher, _log) = dispatcher();
        let events = vec![
            ev("a", Event::command(Command::FillForm)),
            ev("a", Event::text("Alice")),
        ];
        dispatcher.run_stream(Box::pin(stream::iter(events))).await;

        let session = dispatcher
            .engine()
            .sessions()
            .get(&ParticipantId::new("a"))
            .await
            .unwrap();
        assert_eq!(session.step, crate::form::Step::Age);
    }
}
