use std::sync::{mpsc, Arc};
use std::thread;

use engine_logging::{engine_debug, engine_info};
use ragstream_core::{Effect, Msg};
use ragstream_engine::{EngineEvent, EngineHandle, PollSettings, RagTransport};

/// What the app loop consumes: core messages plus terminal signals that only
/// the app can interpret.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Msg(Msg),
    /// Ctrl-C.
    Interrupted,
    /// Stdin reached end of file.
    EndOfInput,
}

pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(
        transport: Arc<dyn RagTransport>,
        poll: PollSettings,
        input_tx: mpsc::Sender<Input>,
    ) -> Self {
        let (engine, events) = EngineHandle::new(transport, poll);
        engine.watch_interrupts();
        spawn_event_pump(events, input_tx);
        Self { engine }
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::OpenChatStream {
                    generation,
                    request,
                } => {
                    engine_info!("Chat {} streaming ({} chars)", generation, request.text.len());
                    self.engine.open_chat(generation, request);
                }
                Effect::AskOnce {
                    generation,
                    request,
                } => {
                    engine_info!("Chat {} asking once", generation);
                    self.engine.ask_once(generation, request);
                }
                Effect::CancelChat { generation } => self.engine.cancel_chat(generation),
                Effect::OpenIngestStream {
                    generation,
                    request,
                } => {
                    engine_info!("Ingestion {} streaming", generation);
                    self.engine.open_ingest(generation, request);
                }
                Effect::IngestOnce {
                    generation,
                    request,
                } => {
                    engine_info!("Ingestion {} synchronous", generation);
                    self.engine.ingest_once(generation, request);
                }
                Effect::SubmitIngestJob {
                    generation,
                    request,
                } => {
                    engine_info!("Ingestion {} submitting job", generation);
                    self.engine.submit_job(generation, request);
                }
                Effect::WatchJob { generation, job_id } => {
                    engine_info!("Ingestion {} watching job {}", generation, job_id);
                    self.engine.watch_job(generation, job_id);
                }
                Effect::CancelIngest { generation } => self.engine.cancel_ingest(generation),
            }
        }
    }
}

fn spawn_event_pump(events: mpsc::Receiver<EngineEvent>, input_tx: mpsc::Sender<Input>) {
    thread::spawn(move || {
        for event in events {
            if input_tx.send(map_event(event)).is_err() {
                break;
            }
        }
        engine_debug!("Engine event pump stopped");
    });
}

/// Translates one engine event into app input.
pub fn map_event(event: EngineEvent) -> Input {
    let msg = match event {
        EngineEvent::ChatOpened { generation } => Msg::ChatStreamOpened { generation },
        EngineEvent::Chat { generation, event } => Msg::ChatEventReceived { generation, event },
        EngineEvent::ChatEnded { generation } => Msg::ChatStreamEnded { generation },
        EngineEvent::ChatFailed { generation, error } => Msg::ChatFailed {
            generation,
            error: error.to_string(),
        },
        EngineEvent::IngestOpened { generation } => Msg::IngestStreamOpened { generation },
        EngineEvent::Ingest { generation, event } => Msg::IngestEventReceived { generation, event },
        EngineEvent::IngestEnded { generation } => Msg::IngestStreamEnded { generation },
        EngineEvent::IngestFailed { generation, error } => Msg::IngestFailed {
            generation,
            error: error.to_string(),
        },
        EngineEvent::JobAccepted { generation, job_id } => Msg::JobAccepted { generation, job_id },
        EngineEvent::JobStatus {
            generation,
            snapshot,
        } => Msg::JobPolled {
            generation,
            snapshot,
        },
        EngineEvent::JobFailed { generation, error } => Msg::JobPollFailed {
            generation,
            error: error.to_string(),
        },
        EngineEvent::Interrupted => return Input::Interrupted,
    };
    Input::Msg(msg)
}
