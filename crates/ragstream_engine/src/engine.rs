use std::sync::{mpsc, Arc};
use std::thread;

use engine_logging::{engine_debug, engine_info};
use ragstream_core::{Generation, IngestRequest, JobId, QueryRequest};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use crate::{
    ChannelEventSink, ChatSession, EngineEvent, EventSink, IngestSession, JobPoller, PollSettings,
    PollerHandle, RagTransport,
};

enum EngineCommand {
    OpenChat {
        generation: Generation,
        request: QueryRequest,
    },
    AskOnce {
        generation: Generation,
        request: QueryRequest,
    },
    CancelChat {
        generation: Generation,
    },
    OpenIngest {
        generation: Generation,
        request: IngestRequest,
    },
    IngestOnce {
        generation: Generation,
        request: IngestRequest,
    },
    SubmitJob {
        generation: Generation,
        request: IngestRequest,
    },
    WatchJob {
        generation: Generation,
        job_id: JobId,
    },
    CancelIngest {
        generation: Generation,
    },
    WatchInterrupts,
}

/// At most one running task per kind; starting a new one cancels the old.
struct ActiveTask {
    generation: Generation,
    cancel: CancellationToken,
    /// Set when the task is a job watch spawned through [`JobPoller::start`].
    poller: Option<PollerHandle>,
}

impl ActiveTask {
    fn stop(self) {
        self.cancel.cancel();
        if let Some(poller) = self.poller {
            poller.dispose();
        }
    }
}

#[derive(Default)]
struct ActiveTasks {
    chat: Option<ActiveTask>,
    ingest: Option<ActiveTask>,
}

fn supersede(slot: &mut Option<ActiveTask>, generation: Generation) {
    if let Some(previous) = slot.take() {
        engine_debug!("Generation {} supersedes {}", generation, previous.generation);
        previous.stop();
    }
}

fn replace(slot: &mut Option<ActiveTask>, generation: Generation) -> CancellationToken {
    supersede(slot, generation);
    let cancel = CancellationToken::new();
    *slot = Some(ActiveTask {
        generation,
        cancel: cancel.clone(),
        poller: None,
    });
    cancel
}

fn cancel_matching(slot: &mut Option<ActiveTask>, generation: Generation) {
    if slot.as_ref().is_some_and(|task| task.generation == generation) {
        if let Some(task) = slot.take() {
            task.stop();
        }
    }
}

/// Handle to the engine thread. Commands are queued; results arrive on the
/// event receiver returned by [`EngineHandle::new`].
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    pub fn new(
        transport: Arc<dyn RagTransport>,
        poll: PollSettings,
    ) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let sink: Arc<dyn EventSink> = Arc::new(ChannelEventSink::new(event_tx));

        thread::spawn(move || {
            let runtime = Runtime::new().expect("tokio runtime");
            let poller = JobPoller::new(transport.clone(), poll, sink.clone());
            let mut active = ActiveTasks::default();
            while let Ok(command) = cmd_rx.recv() {
                dispatch(&runtime, &transport, &poller, &sink, &mut active, command);
            }
            engine_info!("Engine command channel closed");
        });

        (Self { cmd_tx }, event_rx)
    }

    pub fn open_chat(&self, generation: Generation, request: QueryRequest) {
        self.send(EngineCommand::OpenChat {
            generation,
            request,
        });
    }

    pub fn ask_once(&self, generation: Generation, request: QueryRequest) {
        self.send(EngineCommand::AskOnce {
            generation,
            request,
        });
    }

    pub fn cancel_chat(&self, generation: Generation) {
        self.send(EngineCommand::CancelChat { generation });
    }

    pub fn open_ingest(&self, generation: Generation, request: IngestRequest) {
        self.send(EngineCommand::OpenIngest {
            generation,
            request,
        });
    }

    pub fn ingest_once(&self, generation: Generation, request: IngestRequest) {
        self.send(EngineCommand::IngestOnce {
            generation,
            request,
        });
    }

    pub fn submit_job(&self, generation: Generation, request: IngestRequest) {
        self.send(EngineCommand::SubmitJob {
            generation,
            request,
        });
    }

    pub fn watch_job(&self, generation: Generation, job_id: JobId) {
        self.send(EngineCommand::WatchJob { generation, job_id });
    }

    pub fn cancel_ingest(&self, generation: Generation) {
        self.send(EngineCommand::CancelIngest { generation });
    }

    /// Publishes [`EngineEvent::Interrupted`] on every Ctrl-C.
    pub fn watch_interrupts(&self) {
        self.send(EngineCommand::WatchInterrupts);
    }

    fn send(&self, command: EngineCommand) {
        let _ = self.cmd_tx.send(command);
    }
}

fn dispatch(
    runtime: &Runtime,
    transport: &Arc<dyn RagTransport>,
    poller: &JobPoller,
    sink: &Arc<dyn EventSink>,
    active: &mut ActiveTasks,
    command: EngineCommand,
) {
    match command {
        EngineCommand::OpenChat {
            generation,
            request,
        } => {
            let cancel = replace(&mut active.chat, generation);
            let session = ChatSession::with_cancel(generation, sink.clone(), cancel);
            let transport = transport.clone();
            runtime.spawn(async move {
                session.stream(transport.as_ref(), &request).await;
            });
        }
        EngineCommand::AskOnce {
            generation,
            request,
        } => {
            let cancel = replace(&mut active.chat, generation);
            let session = ChatSession::with_cancel(generation, sink.clone(), cancel);
            let transport = transport.clone();
            runtime.spawn(async move {
                session.ask_once(transport.as_ref(), &request).await;
            });
        }
        EngineCommand::CancelChat { generation } => cancel_matching(&mut active.chat, generation),
        EngineCommand::OpenIngest {
            generation,
            request,
        } => {
            let cancel = replace(&mut active.ingest, generation);
            let session = IngestSession::with_cancel(generation, sink.clone(), cancel);
            let transport = transport.clone();
            runtime.spawn(async move {
                session.stream(transport.as_ref(), &request).await;
            });
        }
        EngineCommand::IngestOnce {
            generation,
            request,
        } => {
            let cancel = replace(&mut active.ingest, generation);
            let session = IngestSession::with_cancel(generation, sink.clone(), cancel);
            let transport = transport.clone();
            runtime.spawn(async move {
                session.ingest_once(transport.as_ref(), &request).await;
            });
        }
        EngineCommand::SubmitJob {
            generation,
            request,
        } => {
            let cancel = replace(&mut active.ingest, generation);
            let session = IngestSession::with_cancel(generation, sink.clone(), cancel.clone());
            let transport = transport.clone();
            let poller = poller.clone();
            runtime.spawn(async move {
                if let Some(job_id) = session.submit_job(transport.as_ref(), &request).await {
                    poller.run(generation, job_id, &cancel).await;
                }
            });
        }
        EngineCommand::WatchJob { generation, job_id } => {
            supersede(&mut active.ingest, generation);
            let handle = {
                let _runtime = runtime.enter();
                poller.start(generation, job_id)
            };
            active.ingest = Some(ActiveTask {
                generation,
                cancel: handle.cancel_token(),
                poller: Some(handle),
            });
        }
        EngineCommand::CancelIngest { generation } => {
            cancel_matching(&mut active.ingest, generation)
        }
        EngineCommand::WatchInterrupts => {
            let sink = sink.clone();
            runtime.spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    engine_info!("Interrupt received");
                    sink.emit(EngineEvent::Interrupted);
                }
            });
        }
    }
}
