use crate::validate::{validate_ingest, validate_job_id, validate_query};
use crate::{
    AppState, ChatMode, ChatPhase, Effect, IngestMode, IngestPhase, Msg, Notification,
};

/// Pure update function: applies a message to state and returns any effects.
///
/// Messages tagged with a generation other than the current one are dropped,
/// so a superseded session can never publish into the state again.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::ChatSubmitted { request, mode } => {
            if let Err(err) = validate_query(&request) {
                state.notify(Notification::error(err.to_string()));
                return (state, Vec::new());
            }

            let mut effects = Vec::with_capacity(2);
            if state.chat_phase().is_active() {
                effects.push(Effect::CancelChat {
                    generation: state.chat_generation(),
                });
            }
            let generation = state.begin_chat_turn(&request.text);
            effects.push(match mode {
                ChatMode::Stream => Effect::OpenChatStream {
                    generation,
                    request,
                },
                ChatMode::Once => Effect::AskOnce {
                    generation,
                    request,
                },
            });
            effects
        }
        Msg::ChatStreamOpened { generation } => {
            if state.is_current_chat(generation) {
                state.mark_chat_streaming();
            }
            Vec::new()
        }
        Msg::ChatEventReceived { generation, event } => {
            if state.is_current_chat(generation) {
                state.apply_chat_event(&event);
            }
            Vec::new()
        }
        Msg::ChatStreamEnded { generation } => {
            if state.is_current_chat(generation) {
                state.finish_chat(ChatPhase::Completed);
            }
            Vec::new()
        }
        Msg::ChatFailed { generation, error } => {
            if state.is_current_chat(generation) {
                state.finish_chat(ChatPhase::Failed);
                state.notify(Notification::error(error));
            }
            Vec::new()
        }
        Msg::ChatCancelRequested => {
            if state.chat_phase().is_active() {
                state.finish_chat(ChatPhase::Cancelled);
                vec![Effect::CancelChat {
                    generation: state.chat_generation(),
                }]
            } else {
                Vec::new()
            }
        }
        Msg::IngestSubmitted { request, mode } => {
            if let Err(err) = validate_ingest(&request) {
                state.notify(Notification::error(err.to_string()));
                return (state, Vec::new());
            }

            let mut effects = supersede_ingest(&state);
            let generation = state.begin_ingest(IngestPhase::Uploading, "Uploading...");
            effects.push(match mode {
                IngestMode::Stream => Effect::OpenIngestStream {
                    generation,
                    request,
                },
                IngestMode::Job => Effect::SubmitIngestJob {
                    generation,
                    request,
                },
                IngestMode::Sync => Effect::IngestOnce {
                    generation,
                    request,
                },
            });
            effects
        }
        Msg::IngestStreamOpened { generation } => {
            if state.is_current_ingest(generation) {
                state.mark_ingest_streaming();
            }
            Vec::new()
        }
        Msg::IngestEventReceived { generation, event } => {
            if state.is_current_ingest(generation) {
                state.apply_ingest_event(&event);
            }
            Vec::new()
        }
        Msg::IngestStreamEnded { generation } => {
            if state.is_current_ingest(generation) {
                state.fail_ingest("Stream ended before ingestion completed".to_string());
            }
            Vec::new()
        }
        Msg::IngestFailed { generation, error } | Msg::JobPollFailed { generation, error } => {
            if state.is_current_ingest(generation) {
                state.fail_ingest(error);
            }
            Vec::new()
        }
        Msg::JobAccepted { generation, job_id } => {
            if state.is_current_ingest(generation) {
                state.notify(Notification::info(format!("Job {job_id} queued")));
                state.set_job(job_id);
            }
            Vec::new()
        }
        Msg::JobPolled {
            generation,
            snapshot,
        } => {
            if state.is_current_ingest(generation) {
                state.apply_job_snapshot(&snapshot);
            }
            Vec::new()
        }
        Msg::JobWatchRequested(job_id) => {
            if let Err(err) = validate_job_id(&job_id) {
                state.notify(Notification::error(err.to_string()));
                return (state, Vec::new());
            }

            let mut effects = supersede_ingest(&state);
            let generation = state.begin_ingest(IngestPhase::Polling, "Queued");
            state.set_job(job_id.clone());
            effects.push(Effect::WatchJob { generation, job_id });
            effects
        }
        Msg::IngestCancelRequested => {
            if state.ingest_phase().is_active() {
                state.cancel_ingest();
                vec![Effect::CancelIngest {
                    generation: state.ingest_generation(),
                }]
            } else {
                Vec::new()
            }
        }
    };

    (state, effects)
}

fn supersede_ingest(state: &AppState) -> Vec<Effect> {
    let mut effects = Vec::with_capacity(2);
    if state.ingest_phase().is_active() {
        effects.push(Effect::CancelIngest {
            generation: state.ingest_generation(),
        });
    }
    effects
}
