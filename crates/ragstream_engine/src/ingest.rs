use std::sync::Arc;

use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::StreamExt;
use ragstream_core::{
    validate_ingest, Generation, IngestEvent, IngestProgress, IngestRequest, IngestStep,
    IngestTracker, JobId,
};
use tokio_util::sync::CancellationToken;

use crate::frame::FrameDecoder;
use crate::parse::parse_ingest_frame;
use crate::{EngineEvent, EventSink, IngestEnd, IngestOutcome, RagTransport, SessionError};

/// Step text reported when a synchronous ingestion returns.
pub const SYNC_DONE_STEP: &str = "Ingested";

/// One ingestion run against the streaming, synchronous or job endpoints.
pub struct IngestSession {
    generation: Generation,
    cancel: CancellationToken,
    sink: Arc<dyn EventSink>,
}

impl IngestSession {
    pub fn new(generation: Generation, sink: Arc<dyn EventSink>) -> Self {
        Self::with_cancel(generation, sink, CancellationToken::new())
    }

    pub fn with_cancel(
        generation: Generation,
        sink: Arc<dyn EventSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            generation,
            cancel,
            sink,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Streams progress frames until the run reaches 100 percent, reports an
    /// error, or the server closes the stream.
    pub async fn stream(&self, transport: &dyn RagTransport, request: &IngestRequest) -> IngestOutcome {
        let mut tracker = IngestTracker::new();
        if let Err(err) = validate_ingest(request) {
            return self.fail(tracker, err.into());
        }

        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return self.cancelled(tracker),
            result = transport.ingest_stream(request) => result,
        };
        let mut body = match opened {
            Ok(body) => body,
            Err(err) => return self.fail(tracker, err.into()),
        };
        self.publish(EngineEvent::IngestOpened {
            generation: self.generation,
        });

        let mut decoder = FrameDecoder::new();
        loop {
            let chunk = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.cancelled(tracker),
                chunk = body.next() => chunk,
            };
            match chunk {
                Some(Ok(bytes)) => {
                    for frame in decoder.push(&bytes) {
                        let Some(event) = parse_ingest_frame(&frame) else {
                            continue;
                        };
                        if self.cancel.is_cancelled() {
                            return self.cancelled(tracker);
                        }
                        let step = tracker.apply(&event);
                        self.publish(EngineEvent::Ingest {
                            generation: self.generation,
                            event,
                        });
                        match step {
                            IngestStep::Progressed => {}
                            IngestStep::Completed => {
                                engine_info!(
                                    "Ingestion {} completed: {}",
                                    self.generation,
                                    tracker.completion_text()
                                );
                                return IngestOutcome {
                                    progress: tracker,
                                    end: IngestEnd::Completed,
                                };
                            }
                            IngestStep::Failed(message) => {
                                engine_warn!("Ingestion {} rejected: {}", self.generation, message);
                                return IngestOutcome {
                                    progress: tracker,
                                    end: IngestEnd::Rejected(message),
                                };
                            }
                        }
                    }
                }
                Some(Err(err)) => return self.fail(tracker, err.into()),
                None => {
                    decoder.finish();
                    engine_warn!(
                        "Ingestion {} stream closed at {}%",
                        self.generation,
                        tracker.percent
                    );
                    self.publish(EngineEvent::IngestEnded {
                        generation: self.generation,
                    });
                    return IngestOutcome {
                        progress: tracker,
                        end: IngestEnd::Incomplete,
                    };
                }
            }
        }
    }

    /// Blocking ingestion endpoint. Success is published as a single
    /// 100 percent progress event.
    pub async fn ingest_once(&self, transport: &dyn RagTransport, request: &IngestRequest) -> IngestOutcome {
        let mut tracker = IngestTracker::new();
        if let Err(err) = validate_ingest(request) {
            return self.fail(tracker, err.into());
        }

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return self.cancelled(tracker),
            result = transport.ingest(request) => result,
        };
        if let Err(err) = result {
            return self.fail(tracker, err.into());
        }
        if self.cancel.is_cancelled() {
            return self.cancelled(tracker);
        }

        self.publish(EngineEvent::IngestOpened {
            generation: self.generation,
        });
        let event = IngestEvent::Progress(IngestProgress {
            percent: 100,
            step: SYNC_DONE_STEP.to_string(),
            chunks_processed: None,
        });
        tracker.apply(&event);
        self.publish(EngineEvent::Ingest {
            generation: self.generation,
            event,
        });
        engine_info!("Ingestion {} completed synchronously", self.generation);
        IngestOutcome {
            progress: tracker,
            end: IngestEnd::Completed,
        }
    }

    /// Submits a background job. Returns `None` when the submission failed
    /// or the session was cancelled in the meantime.
    pub async fn submit_job(&self, transport: &dyn RagTransport, request: &IngestRequest) -> Option<JobId> {
        if let Err(err) = validate_ingest(request) {
            self.fail(IngestTracker::new(), err.into());
            return None;
        }

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            result = transport.submit_ingest_job(request) => result,
        };
        match result {
            Ok(job_id) if !self.cancel.is_cancelled() => {
                engine_info!("Ingestion {} queued as job {}", self.generation, job_id);
                self.publish(EngineEvent::JobAccepted {
                    generation: self.generation,
                    job_id: job_id.clone(),
                });
                Some(job_id)
            }
            Ok(_) => None,
            Err(err) => {
                self.fail(IngestTracker::new(), err.into());
                None
            }
        }
    }

    fn publish(&self, event: EngineEvent) {
        if !self.cancel.is_cancelled() {
            self.sink.emit(event);
        }
    }

    fn fail(&self, tracker: IngestTracker, error: SessionError) -> IngestOutcome {
        engine_warn!("Ingestion {} failed: {}", self.generation, error);
        self.publish(EngineEvent::IngestFailed {
            generation: self.generation,
            error: error.clone(),
        });
        IngestOutcome {
            progress: tracker,
            end: IngestEnd::Failed(error),
        }
    }

    fn cancelled(&self, tracker: IngestTracker) -> IngestOutcome {
        engine_debug!("Ingestion {} cancelled", self.generation);
        IngestOutcome {
            progress: tracker,
            end: IngestEnd::Cancelled,
        }
    }
}
