use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use ragstream_core::{Generation, JobId, JobStatus};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{EngineEvent, EventSink, PollError, PollOutcome, RagTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// `None` polls until the job reaches a terminal status.
    pub deadline: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            deadline: Some(Duration::from_secs(30 * 60)),
        }
    }
}

/// Polls the job status endpoint until the job completes, fails, or the
/// watcher is disposed.
#[derive(Clone)]
pub struct JobPoller {
    transport: Arc<dyn RagTransport>,
    settings: PollSettings,
    sink: Arc<dyn EventSink>,
}

/// A running poll task. Dropping the handle leaves the task running;
/// call [`PollerHandle::dispose`] to stop it.
pub struct PollerHandle {
    cancel: CancellationToken,
    task: JoinHandle<PollOutcome>,
}

impl PollerHandle {
    /// Stops polling. No status is published after this returns.
    pub fn dispose(&self) {
        self.cancel.cancel();
        self.task.abort();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn join(self) -> PollOutcome {
        self.task.await.unwrap_or(PollOutcome::Cancelled)
    }
}

impl JobPoller {
    pub fn new(
        transport: Arc<dyn RagTransport>,
        settings: PollSettings,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            transport,
            settings,
            sink,
        }
    }

    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    /// Spawns the poll loop on the current runtime.
    pub fn start(&self, generation: Generation, job_id: JobId) -> PollerHandle {
        let cancel = CancellationToken::new();
        let poller = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move { poller.run(generation, job_id, &token).await });
        PollerHandle { cancel, task }
    }

    pub async fn run(
        &self,
        generation: Generation,
        job_id: JobId,
        cancel: &CancellationToken,
    ) -> PollOutcome {
        let started = Instant::now();
        let mut polls: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                return self.cancelled(&job_id);
            }

            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancelled(&job_id),
                result = self.transport.job_status(&job_id) => result,
            };
            polls += 1;
            if cancel.is_cancelled() {
                return self.cancelled(&job_id);
            }

            let snapshot = match fetched {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    return self.publish_error(generation, &job_id, PollError::Transport(err));
                }
            };
            engine_debug!(
                "Job {} poll #{}: {} {}%",
                job_id,
                polls,
                snapshot.status,
                snapshot.progress
            );

            let status = snapshot.status;
            self.sink.emit(EngineEvent::JobStatus {
                generation,
                snapshot: snapshot.clone(),
            });
            match status {
                JobStatus::Completed => {
                    engine_info!("Job {} completed after {} polls", job_id, polls);
                    return PollOutcome::Completed(snapshot);
                }
                JobStatus::Failed => {
                    engine_warn!("Job {} failed: {}", job_id, snapshot.failure_reason());
                    return PollOutcome::Failed(snapshot);
                }
                JobStatus::Pending | JobStatus::Running => {}
            }

            if let Some(deadline) = self.settings.deadline {
                if started.elapsed() >= deadline {
                    let error = PollError::DeadlineExceeded {
                        job_id: job_id.clone(),
                        seconds: deadline.as_secs(),
                    };
                    return self.publish_error(generation, &job_id, error);
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancelled(&job_id),
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }
    }

    fn publish_error(&self, generation: Generation, job_id: &str, error: PollError) -> PollOutcome {
        engine_warn!("Polling job {} stopped: {}", job_id, error);
        self.sink.emit(EngineEvent::JobFailed {
            generation,
            error: error.clone(),
        });
        PollOutcome::Error(error)
    }

    fn cancelled(&self, job_id: &str) -> PollOutcome {
        engine_debug!("Stopped watching job {}", job_id);
        PollOutcome::Cancelled
    }
}
