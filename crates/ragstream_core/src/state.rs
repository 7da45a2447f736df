use crate::fold::{IngestStep, IngestTracker, ReplyStep};
use crate::view_model::{AppViewModel, ChatView, IngestView};
use crate::{ChatEvent, Generation, IngestEvent, JobId, JobSnapshot, JobStatus, Message, Usage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatPhase {
    #[default]
    Idle,
    Sending,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl ChatPhase {
    pub fn is_active(self) -> bool {
        matches!(self, ChatPhase::Sending | ChatPhase::Streaming)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ChatPhase::Completed | ChatPhase::Failed | ChatPhase::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestPhase {
    #[default]
    Idle,
    Uploading,
    Streaming,
    Polling,
    Completed,
    Failed,
    Cancelled,
}

impl IngestPhase {
    pub fn is_active(self) -> bool {
        matches!(
            self,
            IngestPhase::Uploading | IngestPhase::Streaming | IngestPhase::Polling
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            IngestPhase::Completed | IngestPhase::Failed | IngestPhase::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

/// One user-facing toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub text: String,
}

impl Notification {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct ChatState {
    phase: ChatPhase,
    generation: Generation,
    transcript: Vec<Message>,
    last_usage: Option<Usage>,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct IngestState {
    phase: IngestPhase,
    generation: Generation,
    tracker: IngestTracker,
    status_line: String,
    job_id: Option<JobId>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    chat: ChatState,
    ingest: IngestState,
    notifications: Vec<Notification>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            chat: ChatView {
                phase: self.chat.phase,
                generation: self.chat.generation,
                transcript: self.chat.transcript.clone(),
                last_usage: self.chat.last_usage.clone(),
            },
            ingest: IngestView {
                phase: self.ingest.phase,
                generation: self.ingest.generation,
                percent: self.ingest.tracker.percent,
                status_line: self.ingest.status_line.clone(),
                chunks_processed: self.ingest.tracker.chunks_processed,
                job_id: self.ingest.job_id.clone(),
            },
            pending_notifications: self.notifications.len(),
            dirty: self.dirty,
        }
    }

    pub fn chat_phase(&self) -> ChatPhase {
        self.chat.phase
    }

    pub fn ingest_phase(&self) -> IngestPhase {
        self.ingest.phase
    }

    pub fn transcript(&self) -> &[Message] {
        &self.chat.transcript
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub(crate) fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
        self.dirty = true;
    }

    // --- chat ---------------------------------------------------------------

    pub(crate) fn chat_generation(&self) -> Generation {
        self.chat.generation
    }

    pub(crate) fn is_current_chat(&self, generation: Generation) -> bool {
        generation == self.chat.generation && self.chat.phase.is_active()
    }

    /// Opens a new turn: a user message plus an empty assistant reply.
    pub(crate) fn begin_chat_turn(&mut self, question: &str) -> Generation {
        self.chat.generation += 1;
        self.chat.phase = ChatPhase::Sending;
        self.chat.last_usage = None;
        self.chat.transcript.push(Message::user(question));
        self.chat.transcript.push(Message::assistant());
        self.dirty = true;
        self.chat.generation
    }

    pub(crate) fn mark_chat_streaming(&mut self) {
        if self.chat.phase == ChatPhase::Sending {
            self.chat.phase = ChatPhase::Streaming;
            self.dirty = true;
        }
    }

    pub(crate) fn apply_chat_event(&mut self, event: &ChatEvent) {
        self.mark_chat_streaming();
        let Some(reply) = self.chat.transcript.last_mut() else {
            return;
        };
        match reply.apply_chat_event(event) {
            ReplyStep::Changed => self.dirty = true,
            ReplyStep::Unchanged => {}
            ReplyStep::Usage(usage) => {
                self.chat.last_usage = Some(usage);
                self.dirty = true;
            }
            ReplyStep::ServerError(message) => self.notify(Notification::error(message)),
            ReplyStep::Done => self.finish_chat(ChatPhase::Completed),
        }
    }

    /// Freezes the open reply. Nothing folds into it afterwards.
    pub(crate) fn finish_chat(&mut self, phase: ChatPhase) {
        self.chat.phase = phase;
        self.dirty = true;
    }

    // --- ingestion ----------------------------------------------------------

    pub(crate) fn ingest_generation(&self) -> Generation {
        self.ingest.generation
    }

    pub(crate) fn is_current_ingest(&self, generation: Generation) -> bool {
        generation == self.ingest.generation && self.ingest.phase.is_active()
    }

    pub(crate) fn begin_ingest(&mut self, phase: IngestPhase, status_line: &str) -> Generation {
        self.ingest.generation += 1;
        self.ingest.phase = phase;
        self.ingest.tracker = IngestTracker::new();
        self.ingest.status_line = status_line.to_string();
        self.ingest.job_id = None;
        self.dirty = true;
        self.ingest.generation
    }

    pub(crate) fn mark_ingest_streaming(&mut self) {
        if self.ingest.phase == IngestPhase::Uploading {
            self.ingest.phase = IngestPhase::Streaming;
            self.dirty = true;
        }
    }

    pub(crate) fn apply_ingest_event(&mut self, event: &IngestEvent) {
        self.mark_ingest_streaming();
        match self.ingest.tracker.apply(event) {
            IngestStep::Progressed => {
                self.ingest.status_line = self.ingest.tracker.step.clone();
                self.dirty = true;
            }
            IngestStep::Completed => {
                let text = self.ingest.tracker.completion_text();
                self.complete_ingest(text);
            }
            IngestStep::Failed(message) => self.fail_ingest(message),
        }
    }

    pub(crate) fn set_job(&mut self, job_id: JobId) {
        self.ingest.phase = IngestPhase::Polling;
        self.ingest.status_line = "Queued".to_string();
        self.ingest.job_id = Some(job_id);
        self.dirty = true;
    }

    pub(crate) fn apply_job_snapshot(&mut self, snapshot: &JobSnapshot) {
        self.ingest.tracker.percent = snapshot.effective_progress();
        self.ingest.status_line = snapshot.status_line();
        self.dirty = true;
        match snapshot.status {
            JobStatus::Completed => self.complete_ingest("Ingestion completed".to_string()),
            JobStatus::Failed => {
                self.fail_ingest(format!("Ingestion failed: {}", snapshot.failure_reason()))
            }
            JobStatus::Pending | JobStatus::Running => {}
        }
    }

    pub(crate) fn complete_ingest(&mut self, text: String) {
        self.ingest.phase = IngestPhase::Completed;
        self.ingest.tracker.percent = 100;
        self.ingest.status_line = "Completed".to_string();
        self.notify(Notification::success(text));
    }

    pub(crate) fn fail_ingest(&mut self, message: String) {
        self.ingest.phase = IngestPhase::Failed;
        self.notify(Notification::error(message));
    }

    pub(crate) fn cancel_ingest(&mut self) {
        self.ingest.phase = IngestPhase::Cancelled;
        self.ingest.status_line = "Cancelled".to_string();
        self.dirty = true;
    }
}
