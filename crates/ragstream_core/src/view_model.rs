use crate::{ChatPhase, Generation, IngestPhase, JobId, Message, Usage};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub chat: ChatView,
    pub ingest: IngestView,
    pub pending_notifications: usize,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatView {
    pub phase: ChatPhase,
    pub generation: Generation,
    pub transcript: Vec<Message>,
    pub last_usage: Option<Usage>,
}

impl ChatView {
    /// The assistant reply of the latest turn, if any.
    pub fn current_reply(&self) -> Option<&Message> {
        self.transcript
            .last()
            .filter(|message| message.role == crate::Role::Assistant)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IngestView {
    pub phase: IngestPhase,
    pub generation: Generation,
    pub percent: u8,
    pub status_line: String,
    pub chunks_processed: Option<u64>,
    pub job_id: Option<JobId>,
}
