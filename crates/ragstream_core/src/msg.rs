use crate::{
    ChatEvent, ChatMode, Generation, IngestEvent, IngestMode, IngestRequest, JobId, JobSnapshot,
    QueryRequest,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User asked a question.
    ChatSubmitted {
        request: QueryRequest,
        mode: ChatMode,
    },
    /// Transport confirmed the answer stream has begun.
    ChatStreamOpened { generation: Generation },
    /// One parsed event from the answer stream.
    ChatEventReceived {
        generation: Generation,
        event: ChatEvent,
    },
    /// Server closed the answer stream.
    ChatStreamEnded { generation: Generation },
    /// Transport or validation failure for the turn.
    ChatFailed {
        generation: Generation,
        error: String,
    },
    /// User cancelled the running turn.
    ChatCancelRequested,
    /// User started an ingestion.
    IngestSubmitted {
        request: IngestRequest,
        mode: IngestMode,
    },
    IngestStreamOpened { generation: Generation },
    IngestEventReceived {
        generation: Generation,
        event: IngestEvent,
    },
    IngestStreamEnded { generation: Generation },
    IngestFailed {
        generation: Generation,
        error: String,
    },
    /// Backend accepted an ingestion job.
    JobAccepted {
        generation: Generation,
        job_id: JobId,
    },
    /// One status snapshot from the job poller.
    JobPolled {
        generation: Generation,
        snapshot: JobSnapshot,
    },
    /// Polling stopped on a transport error or deadline.
    JobPollFailed {
        generation: Generation,
        error: String,
    },
    /// User asked to follow an existing job.
    JobWatchRequested(JobId),
    /// User cancelled the running ingestion or poll.
    IngestCancelRequested,
}
