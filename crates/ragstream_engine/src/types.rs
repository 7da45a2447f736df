use std::fmt;

use ragstream_core::{
    ChatEvent, Generation, IngestEvent, IngestTracker, JobId, JobSnapshot, Message,
    ValidationError,
};

/// Max characters of an error response body kept in [`TransportError::HttpStatus`].
pub const ERROR_BODY_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("invalid endpoint url: {0}")]
    Endpoint(String),
    #[error("request cancelled")]
    Cancelled,
}

impl TransportError {
    pub(crate) fn http_status(status: u16, body: &str) -> Self {
        TransportError::HttpStatus {
            status,
            body: body.chars().take(ERROR_BODY_LIMIT).collect(),
        }
    }
}

/// Why a session could not run to completion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("job {job_id} did not finish within {seconds}s")]
    DeadlineExceeded { job_id: JobId, seconds: u64 },
}

/// How a chat stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    Completed,
    Failed(SessionError),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOutcome {
    pub reply: Message,
    pub end: StreamEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestEnd {
    Completed,
    /// In-band error reported by the backend.
    Rejected(String),
    /// Stream closed before reaching 100 percent.
    Incomplete,
    Failed(SessionError),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub progress: IngestTracker,
    pub end: IngestEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Completed(JobSnapshot),
    Failed(JobSnapshot),
    Error(PollError),
    Cancelled,
}

/// Events published by the engine. Every variant carries the generation of
/// the session that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    ChatOpened {
        generation: Generation,
    },
    Chat {
        generation: Generation,
        event: ChatEvent,
    },
    ChatEnded {
        generation: Generation,
    },
    ChatFailed {
        generation: Generation,
        error: SessionError,
    },
    IngestOpened {
        generation: Generation,
    },
    Ingest {
        generation: Generation,
        event: IngestEvent,
    },
    IngestEnded {
        generation: Generation,
    },
    IngestFailed {
        generation: Generation,
        error: SessionError,
    },
    JobAccepted {
        generation: Generation,
        job_id: JobId,
    },
    JobStatus {
        generation: Generation,
        snapshot: JobSnapshot,
    },
    JobFailed {
        generation: Generation,
        error: PollError,
    },
    /// Ctrl-C from the terminal.
    Interrupted,
}

impl fmt::Display for StreamEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamEnd::Completed => write!(f, "completed"),
            StreamEnd::Failed(err) => write!(f, "failed: {err}"),
            StreamEnd::Cancelled => write!(f, "cancelled"),
        }
    }
}
