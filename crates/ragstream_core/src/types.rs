use std::fmt;

/// Identity of one chat turn or one ingestion run. Bumped on every new request.
pub type Generation = u64;

/// Opaque identifier of a backend ingestion job.
pub type JobId = String;

pub const DEFAULT_FILE_DOMAIN: &str = "general";
pub const DEFAULT_FILE_TOPIC: &str = "pdf-upload";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub source: String,
    pub chunk_index: u32,
}

impl Citation {
    pub fn new(source: impl Into<String>, chunk_index: u32) -> Self {
        Self {
            source: source.into(),
            chunk_index,
        }
    }
}

/// Token/cost report attached to a streamed answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Usage {
    pub tokens: u64,
    pub cost: f64,
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Content(String),
    Citations(Vec<Citation>),
    Metadata(Usage),
    Error(String),
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestProgress {
    pub percent: u8,
    pub step: String,
    pub chunks_processed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestEvent {
    Progress(IngestProgress),
    Error(String),
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Point-in-time view of a backend job as returned by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub progress: u8,
    pub step: Option<String>,
    pub error: Option<String>,
}

impl JobSnapshot {
    /// A completed job always reports 100 whatever the backend sent.
    pub fn new(status: JobStatus, progress: u8) -> Self {
        let progress = match status {
            JobStatus::Completed => 100,
            _ => progress.min(100),
        };
        Self {
            status,
            progress,
            step: None,
            error: None,
        }
    }

    /// Progress as it should be shown; a completed job always reads 100.
    pub fn effective_progress(&self) -> u8 {
        match self.status {
            JobStatus::Completed => 100,
            _ => self.progress,
        }
    }

    pub fn failure_reason(&self) -> &str {
        self.error
            .as_deref()
            .filter(|reason| !reason.trim().is_empty())
            .unwrap_or("unknown")
    }

    pub fn status_line(&self) -> String {
        match self.status {
            JobStatus::Pending => "Queued".to_string(),
            JobStatus::Running => self
                .step
                .as_deref()
                .filter(|step| !step.trim().is_empty())
                .unwrap_or("Processing...")
                .to_string(),
            JobStatus::Completed => "Completed".to_string(),
            JobStatus::Failed => format!("Failed: {}", self.failure_reason()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub citations: Vec<Citation>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            citations: Vec::new(),
        }
    }

    pub fn assistant() -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            citations: Vec::new(),
        }
    }
}

/// Complete answer from the non-streaming ask endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryAnswer {
    pub answer: String,
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub text: String,
    pub domain: Option<String>,
    pub topic: Option<String>,
}

impl QueryRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            domain: None,
            topic: None,
        }
    }

    pub fn with_scope(mut self, domain: Option<String>, topic: Option<String>) -> Self {
        self.domain = domain;
        self.topic = topic;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatMode {
    #[default]
    Stream,
    Once,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestSource {
    Url(String),
    File { name: String, bytes: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRequest {
    pub source: IngestSource,
    pub domain: Option<String>,
    pub topic: Option<String>,
}

impl IngestRequest {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            source: IngestSource::Url(url.into()),
            domain: None,
            topic: None,
        }
    }

    pub fn file(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            source: IngestSource::File {
                name: name.into(),
                bytes,
            },
            domain: None,
            topic: None,
        }
    }

    pub fn with_scope(mut self, domain: Option<String>, topic: Option<String>) -> Self {
        self.domain = domain;
        self.topic = topic;
        self
    }

    /// Domain sent with a file upload; blank values fall back to the default.
    pub fn file_domain(&self) -> &str {
        non_blank(self.domain.as_deref()).unwrap_or(DEFAULT_FILE_DOMAIN)
    }

    pub fn file_topic(&self) -> &str {
        non_blank(self.topic.as_deref()).unwrap_or(DEFAULT_FILE_TOPIC)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestMode {
    Stream,
    #[default]
    Job,
    Sync,
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
