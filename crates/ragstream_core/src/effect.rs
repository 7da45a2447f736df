use crate::{Generation, IngestRequest, JobId, QueryRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    OpenChatStream {
        generation: Generation,
        request: QueryRequest,
    },
    AskOnce {
        generation: Generation,
        request: QueryRequest,
    },
    CancelChat { generation: Generation },
    OpenIngestStream {
        generation: Generation,
        request: IngestRequest,
    },
    IngestOnce {
        generation: Generation,
        request: IngestRequest,
    },
    SubmitIngestJob {
        generation: Generation,
        request: IngestRequest,
    },
    WatchJob {
        generation: Generation,
        job_id: JobId,
    },
    CancelIngest { generation: Generation },
}
