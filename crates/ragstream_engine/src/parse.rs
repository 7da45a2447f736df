//! Turns frame payloads and JSON bodies into typed events.
//!
//! Parsing never fails outward: a frame that cannot be understood is logged
//! and yields `None`, so one bad frame cannot end an otherwise healthy stream.

use engine_logging::{engine_debug, engine_trace, engine_warn};
use ragstream_core::{
    ChatEvent, Citation, IngestEvent, IngestProgress, JobId, JobSnapshot, JobStatus, QueryAnswer,
    Usage,
};
use serde::Deserialize;
use serde_json::Value;

pub const DATA_MARKER: &str = "data:";

#[derive(Debug, Deserialize)]
struct CitationWire {
    source: String,
    chunk_index: u32,
}

impl From<CitationWire> for Citation {
    fn from(wire: CitationWire) -> Self {
        Citation::new(wire.source, wire.chunk_index)
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ChatWire {
    Content {
        content: String,
    },
    Citations {
        citations: Vec<CitationWire>,
    },
    Metadata {
        tokens: u64,
        cost: f64,
        #[serde(default)]
        model: Option<String>,
    },
    Error {
        #[serde(alias = "content")]
        message: String,
    },
    Done,
}

const CHAT_EVENT_TYPES: [&str; 5] = ["content", "citations", "metadata", "error", "done"];

#[derive(Debug, Deserialize)]
struct ProgressWire {
    progress: i64,
    #[serde(default)]
    step: String,
    #[serde(default)]
    chunks_processed: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum JobStatusWire {
    #[serde(alias = "queued")]
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Deserialize)]
struct JobSnapshotWire {
    status: JobStatusWire,
    #[serde(default)]
    progress: Option<i64>,
    #[serde(default)]
    step: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnswerWire {
    answer: String,
    #[serde(default)]
    citations: Vec<CitationWire>,
}

#[derive(Debug, Deserialize)]
struct JobAcceptedWire {
    job_id: JobId,
}

/// Strips the `data:` marker. Frames without it are not protocol events.
pub fn frame_payload(frame: &str) -> Option<&str> {
    let payload = frame
        .trim_start_matches(['\r', '\n'].as_ref())
        .strip_prefix(DATA_MARKER)?;
    Some(payload.trim())
}

fn frame_json(frame: &str) -> Option<Value> {
    let Some(payload) = frame_payload(frame) else {
        engine_trace!("Ignoring frame without data marker: {:?}", frame);
        return None;
    };
    match serde_json::from_str(payload) {
        Ok(value) => Some(value),
        Err(err) => {
            engine_warn!("Dropping malformed frame ({}): {:?}", err, payload);
            None
        }
    }
}

pub fn parse_chat_frame(frame: &str) -> Option<ChatEvent> {
    let value = frame_json(frame)?;
    let kind = value.get("type").and_then(Value::as_str);
    match kind {
        Some(kind) if CHAT_EVENT_TYPES.contains(&kind) => {}
        other => {
            engine_debug!("Ignoring chat frame with unknown type {:?}", other);
            return None;
        }
    }

    let wire: ChatWire = match serde_json::from_value(value) {
        Ok(wire) => wire,
        Err(err) => {
            engine_warn!("Dropping chat frame with bad fields: {}", err);
            return None;
        }
    };

    Some(match wire {
        ChatWire::Content { content } => ChatEvent::Content(content),
        ChatWire::Citations { citations } => {
            ChatEvent::Citations(citations.into_iter().map(Citation::from).collect())
        }
        ChatWire::Metadata {
            tokens,
            cost,
            model,
        } => ChatEvent::Metadata(Usage {
            tokens,
            cost,
            model,
        }),
        ChatWire::Error { message } => ChatEvent::Error(message),
        ChatWire::Done => ChatEvent::Done,
    })
}

pub fn parse_ingest_frame(frame: &str) -> Option<IngestEvent> {
    let value = frame_json(frame)?;

    if let Some(message) = value.get("error").and_then(Value::as_str) {
        return Some(IngestEvent::Error(message.to_string()));
    }
    match value.get("type").and_then(Value::as_str) {
        Some("error") => {
            let message = value
                .get("message")
                .or_else(|| value.get("content"))
                .and_then(Value::as_str)
                .unwrap_or("ingestion failed");
            return Some(IngestEvent::Error(message.to_string()));
        }
        Some("done") => return Some(IngestEvent::Done),
        _ => {}
    }
    if value.get("progress").is_none() {
        engine_debug!("Ignoring ingestion frame without progress: {}", value);
        return None;
    }

    let wire: ProgressWire = match serde_json::from_value(value) {
        Ok(wire) => wire,
        Err(err) => {
            engine_warn!("Dropping ingestion frame with bad fields: {}", err);
            return None;
        }
    };
    let percent = clamp_percent(wire.progress)?;
    Some(IngestEvent::Progress(IngestProgress {
        percent,
        step: wire.step,
        chunks_processed: wire.chunks_processed,
    }))
}

/// Values above 100 are clamped; negative values are malformed.
fn clamp_percent(raw: i64) -> Option<u8> {
    if raw < 0 {
        engine_warn!("Dropping negative progress value {}", raw);
        return None;
    }
    if raw > 100 {
        engine_warn!("Clamping progress value {} to 100", raw);
        return Some(100);
    }
    u8::try_from(raw).ok()
}

pub fn parse_job_snapshot(body: &[u8]) -> Result<JobSnapshot, serde_json::Error> {
    let wire: JobSnapshotWire = serde_json::from_slice(body)?;
    let status = match wire.status {
        JobStatusWire::Pending => JobStatus::Pending,
        JobStatusWire::Running => JobStatus::Running,
        JobStatusWire::Completed => JobStatus::Completed,
        JobStatusWire::Failed => JobStatus::Failed,
    };
    let progress = wire.progress.map(|raw| raw.clamp(0, 100) as u8).unwrap_or(0);
    Ok(JobSnapshot {
        step: wire.step,
        error: wire.error,
        ..JobSnapshot::new(status, progress)
    })
}

pub fn parse_answer(body: &[u8]) -> Result<QueryAnswer, serde_json::Error> {
    let wire: AnswerWire = serde_json::from_slice(body)?;
    Ok(QueryAnswer {
        answer: wire.answer,
        citations: wire.citations.into_iter().map(Citation::from).collect(),
    })
}

pub fn parse_job_accepted(body: &[u8]) -> Result<JobId, serde_json::Error> {
    let wire: JobAcceptedWire = serde_json::from_slice(body)?;
    Ok(wire.job_id)
}
