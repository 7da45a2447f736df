//! Ragstream core: domain types, pure folds and the application state machine.
mod effect;
mod fold;
mod msg;
mod state;
mod types;
mod update;
mod validate;
mod view_model;

pub use effect::Effect;
pub use fold::{IngestStep, IngestTracker, ReplyStep};
pub use msg::Msg;
pub use state::{AppState, ChatPhase, IngestPhase, Notification, NotificationLevel};
pub use types::{
    ChatEvent, ChatMode, Citation, Generation, IngestEvent, IngestMode, IngestProgress,
    IngestRequest, IngestSource, JobId, JobSnapshot, JobStatus, Message, QueryAnswer,
    QueryRequest, Role, Usage, DEFAULT_FILE_DOMAIN, DEFAULT_FILE_TOPIC,
};
pub use update::update;
pub use validate::{parse_ingest_url, validate_ingest, validate_job_id, validate_query, ValidationError};
pub use view_model::{AppViewModel, ChatView, IngestView};
