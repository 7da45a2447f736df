//! Ragstream engine: HTTP transport, stream sessions and job polling.
mod chat;
mod engine;
mod frame;
mod ingest;
mod parse;
mod poller;
mod sink;
mod transport;
mod types;

pub use chat::ChatSession;
pub use engine::EngineHandle;
pub use frame::{FrameDecoder, FRAME_DELIMITER};
pub use ingest::{IngestSession, SYNC_DONE_STEP};
pub use parse::{frame_payload, parse_chat_frame, parse_ingest_frame, DATA_MARKER};
pub use poller::{JobPoller, PollSettings, PollerHandle};
pub use sink::{ChannelEventSink, EventSink};
pub use transport::{ByteStream, ClientSettings, RagTransport, ReqwestTransport};
pub use types::{
    ChatOutcome, EngineEvent, IngestEnd, IngestOutcome, PollError, PollOutcome, SessionError,
    StreamEnd, TransportError, ERROR_BODY_LIMIT,
};
