#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream;
use ragstream_core::{IngestRequest, JobId, JobSnapshot, QueryAnswer, QueryRequest};
use ragstream_engine::{ByteStream, EngineEvent, EventSink, RagTransport, TransportError};
use tokio::sync::mpsc;

#[derive(Default, Clone)]
pub struct TestSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

static LOGGING: Once = Once::new();

impl TestSink {
    pub fn new() -> Self {
        LOGGING.call_once(engine_logging::initialize_for_tests);
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

impl EventSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Byte stream that yields the given chunks and then closes.
pub fn chunked(chunks: Vec<Vec<u8>>) -> ByteStream {
    Box::pin(stream::iter(
        chunks.into_iter().map(|chunk| Ok(Bytes::from(chunk))),
    ))
}

/// Splits `payload` into chunks of `size` bytes.
pub fn split_every(payload: &[u8], size: usize) -> Vec<Vec<u8>> {
    payload.chunks(size).map(<[u8]>::to_vec).collect()
}

/// Byte stream fed by the returned sender; closes when the sender is dropped.
pub fn live_stream() -> (mpsc::UnboundedSender<Result<Bytes, TransportError>>, ByteStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let body = stream::unfold(rx, |mut rx| async move {
        let item = rx.recv().await?;
        Some((item, rx))
    });
    (tx, Box::pin(body))
}

pub fn frame(json: &str) -> String {
    format!("data: {json}\n\n")
}

/// In-memory backend. Each call pops the next scripted response; job status
/// keeps repeating its last scripted snapshot.
#[derive(Default)]
pub struct ScriptedTransport {
    chat_streams: Mutex<VecDeque<Result<ByteStream, TransportError>>>,
    ingest_streams: Mutex<VecDeque<Result<ByteStream, TransportError>>>,
    answers: Mutex<VecDeque<Result<QueryAnswer, TransportError>>>,
    ingests: Mutex<VecDeque<Result<(), TransportError>>>,
    jobs: Mutex<VecDeque<Result<JobId, TransportError>>>,
    statuses: Mutex<VecDeque<Result<JobSnapshot, TransportError>>>,
    status_delay: Mutex<Duration>,
    requests: AtomicUsize,
    status_calls: AtomicUsize,
    status_in_flight: AtomicUsize,
    max_status_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_chat_stream(&self, body: Result<ByteStream, TransportError>) {
        self.chat_streams.lock().unwrap().push_back(body);
    }

    pub fn push_ingest_stream(&self, body: Result<ByteStream, TransportError>) {
        self.ingest_streams.lock().unwrap().push_back(body);
    }

    pub fn push_answer(&self, answer: Result<QueryAnswer, TransportError>) {
        self.answers.lock().unwrap().push_back(answer);
    }

    pub fn push_ingest(&self, result: Result<(), TransportError>) {
        self.ingests.lock().unwrap().push_back(result);
    }

    pub fn push_job(&self, job: Result<JobId, TransportError>) {
        self.jobs.lock().unwrap().push_back(job);
    }

    pub fn push_status(&self, status: Result<JobSnapshot, TransportError>) {
        self.statuses.lock().unwrap().push_back(status);
    }

    /// Calls to every endpoint except job status.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// Every job status call sleeps this long before answering.
    pub fn delay_status(&self, delay: Duration) {
        *self.status_delay.lock().unwrap() = delay;
    }

    /// Largest number of job status calls that were running at once.
    pub fn max_status_in_flight(&self) -> usize {
        self.max_status_in_flight.load(Ordering::SeqCst)
    }

    fn pop<T>(&self, queue: &Mutex<VecDeque<Result<T, TransportError>>>) -> Result<T, TransportError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("nothing scripted".into())))
    }
}

#[async_trait::async_trait]
impl RagTransport for ScriptedTransport {
    async fn ask(&self, _request: &QueryRequest) -> Result<QueryAnswer, TransportError> {
        self.pop(&self.answers)
    }

    async fn ask_stream(&self, _request: &QueryRequest) -> Result<ByteStream, TransportError> {
        self.pop(&self.chat_streams)
    }

    async fn ingest(&self, _request: &IngestRequest) -> Result<(), TransportError> {
        self.pop(&self.ingests)
    }

    async fn ingest_stream(&self, _request: &IngestRequest) -> Result<ByteStream, TransportError> {
        self.pop(&self.ingest_streams)
    }

    async fn submit_ingest_job(&self, _request: &IngestRequest) -> Result<JobId, TransportError> {
        self.pop(&self.jobs)
    }

    async fn job_status(&self, _job_id: &str) -> Result<JobSnapshot, TransportError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let running = self.status_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_status_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = *self.status_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = {
            let mut statuses = self.statuses.lock().unwrap();
            match statuses.len() {
                0 => Err(TransportError::Network("nothing scripted".into())),
                1 => statuses[0].clone(),
                _ => statuses.pop_front().unwrap(),
            }
        };
        self.status_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
