use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use engine_logging::{engine_debug, engine_error};
use futures_util::{Stream, StreamExt};
use ragstream_core::{
    IngestRequest, IngestSource, JobId, JobSnapshot, QueryAnswer, QueryRequest,
};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use url::Url;
use serde::Serialize;

use crate::parse::{parse_answer, parse_job_accepted, parse_job_snapshot};
use crate::TransportError;

/// Raw response body, one item per network read.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: Url,
    pub connect_timeout: Duration,
    /// Applies to non-streaming requests only. Streams end when the server closes them.
    pub request_timeout: Duration,
}

impl ClientSettings {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// The backend contract consumed by sessions and the job poller.
#[async_trait::async_trait]
pub trait RagTransport: Send + Sync {
    async fn ask(&self, request: &QueryRequest) -> Result<QueryAnswer, TransportError>;

    async fn ask_stream(&self, request: &QueryRequest) -> Result<ByteStream, TransportError>;

    /// Synchronous ingestion; resolves once the backend has stored the document.
    async fn ingest(&self, request: &IngestRequest) -> Result<(), TransportError>;

    async fn ingest_stream(&self, request: &IngestRequest) -> Result<ByteStream, TransportError>;

    async fn submit_ingest_job(&self, request: &IngestRequest) -> Result<JobId, TransportError>;

    async fn job_status(&self, job_id: &str) -> Result<JobSnapshot, TransportError>;
}

#[derive(Serialize)]
struct QueryBody<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    domain: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic: Option<&'a str>,
}

#[derive(Serialize)]
struct IngestUrlBody<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    domain: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic: Option<&'a str>,
}

enum Body {
    Json(Vec<u8>),
    Multipart(Form),
    Empty,
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    settings: ClientSettings,
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(settings: ClientSettings) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| TransportError::Network(err.to_string()))?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Appends path segments to the base URL, keeping any prefix it already has.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.settings.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::Endpoint(self.settings.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: reqwest::Method,
        segments: &[&str],
        body: Body,
        streaming: bool,
    ) -> Result<reqwest::Response, TransportError> {
        let url = self.endpoint(segments)?;
        engine_debug!("{} {}", method, url);
        let mut builder = self.client.request(method, url);
        builder = match body {
            Body::Json(bytes) => builder.header(CONTENT_TYPE, "application/json").body(bytes),
            Body::Multipart(form) => builder.multipart(form),
            Body::Empty => builder,
        };
        if streaming {
            builder = builder.header(ACCEPT, "text/event-stream");
        } else {
            builder = builder.timeout(self.settings.request_timeout);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            engine_error!("Backend answered {} for {:?}: {}", status, segments, body);
            return Err(TransportError::http_status(status.as_u16(), &body));
        }
        Ok(response)
    }

    async fn send_json(
        &self,
        method: reqwest::Method,
        segments: &[&str],
        body: Body,
    ) -> Result<Bytes, TransportError> {
        let response = self.send(method, segments, body, false).await?;
        response.bytes().await.map_err(map_reqwest_error)
    }
}

fn json_body<T: Serialize>(value: &T) -> Result<Body, TransportError> {
    serde_json::to_vec(value)
        .map(Body::Json)
        .map_err(|err| TransportError::Decode(err.to_string()))
}

fn query_body(request: &QueryRequest) -> Result<Body, TransportError> {
    json_body(&QueryBody {
        text: &request.text,
        domain: request.domain.as_deref(),
        topic: request.topic.as_deref(),
    })
}

fn ingest_url_body(url: &str, request: &IngestRequest) -> Result<Body, TransportError> {
    json_body(&IngestUrlBody {
        url: url.trim(),
        domain: request.domain.as_deref(),
        topic: request.topic.as_deref(),
    })
}

/// Multipart form with `file`, `source`, `domain` and `topic` fields.
fn upload_form(
    name: &str,
    bytes: &[u8],
    request: &IngestRequest,
) -> Result<Form, TransportError> {
    let part = Part::bytes(bytes.to_vec())
        .file_name(name.to_string())
        .mime_str("application/pdf")
        .map_err(|err| TransportError::Decode(err.to_string()))?;
    Ok(Form::new()
        .part("file", part)
        .text("source", name.to_string())
        .text("domain", request.file_domain().to_string())
        .text("topic", request.file_topic().to_string()))
}

fn into_byte_stream(response: reqwest::Response) -> ByteStream {
    Box::pin(
        response
            .bytes_stream()
            .map(|chunk| chunk.map_err(map_reqwest_error)),
    )
}

fn decode_error(err: serde_json::Error) -> TransportError {
    TransportError::Decode(err.to_string())
}

#[async_trait::async_trait]
impl RagTransport for ReqwestTransport {
    async fn ask(&self, request: &QueryRequest) -> Result<QueryAnswer, TransportError> {
        let body = self
            .send_json(reqwest::Method::POST, &["rag", "ask"], query_body(request)?)
            .await?;
        parse_answer(&body).map_err(decode_error)
    }

    async fn ask_stream(&self, request: &QueryRequest) -> Result<ByteStream, TransportError> {
        let response = self
            .send(
                reqwest::Method::POST,
                &["rag", "ask-stream"],
                query_body(request)?,
                true,
            )
            .await?;
        Ok(into_byte_stream(response))
    }

    async fn ingest(&self, request: &IngestRequest) -> Result<(), TransportError> {
        let (segments, body): (&[&str], Body) = match &request.source {
            IngestSource::Url(url) => (&["rag", "ingest"][..], ingest_url_body(url, request)?),
            IngestSource::File { name, bytes } => (
                &["rag", "ingest-pdf"][..],
                Body::Multipart(upload_form(name, bytes, request)?),
            ),
        };
        self.send_json(reqwest::Method::POST, segments, body).await?;
        Ok(())
    }

    async fn ingest_stream(&self, request: &IngestRequest) -> Result<ByteStream, TransportError> {
        let (segments, body): (&[&str], Body) = match &request.source {
            IngestSource::Url(url) => (&["rag", "ingest-stream"][..], ingest_url_body(url, request)?),
            IngestSource::File { name, bytes } => (
                &["rag", "ingest-pdf-stream"][..],
                Body::Multipart(upload_form(name, bytes, request)?),
            ),
        };
        let response = self
            .send(reqwest::Method::POST, segments, body, true)
            .await?;
        Ok(into_byte_stream(response))
    }

    async fn submit_ingest_job(&self, request: &IngestRequest) -> Result<JobId, TransportError> {
        let (segments, body): (&[&str], Body) = match &request.source {
            IngestSource::Url(url) => (&["rag", "ingest", "job"][..], ingest_url_body(url, request)?),
            IngestSource::File { name, bytes } => (
                &["rag", "ingest-file", "job"][..],
                Body::Multipart(upload_form(name, bytes, request)?),
            ),
        };
        let body = self.send_json(reqwest::Method::POST, segments, body).await?;
        parse_job_accepted(&body).map_err(decode_error)
    }

    async fn job_status(&self, job_id: &str) -> Result<JobSnapshot, TransportError> {
        let body = self
            .send_json(reqwest::Method::GET, &["rag", "job", job_id], Body::Empty)
            .await?;
        parse_job_snapshot(&body).map_err(decode_error)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout;
    }
    TransportError::Network(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> ReqwestTransport {
        ReqwestTransport::new(ClientSettings::new(Url::parse(base).unwrap())).unwrap()
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let t = transport("http://localhost:8000/api/");
        assert_eq!(
            t.endpoint(&["rag", "ask-stream"]).unwrap().as_str(),
            "http://localhost:8000/api/rag/ask-stream"
        );
        let t = transport("http://localhost:8000");
        assert_eq!(
            t.endpoint(&["rag", "job", "a/b"]).unwrap().as_str(),
            "http://localhost:8000/rag/job/a%2Fb"
        );
    }

    #[test]
    fn query_body_omits_missing_scope() {
        let Body::Json(bytes) = query_body(&QueryRequest::new("What is X?")).unwrap() else {
            panic!("expected json body");
        };
        assert_eq!(bytes, br#"{"text":"What is X?"}"#);
    }

    #[test]
    fn http_status_body_is_truncated() {
        let err = TransportError::http_status(500, &"x".repeat(500));
        match err {
            TransportError::HttpStatus { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body.len(), 100);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
