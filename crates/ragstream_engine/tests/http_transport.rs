mod support;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use ragstream_core::{Citation, IngestRequest, JobStatus, QueryRequest};
use ragstream_engine::{
    ChatSession, ClientSettings, IngestEnd, IngestSession, RagTransport, ReqwestTransport,
    SessionError, StreamEnd, TransportError,
};
use url::Url;
use serde_json::json;
use support::{frame, TestSink};
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport(server: &MockServer) -> ReqwestTransport {
    let base = Url::parse(&server.uri()).unwrap();
    ReqwestTransport::new(ClientSettings::new(base)).expect("client")
}

#[tokio::test]
async fn ask_stream_end_to_end() {
    let server = MockServer::start().await;
    let body = [
        frame(r#"{"type":"content","content":"X is "}"#),
        frame(r#"{"type":"content","content":"a thing."}"#),
        frame(r#"{"type":"citations","citations":[{"source":"doc1","chunk_index":0}]}"#),
        frame(r#"{"type":"done"}"#),
    ]
    .concat();
    Mock::given(method("POST"))
        .and(path("/rag/ask-stream"))
        .and(header("accept", "text/event-stream"))
        .and(body_json(json!({ "text": "What is X?" })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let sink = TestSink::new();
    let outcome = ChatSession::new(1, Arc::new(sink.clone()))
        .stream(&transport(&server), &QueryRequest::new("What is X?"))
        .await;

    assert_eq!(outcome.end, StreamEnd::Completed);
    assert_eq!(outcome.reply.content, "X is a thing.");
    assert_eq!(outcome.reply.citations, vec![Citation::new("doc1", 0)]);
}

#[tokio::test]
async fn scoped_question_sends_domain_and_topic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rag/ask"))
        .and(body_json(json!({ "text": "q", "domain": "eng", "topic": "rust" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "a",
            "citations": [],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = QueryRequest::new("q").with_scope(Some("eng".into()), Some("rust".into()));
    let answer = transport(&server).ask(&request).await.unwrap();

    assert_eq!(answer.answer, "a");
    assert!(answer.citations.is_empty());
}

#[tokio::test]
async fn server_error_carries_status_and_truncated_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rag/ask-stream"))
        .respond_with(ResponseTemplate::new(500).set_body_string("e".repeat(300)))
        .mount(&server)
        .await;

    let sink = TestSink::new();
    let outcome = ChatSession::new(1, Arc::new(sink.clone()))
        .stream(&transport(&server), &QueryRequest::new("hi"))
        .await;

    assert_eq!(
        outcome.end,
        StreamEnd::Failed(SessionError::Transport(TransportError::HttpStatus {
            status: 500,
            body: "e".repeat(100),
        }))
    );
}

#[tokio::test]
async fn ingest_stream_posts_url_body() {
    let server = MockServer::start().await;
    let body = [
        frame(r#"{"progress":50,"step":"Chunking"}"#),
        frame(r#"{"progress":100,"step":"Done!","chunks_processed":4}"#),
    ]
    .concat();
    Mock::given(method("POST"))
        .and(path("/rag/ingest-stream"))
        .and(body_json(json!({ "url": "https://example.com/a" })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let sink = TestSink::new();
    let outcome = IngestSession::new(1, Arc::new(sink.clone()))
        .stream(&transport(&server), &IngestRequest::url(" https://example.com/a "))
        .await;

    assert_eq!(outcome.end, IngestEnd::Completed);
    assert_eq!(outcome.progress.chunks_processed, Some(4));
}

#[tokio::test]
async fn file_job_uploads_multipart_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rag/ingest-file/job"))
        .and(body_string_contains("name=\"file\"; filename=\"report.pdf\""))
        .and(body_string_contains("%PDF-1.7"))
        .and(body_string_contains("pdf-upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "job_id": "j-42",
            "status": "queued",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = IngestRequest::file("report.pdf", b"%PDF-1.7 body".to_vec());
    let job_id = transport(&server).submit_ingest_job(&request).await.unwrap();

    assert_eq!(job_id, "j-42");
}

#[tokio::test]
async fn job_status_is_fetched_by_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rag/job/j-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "job_id": "j-42",
            "status": "running",
            "progress": 35,
            "step": "Embedding",
        })))
        .mount(&server)
        .await;

    let snapshot = transport(&server).job_status("j-42").await.unwrap();

    assert_eq!(snapshot.status, JobStatus::Running);
    assert_eq!(snapshot.progress, 35);
    assert_eq!(snapshot.status_line(), "Embedding");
}

#[tokio::test]
async fn unparseable_job_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rag/job/x"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = transport(&server).job_status("x").await.unwrap_err();

    assert!(matches!(err, TransportError::Decode(_)));
}
