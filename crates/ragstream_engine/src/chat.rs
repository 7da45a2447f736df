use std::sync::Arc;

use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::StreamExt;
use ragstream_core::{validate_query, ChatEvent, Generation, Message, QueryRequest, ReplyStep};
use tokio_util::sync::CancellationToken;

use crate::frame::FrameDecoder;
use crate::parse::parse_chat_frame;
use crate::{ChatOutcome, EngineEvent, EventSink, RagTransport, SessionError, StreamEnd};

/// One chat turn: owns the transport read, the frame decoder and the reply
/// being assembled. Nothing is published once the session is cancelled.
pub struct ChatSession {
    generation: Generation,
    cancel: CancellationToken,
    sink: Arc<dyn EventSink>,
}

impl ChatSession {
    pub fn new(generation: Generation, sink: Arc<dyn EventSink>) -> Self {
        Self::with_cancel(generation, sink, CancellationToken::new())
    }

    pub fn with_cancel(
        generation: Generation,
        sink: Arc<dyn EventSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            generation,
            cancel,
            sink,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Token that aborts the session when cancelled. Safe to cancel repeatedly
    /// or after the session finished.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Streams the answer from the ask-stream endpoint, publishing one event
    /// per parsed frame.
    pub async fn stream(&self, transport: &dyn RagTransport, request: &QueryRequest) -> ChatOutcome {
        let mut reply = Message::assistant();
        if let Err(err) = validate_query(request) {
            return self.fail(reply, err.into());
        }

        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return self.cancelled(reply),
            result = transport.ask_stream(request) => result,
        };
        let mut body = match opened {
            Ok(body) => body,
            Err(err) => return self.fail(reply, err.into()),
        };
        self.publish(EngineEvent::ChatOpened {
            generation: self.generation,
        });

        let mut decoder = FrameDecoder::new();
        loop {
            let chunk = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.cancelled(reply),
                chunk = body.next() => chunk,
            };
            match chunk {
                Some(Ok(bytes)) => {
                    for frame in decoder.push(&bytes) {
                        let Some(event) = parse_chat_frame(&frame) else {
                            continue;
                        };
                        if self.cancel.is_cancelled() {
                            return self.cancelled(reply);
                        }
                        let step = reply.apply_chat_event(&event);
                        if let ReplyStep::ServerError(message) = &step {
                            engine_warn!("Chat {} server error: {}", self.generation, message);
                        }
                        self.publish(EngineEvent::Chat {
                            generation: self.generation,
                            event,
                        });
                        if step == ReplyStep::Done {
                            return self.completed(reply);
                        }
                    }
                }
                Some(Err(err)) => return self.fail(reply, err.into()),
                None => {
                    decoder.finish();
                    return self.completed(reply);
                }
            }
        }
    }

    /// Non-streaming ask. The complete answer is published as a single
    /// content event followed by its citations.
    pub async fn ask_once(&self, transport: &dyn RagTransport, request: &QueryRequest) -> ChatOutcome {
        let mut reply = Message::assistant();
        if let Err(err) = validate_query(request) {
            return self.fail(reply, err.into());
        }

        let answered = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return self.cancelled(reply),
            result = transport.ask(request) => result,
        };
        let answer = match answered {
            Ok(answer) => answer,
            Err(err) => return self.fail(reply, err.into()),
        };
        if self.cancel.is_cancelled() {
            return self.cancelled(reply);
        }

        self.publish(EngineEvent::ChatOpened {
            generation: self.generation,
        });
        for event in [
            ChatEvent::Content(answer.answer),
            ChatEvent::Citations(answer.citations),
        ] {
            reply.apply_chat_event(&event);
            self.publish(EngineEvent::Chat {
                generation: self.generation,
                event,
            });
        }
        self.completed(reply)
    }

    fn publish(&self, event: EngineEvent) {
        if !self.cancel.is_cancelled() {
            self.sink.emit(event);
        }
    }

    fn completed(&self, reply: Message) -> ChatOutcome {
        engine_info!(
            "Chat {} completed ({} chars, {} citations)",
            self.generation,
            reply.content.len(),
            reply.citations.len()
        );
        self.publish(EngineEvent::ChatEnded {
            generation: self.generation,
        });
        ChatOutcome {
            reply,
            end: StreamEnd::Completed,
        }
    }

    fn fail(&self, reply: Message, error: SessionError) -> ChatOutcome {
        engine_warn!("Chat {} failed: {}", self.generation, error);
        self.publish(EngineEvent::ChatFailed {
            generation: self.generation,
            error: error.clone(),
        });
        ChatOutcome {
            reply,
            end: StreamEnd::Failed(error),
        }
    }

    fn cancelled(&self, reply: Message) -> ChatOutcome {
        engine_debug!("Chat {} cancelled", self.generation);
        ChatOutcome {
            reply,
            end: StreamEnd::Cancelled,
        }
    }
}
