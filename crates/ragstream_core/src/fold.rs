//! Pure folds shared by the state machine and the engine sessions.

use crate::{ChatEvent, IngestEvent, IngestProgress, Message, Usage};

/// What applying one chat event did to the reply under construction.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyStep {
    /// Content or citations changed.
    Changed,
    /// Nothing visible changed.
    Unchanged,
    /// Side-channel usage report; the reply itself is untouched.
    Usage(Usage),
    /// In-band error from the server. Non-fatal for chat.
    ServerError(String),
    Done,
}

impl Message {
    /// Folds one event into an assistant reply.
    ///
    /// Content is append-only; citations are replaced wholesale by the latest
    /// `Citations` event.
    pub fn apply_chat_event(&mut self, event: &ChatEvent) -> ReplyStep {
        match event {
            ChatEvent::Content(text) if text.is_empty() => ReplyStep::Unchanged,
            ChatEvent::Content(text) => {
                self.content.push_str(text);
                ReplyStep::Changed
            }
            ChatEvent::Citations(citations) => {
                self.citations = citations.clone();
                ReplyStep::Changed
            }
            ChatEvent::Metadata(usage) => ReplyStep::Usage(usage.clone()),
            ChatEvent::Error(message) => ReplyStep::ServerError(message.clone()),
            ChatEvent::Done => ReplyStep::Done,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestStep {
    Progressed,
    Completed,
    Failed(String),
}

/// Latest known progress of one streamed ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IngestTracker {
    pub percent: u8,
    pub step: String,
    pub chunks_processed: Option<u64>,
}

impl IngestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest value wins, including decreases. 100 percent completes the run
    /// before any other handling.
    pub fn apply(&mut self, event: &IngestEvent) -> IngestStep {
        match event {
            IngestEvent::Progress(IngestProgress {
                percent,
                step,
                chunks_processed,
            }) => {
                self.percent = *percent;
                self.step = step.clone();
                if chunks_processed.is_some() {
                    self.chunks_processed = *chunks_processed;
                }
                if *percent >= 100 {
                    IngestStep::Completed
                } else {
                    IngestStep::Progressed
                }
            }
            IngestEvent::Done => {
                self.percent = 100;
                IngestStep::Completed
            }
            IngestEvent::Error(message) => IngestStep::Failed(message.clone()),
        }
    }

    pub fn completion_text(&self) -> String {
        match self.chunks_processed {
            Some(chunks) => format!("Ingestion completed: processed {chunks} chunks"),
            None => "Ingestion completed".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Citation;

    #[test]
    fn content_appends_and_citations_replace() {
        let mut reply = Message::assistant();
        reply.apply_chat_event(&ChatEvent::Content("X is ".into()));
        reply.apply_chat_event(&ChatEvent::Citations(vec![Citation::new("a", 1)]));
        reply.apply_chat_event(&ChatEvent::Content("a thing.".into()));
        reply.apply_chat_event(&ChatEvent::Citations(vec![Citation::new("b", 2)]));

        assert_eq!(reply.content, "X is a thing.");
        assert_eq!(reply.citations, vec![Citation::new("b", 2)]);
    }

    #[test]
    fn metadata_does_not_touch_reply() {
        let mut reply = Message::assistant();
        reply.apply_chat_event(&ChatEvent::Content("hi".into()));
        let before = reply.clone();
        let step = reply.apply_chat_event(&ChatEvent::Metadata(Usage {
            tokens: 12,
            cost: 0.001,
            model: None,
        }));
        assert!(matches!(step, ReplyStep::Usage(_)));
        assert_eq!(reply, before);
    }

    #[test]
    fn hundred_percent_completes_without_done_tag() {
        let mut tracker = IngestTracker::new();
        let step = tracker.apply(&IngestEvent::Progress(IngestProgress {
            percent: 100,
            step: "x".into(),
            chunks_processed: None,
        }));
        assert_eq!(step, IngestStep::Completed);
    }

    #[test]
    fn progress_decrease_is_passed_through() {
        let mut tracker = IngestTracker::new();
        for percent in [50, 30] {
            tracker.apply(&IngestEvent::Progress(IngestProgress {
                percent,
                step: format!("at {percent}"),
                chunks_processed: None,
            }));
        }
        assert_eq!(tracker.percent, 30);
        assert_eq!(tracker.step, "at 30");
    }
}
