//! Line-oriented terminal output.
//!
//! Answer text goes to `out` as it arrives; progress, notifications and
//! citations go to `err` so the answer can be piped on its own.

use std::io::{self, Write};

use ragstream_core::{AppViewModel, ChatPhase, IngestPhase, Notification, NotificationLevel};

pub struct TerminalRenderer<O: Write, E: Write> {
    out: O,
    err: E,
    chat_generation: u64,
    printed: usize,
    turn_closed: bool,
    ingest_generation: u64,
    last_progress: Option<(u8, String)>,
}

impl<O: Write, E: Write> TerminalRenderer<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self {
            out,
            err,
            chat_generation: 0,
            printed: 0,
            turn_closed: true,
            ingest_generation: 0,
            last_progress: None,
        }
    }

    pub fn render(&mut self, view: &AppViewModel) -> io::Result<()> {
        self.render_chat(view)?;
        self.render_ingest(view)?;
        self.out.flush()?;
        self.err.flush()
    }

    pub fn notify(&mut self, notifications: &[Notification]) -> io::Result<()> {
        for notification in notifications {
            let label = match notification.level {
                NotificationLevel::Info => "info",
                NotificationLevel::Success => "done",
                NotificationLevel::Error => "error",
            };
            writeln!(self.err, "[{label}] {}", notification.text)?;
        }
        self.err.flush()
    }

    pub fn prompt(&mut self) -> io::Result<()> {
        write!(self.err, "> ")?;
        self.err.flush()
    }

    fn render_chat(&mut self, view: &AppViewModel) -> io::Result<()> {
        let chat = &view.chat;
        if chat.generation != self.chat_generation {
            if !self.turn_closed && self.printed > 0 {
                writeln!(self.out)?;
            }
            self.chat_generation = chat.generation;
            self.printed = 0;
            self.turn_closed = false;
        }
        if self.turn_closed {
            return Ok(());
        }
        let Some(reply) = chat.current_reply() else {
            return Ok(());
        };

        // Content is append-only, so the old length is always a char boundary.
        if let Some(suffix) = reply.content.get(self.printed..) {
            if !suffix.is_empty() {
                self.out.write_all(suffix.as_bytes())?;
                self.printed = reply.content.len();
            }
        }

        if chat.phase.is_terminal() {
            self.turn_closed = true;
            if self.printed > 0 {
                writeln!(self.out)?;
            }
            if chat.phase == ChatPhase::Completed {
                for (index, citation) in reply.citations.iter().enumerate() {
                    writeln!(
                        self.err,
                        "  [{}] {} (chunk {})",
                        index + 1,
                        citation.source,
                        citation.chunk_index
                    )?;
                }
                if let Some(usage) = &chat.last_usage {
                    let model = usage.model.as_deref().unwrap_or("unknown model");
                    writeln!(
                        self.err,
                        "  {} tokens, ${:.4}, {}",
                        usage.tokens, usage.cost, model
                    )?;
                }
            }
            if chat.phase == ChatPhase::Cancelled {
                writeln!(self.err, "[cancelled]")?;
            }
        }
        Ok(())
    }

    fn render_ingest(&mut self, view: &AppViewModel) -> io::Result<()> {
        let ingest = &view.ingest;
        if ingest.phase == IngestPhase::Idle {
            return Ok(());
        }
        if ingest.generation != self.ingest_generation {
            self.ingest_generation = ingest.generation;
            self.last_progress = None;
        }

        let progress = (ingest.percent, ingest.status_line.clone());
        if self.last_progress.as_ref() == Some(&progress) {
            return Ok(());
        }
        match &ingest.job_id {
            Some(job_id) => writeln!(
                self.err,
                "[{:>3}%] {} (job {})",
                progress.0, progress.1, job_id
            )?,
            None => writeln!(self.err, "[{:>3}%] {}", progress.0, progress.1)?,
        }
        self.last_progress = Some(progress);
        Ok(())
    }
}
