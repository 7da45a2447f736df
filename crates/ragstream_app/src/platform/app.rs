use std::io::{self, BufRead};
use std::path::Path;
use std::process::ExitCode;
use std::sync::{mpsc, Arc};
use std::thread;

use anyhow::Context;
use engine_logging::{engine_debug, engine_info};
use ragstream_core::{
    update, AppState, ChatMode, ChatPhase, IngestPhase, IngestRequest, Msg, QueryRequest,
};
use ragstream_engine::ReqwestTransport;

use super::config::{AppConfig, ConfigSources, BASE_URL_ENV};
use super::effects::{EffectRunner, Input};
use super::logging;
use super::render::TerminalRenderer;
use crate::cli::{Cli, Command, Scope, SourceArgs};

/// Which part of the state decides when the process is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunKind {
    Chat,
    Ingest,
    Interactive,
}

pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::initialize(cli.log);

    let config = AppConfig::resolve(&ConfigSources {
        file: cli.config.clone(),
        env_base_url: std::env::var(BASE_URL_ENV).ok(),
        cli_base_url: cli.base_url.clone(),
    })?;
    engine_info!("Using backend {}", config.base_url);

    let transport = ReqwestTransport::new(config.client_settings())
        .context("failed to build the HTTP client")?;
    let (input_tx, input_rx) = mpsc::channel::<Input>();
    let runner = EffectRunner::new(Arc::new(transport), config.poll_settings(), input_tx.clone());

    let (kind, first) = match cli.command {
        Command::Ask {
            question,
            scope,
            no_stream,
        } => {
            let mode = if no_stream {
                ChatMode::Once
            } else {
                ChatMode::Stream
            };
            (
                RunKind::Chat,
                Some(Msg::ChatSubmitted {
                    request: query(question, &scope),
                    mode,
                }),
            )
        }
        Command::Chat { scope } => {
            spawn_stdin_reader(scope, input_tx);
            (RunKind::Interactive, None)
        }
        Command::Ingest {
            source,
            scope,
            mode,
        } => (
            RunKind::Ingest,
            Some(Msg::IngestSubmitted {
                request: ingest_request(&source, &scope)?,
                mode: mode.into(),
            }),
        ),
        Command::Job { job_id } => (RunKind::Ingest, Some(Msg::JobWatchRequested(job_id))),
    };

    let mut app = App {
        state: AppState::new(),
        renderer: TerminalRenderer::new(io::stdout(), io::stderr()),
        runner,
        kind,
        input_closed: false,
    };
    if let Some(msg) = first {
        app.dispatch(msg)?;
    } else {
        app.renderer.prompt()?;
    }

    while !app.finished() {
        let Ok(input) = input_rx.recv() else {
            break;
        };
        match input {
            Input::Msg(msg) => app.dispatch(msg)?,
            Input::Interrupted => app.interrupt()?,
            Input::EndOfInput => app.input_closed = true,
        }
    }

    Ok(app.exit_code())
}

struct App {
    state: AppState,
    renderer: TerminalRenderer<io::Stdout, io::Stderr>,
    runner: EffectRunner,
    kind: RunKind,
    input_closed: bool,
}

impl App {
    fn dispatch(&mut self, msg: Msg) -> io::Result<()> {
        let was_active = self.state.chat_phase().is_active();
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        self.runner.enqueue(effects);

        let notifications = state.take_notifications();
        if state.consume_dirty() {
            self.renderer.render(&state.view())?;
        }
        self.renderer.notify(&notifications)?;
        let turn_ended = was_active && !state.chat_phase().is_active();
        self.state = state;

        if self.kind == RunKind::Interactive && turn_ended && !self.input_closed {
            self.renderer.prompt()?;
        }
        Ok(())
    }

    /// Ctrl-C cancels whatever is running. With nothing running it ends an
    /// interactive session.
    fn interrupt(&mut self) -> io::Result<()> {
        let chat_active = self.state.chat_phase().is_active();
        let ingest_active = self.state.ingest_phase().is_active();
        if !chat_active && !ingest_active {
            engine_debug!("Interrupt with nothing running");
            self.input_closed = true;
            return Ok(());
        }
        if chat_active {
            self.dispatch(Msg::ChatCancelRequested)?;
        }
        if ingest_active {
            self.dispatch(Msg::IngestCancelRequested)?;
        }
        Ok(())
    }

    fn finished(&self) -> bool {
        match self.kind {
            RunKind::Chat => !self.state.chat_phase().is_active(),
            RunKind::Ingest => !self.state.ingest_phase().is_active(),
            RunKind::Interactive => self.input_closed && !self.state.chat_phase().is_active(),
        }
    }

    fn exit_code(&self) -> ExitCode {
        let ok = match self.kind {
            RunKind::Chat => self.state.chat_phase() == ChatPhase::Completed,
            RunKind::Ingest => self.state.ingest_phase() == IngestPhase::Completed,
            RunKind::Interactive => true,
        };
        if ok {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

fn query(text: String, scope: &Scope) -> QueryRequest {
    QueryRequest::new(text).with_scope(scope.domain.clone(), scope.topic.clone())
}

fn ingest_request(source: &SourceArgs, scope: &Scope) -> anyhow::Result<IngestRequest> {
    let request = match (&source.url, &source.file) {
        (Some(url), _) => IngestRequest::url(url.clone()),
        (None, Some(path)) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            IngestRequest::file(file_name(path), bytes)
        }
        (None, None) => anyhow::bail!("either --url or --file is required"),
    };
    Ok(request.with_scope(scope.domain.clone(), scope.topic.clone()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// One question per non-blank line. A new line supersedes a running turn.
fn spawn_stdin_reader(scope: Scope, input_tx: mpsc::Sender<Input>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            let msg = Msg::ChatSubmitted {
                request: query(line, &scope),
                mode: ChatMode::Stream,
            };
            if input_tx.send(Input::Msg(msg)).is_err() {
                return;
            }
        }
        let _ = input_tx.send(Input::EndOfInput);
    });
}
