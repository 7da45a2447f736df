use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use ragstream_core::IngestMode;

use crate::platform::logging::LogDestination;

#[derive(Debug, Parser)]
#[command(name = "ragstream", version, about = "Streaming client for a RAG backend", long_about = None)]
pub struct Cli {
    /// Backend base URL. Overrides RAG_BASE_URL and the config file.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Config file in RON format. Defaults to ./ragstream.ron when present.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Where log output goes.
    #[arg(long, global = true, value_enum, default_value_t = LogDestination::File)]
    pub log: LogDestination,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ask one question and print the answer as it streams in
    Ask {
        question: String,
        #[command(flatten)]
        scope: Scope,
        /// Use the blocking endpoint instead of the stream
        #[arg(long)]
        no_stream: bool,
    },

    /// Interactive session: one question per line, Ctrl-D to quit
    Chat {
        #[command(flatten)]
        scope: Scope,
    },

    /// Ingest a web page or a PDF file
    Ingest {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        scope: Scope,
        #[arg(long, value_enum, default_value_t = ModeArg::Job)]
        mode: ModeArg,
    },

    /// Watch an existing ingestion job
    Job { job_id: String },
}

#[derive(Debug, Clone, Default, Args)]
pub struct Scope {
    #[arg(long)]
    pub domain: Option<String>,
    #[arg(long)]
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Args)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    #[arg(long)]
    pub url: Option<String>,
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Stream,
    Job,
    Sync,
}

impl From<ModeArg> for IngestMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Stream => IngestMode::Stream,
            ModeArg::Job => IngestMode::Job,
            ModeArg::Sync => IngestMode::Sync,
        }
    }
}
