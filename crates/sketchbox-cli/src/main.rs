//! Sketchbox CLI - replay agent tool calls against a virtual project
//!
//! Usage:
//!   sketchbox transcript.jsonl                 Replay a transcript file
//!   sketchbox < transcript.jsonl               Replay from stdin
//!   sketchbox --snapshot-in p.json --snapshot-out p.json transcript.jsonl
//!
//! Each transcript line is one tool-call event:
//!   {"id": "call-1", "tool_name": "str_replace_editor", "phase": "completed",
//!    "args": {"command": "create", "path": "/App.jsx", "file_text": "..."}}

use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use sketchbox::preview::{DocumentSandbox, PreviewStatus};
use sketchbox::{ProjectSession, ProjectSnapshot, SessionConfig, ToolCallEvent, ToolCallPhase};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sketchbox")]
#[command(about = "Replay agent tool calls against a virtual project and render its preview", long_about = None)]
struct Cli {
    /// JSON-lines transcript of tool-call events (reads stdin when omitted)
    transcript: Option<PathBuf>,

    /// Load the project from this snapshot before replaying
    #[arg(long)]
    snapshot_in: Option<PathBuf>,

    /// Write the resulting project snapshot here
    #[arg(long)]
    snapshot_out: Option<PathBuf>,

    /// JSON session configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Entry module to try before the configured entry points
    #[arg(long)]
    entry: Option<String>,

    /// Bound on the undo history
    #[arg(long)]
    history_limit: Option<usize>,

    /// Write the rendered preview document here
    #[arg(long)]
    preview_out: Option<PathBuf>,

    /// Skip rendering the preview
    #[arg(long, default_value_t = false)]
    no_preview: bool,

    /// Print results as JSON lines instead of text
    #[arg(long, default_value_t = false)]
    json: bool,
}

/// One line of JSON output per completed tool call.
#[derive(Serialize)]
struct CallLine<'a> {
    id: &'a str,
    display: String,
    failed: bool,
    result: Option<&'a str>,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

fn open_transcript(path: Option<&Path>) -> anyhow::Result<Box<dyn BufRead>> {
    Ok(match path {
        Some(path) => Box::new(BufReader::new(
            std::fs::File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => {
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .context("failed to read stdin")?;
            Box::new(io::Cursor::new(input))
        }
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    let config: SessionConfig = match &cli.config {
        Some(path) => read_json(path)?,
        None => SessionConfig::default(),
    };
    let mut builder = ProjectSession::builder().config(config);
    if let Some(limit) = cli.history_limit {
        builder = builder.history_limit(limit);
    }
    if let Some(entry) = &cli.entry {
        builder = builder.entry_point(entry.clone());
    }
    if let Some(path) = &cli.snapshot_in {
        let snapshot: ProjectSnapshot = read_json(path)?;
        builder = builder.snapshot(snapshot);
    }
    let mut session = builder.build().context("failed to load snapshot")?;

    let transcript = open_transcript(cli.transcript.as_deref())?;
    let mut failures = 0usize;
    for (idx, line) in transcript.lines().enumerate() {
        let line = line.context("failed to read transcript")?;
        if line.trim().is_empty() {
            continue;
        }
        let event: ToolCallEvent = serde_json::from_str(&line)
            .with_context(|| format!("transcript line {}: invalid tool-call event", idx + 1))?;
        let completed = event.phase == ToolCallPhase::Completed;

        let Some(record) = session.handle(event) else {
            continue;
        };
        if !completed {
            continue;
        }
        if record.failed {
            failures += 1;
        }

        if cli.json {
            let out = CallLine {
                id: &record.id,
                display: record.display_text(),
                failed: record.failed,
                result: record.result_summary.as_deref(),
            };
            println!("{}", serde_json::to_string(&out)?);
        } else {
            let marker = if record.failed { "error" } else { "ok" };
            println!(
                "[{marker}] {}: {}",
                record.display_text(),
                record.result_summary.as_deref().unwrap_or_default()
            );
        }
    }
    tracing::info!(
        calls = session.log().len(),
        failures,
        version = session.version(),
        "transcript replayed"
    );

    if !cli.no_preview {
        let sandbox = DocumentSandbox::new().cdn_url(session.config().preview.cdn_url.clone());
        let state = session.renderer(sandbox).render_once().await;

        if cli.json {
            let summary = serde_json::json!({
                "preview": state.status,
                "version": state.version,
                "error": state.error.as_ref().map(ToString::to_string),
            });
            println!("{summary}");
        } else {
            match (&state.status, &state.error) {
                (PreviewStatus::Failed, Some(error)) => println!("preview failed: {error}"),
                (status, _) => println!("preview {status:?} at version {}", state.version),
            }
        }

        if let (Some(path), Some(output)) = (&cli.preview_out, &state.output) {
            std::fs::write(path, &output.document)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
    }

    if let Some(path) = &cli.snapshot_out {
        let snapshot = serde_json::to_string_pretty(&session.snapshot())?;
        std::fs::write(path, snapshot)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    Ok(())
}
