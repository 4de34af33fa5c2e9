use crate::client::{check_upload, HttpQueryClient, QueryBackend};
use crate::config::{Overrides, Settings};
use crate::logging::{self, LogTarget};
use crate::model::{clock_time, LifecycleEvent, Notification, ProgressStage, Severity};
use crate::orchestrator::{LifecycleController, Settlement, SubmitRejected};
use crate::presenter::render;
use crate::text_summary::build_text_summary;
use crate::uploads::UploadTracker;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "querio",
    version,
    about = "Ask questions of a hybrid SQL + document backend, with optional TUI"
)]
pub struct Cli {
    /// Question to ask. In TUI mode it is submitted on launch
    pub question: Option<String>,

    /// Base URL of the question-answering service [default: http://localhost:8000]
    #[arg(long)]
    pub base_url: Option<String>,

    /// Number of document chunks to retrieve [default: 3]
    #[arg(long)]
    pub top_k: Option<u32>,

    /// Interval between simulated progress steps [default: 800ms]
    #[arg(long)]
    pub tick_interval: Option<humantime::Duration>,

    /// Request timeout (no timeout unless set)
    #[arg(long)]
    pub timeout: Option<humantime::Duration>,

    /// Path to a TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the answer as JSON and exit (no TUI)
    #[arg(long, conflicts_with = "text")]
    pub json: bool,

    /// Print a text rendering of the answer and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Include the raw evidence section in text output
    #[arg(long)]
    pub details: bool,

    /// Upload a document for indexing (.txt, .pdf, .docx, .md; max 10MB). Repeatable
    #[arg(long, value_name = "FILE")]
    pub upload: Vec<PathBuf>,

    /// Clear the server's vector store
    #[arg(long)]
    pub clear_vectors: bool,

    /// Check that the backend is reachable
    #[arg(long)]
    pub health: bool,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl Cli {
    pub fn is_maintenance(&self) -> bool {
        self.health || self.clear_vectors || !self.upload.is_empty()
    }

    /// Whether this invocation prints and exits instead of starting the TUI.
    pub fn is_one_shot(&self) -> bool {
        self.json || self.text || self.is_maintenance() || !cfg!(feature = "tui")
    }

    fn overrides(&self) -> Overrides {
        Overrides {
            base_url: self.base_url.clone(),
            top_k: self.top_k,
            tick_interval: self.tick_interval.map(Into::into),
            request_timeout: self.timeout.map(Into::into),
        }
    }
}

pub async fn run(args: Cli) -> Result<()> {
    if (args.json || args.text) && args.question.is_none() {
        return Err(anyhow::anyhow!(
            "--json and --text need a question, e.g. querio --text \"How many customers?\""
        ));
    }

    let settings = Settings::load(args.config.as_deref(), args.overrides())?;

    let log_target = if args.is_one_shot() {
        LogTarget::Stderr
    } else {
        match logging::default_log_file() {
            Some(p) => LogTarget::File(p),
            None => LogTarget::Stderr,
        }
    };
    logging::init(&args.log_level, log_target)?;
    tracing::debug!(base_url = %settings.base_url, top_k = settings.top_k, "settings resolved");

    if args.is_maintenance() {
        run_maintenance(&args, &settings).await?;
        if args.question.is_none() {
            return Ok(());
        }
    }

    if !args.is_one_shot() {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args, settings).await;
        }
    }

    run_once(&args, &settings).await
}

/// One line for a notification on a plain terminal.
fn notification_line(n: &Notification) -> String {
    match n.severity {
        Severity::Success => format!("✓ {}", n.message),
        Severity::Error => format!("✗ {}", n.message),
    }
}

/// Ask one question, print the answer, exit.
async fn run_once(args: &Cli, settings: &Settings) -> Result<()> {
    let question = args.question.clone().unwrap_or_default();
    let client = HttpQueryClient::new(settings)?;
    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<LifecycleEvent>();

    // Progress and notifications go to stderr so stdout stays clean for piping.
    let show_progress = !args.json;
    let progress_tx = out_tx.clone();
    let printer = tokio::spawn(async move {
        while let Some(ev) = evt_rx.recv().await {
            match ev {
                LifecycleEvent::StageChanged { stage }
                    if show_progress && stage != ProgressStage::Idle =>
                {
                    let _ = progress_tx.send(OutputLine::Stderr(format!(
                        "[{}/4] {}",
                        stage.index(),
                        stage.label()
                    )));
                }
                LifecycleEvent::Notify(n) => {
                    let _ = progress_tx.send(OutputLine::Stderr(notification_line(&n)));
                }
                _ => {}
            }
        }
    });

    let mut controller = LifecycleController::new(settings.tick_interval, evt_tx);
    let settled = controller.submit(&client as &dyn QueryBackend, &question).await;
    let current = controller.current().cloned();
    drop(controller);
    let _ = printer.await;

    let outcome = match settled {
        Err(SubmitRejected::EmptyQuestion) => Err(anyhow::anyhow!("question is empty")),
        Err(e) => Err(e.into()),
        Ok(Settlement::Answered(entry)) => {
            emit_answer(args, &out_tx, &entry.result)?;
            Ok(())
        }
        Ok(Settlement::Malformed(reason)) => {
            if let Some(result) = current.as_ref() {
                emit_answer(args, &out_tx, result)?;
            }
            Err(anyhow::anyhow!("malformed answer: {reason}"))
        }
        Ok(Settlement::Failed(message)) => Err(anyhow::anyhow!("query failed: {message}")),
        Ok(Settlement::Stale) => Err(anyhow::anyhow!("query outcome was lost")),
    };

    drop(out_tx);
    let _ = out_handle.await;
    outcome
}

fn emit_answer(
    args: &Cli,
    out_tx: &mpsc::UnboundedSender<OutputLine>,
    result: &crate::model::AnswerResult,
) -> Result<()> {
    if args.json {
        let out = serde_json::to_string_pretty(result).context("encode answer as JSON")?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    } else {
        let summary = build_text_summary(&render(result), args.details);
        for line in summary.lines {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }
    Ok(())
}

/// Health check, uploads and vector-store clearing, in that order.
async fn run_maintenance(args: &Cli, settings: &Settings) -> Result<()> {
    let client = HttpQueryClient::new(settings)?;
    let (out_tx, out_handle) = spawn_output_writer();
    let notify = |n: Notification| {
        let _ = out_tx.send(OutputLine::Stderr(notification_line(&n)));
    };
    let mut failures = 0usize;

    if args.health {
        match client.health().await {
            Ok(status) => {
                let _ = out_tx.send(OutputLine::Stdout(format!("Backend status: {status}")));
            }
            Err(e) => {
                tracing::warn!(error = %e, "health check failed");
                notify(Notification::error(format!("Backend unreachable: {e}")));
                failures += 1;
            }
        }
    }

    // Reject unsupported or oversized files before anything is sent.
    let mut uploads = Vec::with_capacity(args.upload.len());
    for path in &args.upload {
        match check_upload(path) {
            Ok(()) => uploads.push(path),
            Err(e) => {
                notify(Notification::error(format!(
                    "{}: {}",
                    path.display(),
                    e.user_message()
                )));
                failures += 1;
            }
        }
    }

    let mut tracker = UploadTracker::default();
    for path in uploads {
        match client.upload(path).await {
            Ok(receipt) => {
                notify(Notification::success(format!(
                    "File uploaded successfully: {} ({} chunks indexed)",
                    receipt.filename, receipt.chunks
                )));
                tracker.record(&receipt, clock_time());
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "upload failed");
                notify(Notification::error(format!(
                    "{}: {}",
                    path.display(),
                    e.user_message()
                )));
                failures += 1;
            }
        }
    }
    if !args.upload.is_empty() {
        if tracker.recent().next().is_some() {
            let _ = out_tx.send(OutputLine::Stdout("Recent uploads:".to_string()));
            for line in tracker.recent_lines() {
                let _ = out_tx.send(OutputLine::Stdout(line));
            }
        }
        let _ = out_tx.send(OutputLine::Stdout(tracker.summary_line()));
    }

    if args.clear_vectors {
        match client.clear_vectors().await {
            Ok(()) => notify(Notification::success("Vector store cleared")),
            Err(e) => {
                tracing::warn!(error = %e, "clear vectors failed");
                notify(Notification::error(format!(
                    "Failed to clear vectors: {}",
                    e.user_message()
                )));
                failures += 1;
            }
        }
    }

    drop(out_tx);
    let _ = out_handle.await;
    if failures > 0 {
        anyhow::bail!("{failures} operation(s) failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_one_shot_flags() {
        let cli = Cli::parse_from([
            "querio",
            "--text",
            "--top-k",
            "5",
            "--tick-interval",
            "250ms",
            "How many customers?",
        ]);
        assert!(cli.is_one_shot());
        assert_eq!(cli.question.as_deref(), Some("How many customers?"));
        let o = cli.overrides();
        assert_eq!(o.top_k, Some(5));
        assert_eq!(o.tick_interval, Some(std::time::Duration::from_millis(250)));
    }

    #[test]
    fn json_and_text_conflict() {
        assert!(Cli::try_parse_from(["querio", "--json", "--text", "q"]).is_err());
    }

    #[test]
    fn uploads_are_repeatable_maintenance() {
        let cli = Cli::parse_from(["querio", "--upload", "a.md", "--upload", "b.pdf"]);
        assert_eq!(cli.upload.len(), 2);
        assert!(cli.is_maintenance());
    }

    #[test]
    fn notification_lines() {
        assert_eq!(
            notification_line(&Notification::error("Query failed")),
            "✗ Query failed"
        );
    }
}
