//! CLI binary for edgequake-pdf2office.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, renders the task stream as a progress bar and writes
//! the artifact next to the requested output directory.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2office::pipeline::{deliver, input};
use edgequake_pdf2office::{
    AdvisoryNotifier, Assistant, ConversionConfig, ConversionOutput, ConversionStats,
    LlmAdvisor, Orchestrator, OutputKind, Pdf2OfficeError, TaskFailure, TaskState,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

const EXPLAIN_QUESTION: &str = "Why did my conversion fail, and what can I do to fix it?";

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract tables into an Excel workbook (./invoice_converted.xlsx)
  pdf2office invoice.pdf

  # Convert to a Word document in another directory
  pdf2office --format doc report.pdf -o out/

  # Convert from URL with a specific model
  pdf2office --model gemini-2.5-pro https://example.com/rates.pdf

  # Ask the assistant to explain a failure
  pdf2office --explain scanned.pdf

  # Ask a standalone question
  pdf2office --ask "How do I get better results from scanned tables?"

  # JSON summary for scripting
  pdf2office --json statement.pdf > result.json

OUTPUT:
  The artifact is named "{stem}_converted.{ext}" where stem is the input
  file name without its .pdf extension, and ext is xlsx or doc.

FAILURE KINDS:
  InvalidInput           empty, non-PDF or oversized input (no API call made)
  EmptyResponse          the model returned no text
  DataParsingError       the model's answer was not a JSON array of rows
  EngineCriticalFailure  extraction, decoding or encoding failed or timed out
  SystemOffline          no provider could be reached, or the input was unreadable

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (preferred)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
"#;

/// Convert PDF files and URLs to Excel or Word using multimodal LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2office",
    version,
    about = "Convert PDF files and URLs to Excel or Word using multimodal LLMs",
    long_about = "Convert PDF documents (local files or URLs) to an Excel workbook or a Word \
document. The whole PDF is sent to a multimodal LLM which extracts its rows or its text; the \
answer is validated and written as .xlsx or .doc.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    #[arg(required_unless_present = "ask")]
    input: Option<String>,

    /// Output format: xlsx (excel) or doc (word).
    #[arg(short, long, env = "PDF2OFFICE_FORMAT", default_value = "xlsx")]
    format: OutputKind,

    /// Directory to write the converted file into.
    #[arg(short, long, env = "PDF2OFFICE_OUTPUT_DIR", default_value = ".")]
    output: PathBuf,

    /// LLM model ID (e.g. gemini-2.5-flash, gpt-4.1-mini).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          The provider must accept PDF attachments (Gemini does natively)."
    )]
    provider: Option<String>,

    /// Max LLM output tokens for the extraction call.
    #[arg(long, env = "PDF2OFFICE_MAX_TOKENS", default_value_t = 16384)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2OFFICE_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Extraction call timeout in seconds.
    #[arg(long, env = "PDF2OFFICE_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2OFFICE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Output a JSON summary instead of human-readable text.
    #[arg(long, env = "PDF2OFFICE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2OFFICE_NO_PROGRESS")]
    no_progress: bool,

    /// On failure, ask the assistant to explain what went wrong.
    #[arg(long)]
    explain: bool,

    /// Ask the assistant a question (no conversion unless INPUT is given).
    #[arg(long, value_name = "QUESTION")]
    ask: Option<String>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2OFFICE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2OFFICE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar provides all the feedback that matters, so library
    // INFO logs are suppressed while it is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && cli.input.is_some();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let (notifier, advisory_rx) = AdvisoryNotifier::channel();
    let mut assistant = Assistant::new(Arc::new(LlmAdvisor::new(config.clone())), advisory_rx);

    let Some(ref input_str) = cli.input else {
        // `--ask` without an input: a single question, no conversion.
        if let Some(ref question) = cli.ask {
            print_answer(&mut assistant, question, cli.json).await?;
        }
        return Ok(());
    };

    // ── Resolve input ────────────────────────────────────────────────────
    let document = match input::resolve_input(input_str, config.download_timeout_secs).await {
        Ok(doc) => doc,
        Err(e) => {
            if let Some(kind) = e.failure_kind() {
                notifier.notify_error(kind, e.to_string());
            }
            report_error(&e, cli.json);
            if cli.explain {
                print_answer(&mut assistant, EXPLAIN_QUESTION, cli.json).await?;
            }
            return Err(e).context("Failed to read input");
        }
    };

    // ── Run the task ─────────────────────────────────────────────────────
    let started = Instant::now();
    let input_bytes = document.len();
    let orchestrator = Orchestrator::new(config.clone()).with_notifier(notifier);
    let mut updates = orchestrator.start(document, cli.format);

    let bar = show_progress.then(new_progress_bar);
    let mut outcome = Err(Pdf2OfficeError::Superseded);
    while let Some(update) = updates.next().await {
        if let Some(ref bar) = bar {
            bar.set_position(update.progress_percent.round() as u64);
            bar.set_prefix(state_label(update.state));
            bar.set_message(update.phase_label);
        }
        match update.state {
            TaskState::Ready => {
                outcome = update.artifact.ok_or_else(|| {
                    Pdf2OfficeError::Internal("ready task carried no artifact".into())
                });
                break;
            }
            TaskState::Failed => {
                outcome = Err(match update.failure {
                    Some(failure) => Pdf2OfficeError::Task(failure),
                    None => Pdf2OfficeError::Internal("failed task carried no failure".into()),
                });
                break;
            }
            _ => {}
        }
    }
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    let artifact = match outcome {
        Ok(artifact) => artifact,
        Err(e) => {
            report_error(&e, cli.json);
            if cli.explain {
                print_answer(&mut assistant, EXPLAIN_QUESTION, cli.json).await?;
            }
            return Err(e).context("Conversion failed");
        }
    };

    // ── Deliver ──────────────────────────────────────────────────────────
    let path = deliver::write_artifact(&artifact, &cli.output)?;
    let output = ConversionOutput {
        stats: ConversionStats {
            input_bytes,
            output_bytes: artifact.len(),
            record_count: artifact.record_count,
            column_count: artifact.column_count,
            total_duration_ms: started.elapsed().as_millis() as u64,
        },
        artifact: (*artifact).clone(),
    };

    if cli.json {
        let summary = serde_json::json!({
            "path": path,
            "artifact": output.artifact,
            "stats": output.stats,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise output")?
        );
    } else if !cli.quiet {
        let shape = match (output.stats.record_count, output.stats.column_count) {
            (Some(rows), Some(cols)) => format!("{rows} rows × {cols} columns"),
            _ => format!("{} bytes", output.stats.output_bytes),
        };
        eprintln!(
            "{}  {}  {}ms  →  {}",
            green("✔"),
            shape,
            output.stats.total_duration_ms,
            bold(&path.display().to_string()),
        );
    }

    if let Some(ref question) = cli.ask {
        print_answer(&mut assistant, question, cli.json).await?;
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .extraction_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }

    builder.build().context("Invalid configuration")
}

fn new_progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold:>10}  [{bar:42.green/238}] {pos:>3}%  \
         ⏱ {elapsed_precise}  {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(TICKS);

    bar.set_style(style);
    bar.set_prefix("Preparing");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn state_label(state: TaskState) -> &'static str {
    match state {
        TaskState::Idle => "Preparing",
        TaskState::Uploading => "Uploading",
        TaskState::Extracting => "Extracting",
        TaskState::Decoding => "Decoding",
        TaskState::Encoding => "Encoding",
        TaskState::Ready => "Done",
        TaskState::Failed => "Failed",
    }
}

/// Print a failure with its classification and raw detail.
fn report_error(error: &Pdf2OfficeError, json: bool) {
    let failure = match error {
        Pdf2OfficeError::Task(f) => f.clone(),
        other => match other.failure_kind() {
            Some(kind) => TaskFailure::new(kind, other.to_string()),
            None => return,
        },
    };

    if json {
        if let Ok(s) = serde_json::to_string_pretty(&serde_json::json!({ "failure": failure })) {
            println!("{s}");
        }
        return;
    }

    eprintln!("{} {}  {}", red("✘"), bold(failure.kind.as_str()), failure.message);
    if let Some(ref detail) = failure.detail {
        eprintln!("   {}", dim(detail));
    }
}

async fn print_answer(assistant: &mut Assistant, question: &str, json: bool) -> Result<()> {
    let Some(answer) = assistant.ask(question).await else {
        anyhow::bail!("The question is empty");
    };
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "question": question,
                "answer": answer,
            }))
            .context("Failed to serialise answer")?
        );
    } else {
        eprintln!("{} {}", cyan("◆"), bold("Assistant"));
        println!("{answer}");
    }
    Ok(())
}
