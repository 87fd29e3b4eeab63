//! CLI binary for mcq-extract.
//!
//! A thin shim over the library crate: maps flags to `ExtractorConfig`, feeds
//! one image through the controller, and prints or copies the questions.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mcq_extract::{
    format_all, resolve_candidate, ExtractionController, ExtractionProgressCallback,
    ExtractionState, ExtractorConfig, McqError, ProgressCallback, SystemClipboard,
};
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const NO_QUESTIONS_MESSAGE: &str = "No questions were found in the image.";

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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner shown while the single extraction call is in flight.
struct CliProgressCallback {
    bar: ProgressBar,
    started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
        })
    }

    fn elapsed(&self) -> String {
        let secs = self
            .started
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        format!("{secs:.1}s")
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_image_selected(&self, name: &str, size_bytes: usize) {
        self.bar.println(format!(
            "{} {}  {}",
            cyan("◆"),
            bold(name),
            dim(&format!("{} KiB", size_bytes.div_ceil(1024)))
        ));
    }

    fn on_extraction_start(&self, name: &str) {
        if let Ok(mut t) = self.started.lock() {
            *t = Some(Instant::now());
        }
        self.bar.set_prefix("Extracting");
        self.bar.set_message(format!("reading questions from {name}…"));
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_extraction_complete(&self, question_count: usize) {
        let elapsed = self.elapsed();
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} questions extracted  {}",
            if question_count == 0 { cyan("⚠") } else { green("✔") },
            bold(&question_count.to_string()),
            dim(&elapsed),
        );
    }

    fn on_extraction_error(&self, error: &str) {
        let elapsed = self.elapsed();
        self.bar.finish_and_clear();

        let msg = if error.chars().count() > 80 {
            let head: String = error.chars().take(79).collect();
            format!("{head}\u{2026}")
        } else {
            error.to_string()
        };
        eprintln!("{} {}  {}", red("✘"), red(&msg), dim(&elapsed));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract and print questions
  mcq-extract worksheet.png

  # Copy everything to the clipboard
  mcq-extract --copy-all worksheet.jpg

  # Copy only the second question
  mcq-extract --copy 2 worksheet.jpg

  # Use a specific provider and model
  mcq-extract --provider openai --model gpt-4.1-mini quiz.webp

  # Extract from a URL and emit JSON
  mcq-extract --json https://example.com/quiz.png > questions.json

OUTPUT FORMAT:
  Each question is followed by a blank line and its options labelled a., b., …
  Questions are separated by one blank line.

PROVIDER SELECTION:
  1. --provider / MCQ_PROVIDER (model defaults to gemini-2.5-flash)
  2. EDGEQUAKE_LLM_PROVIDER + EDGEQUAKE_MODEL
  3. Auto-detection, first match wins:
     OLLAMA_HOST/OLLAMA_MODEL, LMSTUDIO_HOST/LMSTUDIO_MODEL, ANTHROPIC_API_KEY,
     GEMINI_API_KEY/GOOGLE_API_KEY, MISTRAL_API_KEY, AZURE_OPENAI_API_KEY,
     XAI_API_KEY, OPENROUTER_API_KEY, OPENAI_API_KEY
  With none of these set, no request is made and a configuration error is shown.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  OLLAMA_HOST             Local Ollama server
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Override log filter (e.g. mcq_extract=debug)

SETUP:
  1. Set API key:     export GEMINI_API_KEY=...
  2. Extract:         mcq-extract worksheet.png
"#;

/// Extract multiple-choice questions from an image using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "mcq-extract",
    version,
    about = "Extract multiple-choice questions from an image using Vision LLMs",
    long_about = "Send an image of multiple-choice questions (local file or URL) to a Vision \
Language Model and print the questions with lettered options, ready to paste. Supports Google \
Gemini, OpenAI, Anthropic, and any provider edgequake-llm knows about.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local image path or HTTP/HTTPS URL.
    input: String,

    /// LLM model ID (e.g. gemini-2.5-flash, gpt-4.1-mini).
    #[arg(long, env = "MCQ_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, …
    #[arg(
        long,
        env = "MCQ_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          When set without --model, gemini-2.5-flash is used."
    )]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "MCQ_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "MCQ_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Output the extracted questions as JSON.
    #[arg(long, env = "MCQ_JSON")]
    json: bool,

    /// Copy all questions to the clipboard.
    #[arg(long, conflicts_with = "copy")]
    copy_all: bool,

    /// Copy question N (1-indexed) to the clipboard.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    copy: Option<u32>,

    /// Disable the spinner.
    #[arg(long, env = "MCQ_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MCQ_VERBOSE")]
    verbose: bool,

    /// Suppress all output except results and errors.
    #[arg(short, long, env = "MCQ_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "MCQ_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers everything INFO would say.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Transport ────────────────────────────────────────────────────────
    // Refuse to go further without a credential; no request is ever built.
    let mut controller = ExtractionController::from_config(&config);
    if let Some(err) = controller.configuration_error() {
        print_configuration_error(&err);
        std::process::exit(2);
    }

    // ── Select image ─────────────────────────────────────────────────────
    let candidate = resolve_candidate(&cli.input, config.download_timeout_secs)
        .await
        .with_context(|| format!("Failed to load '{}'", cli.input))?;
    let preview_job = controller
        .select_image(Some(candidate))
        .context("Cannot extract from this file")?;

    if cli.verbose {
        if let Some(job) = preview_job {
            let rendered = job.render().await.context("Preview rendering failed")?;
            if let Some((w, h)) = rendered.preview().dimensions {
                tracing::debug!("Preview rendered at {}x{}", w, h);
            }
            controller.apply_preview(rendered);
        }
    }

    // ── Extract ──────────────────────────────────────────────────────────
    let state = controller
        .extract()
        .await
        .context("Extraction could not start")?
        .clone();

    let records = match state {
        ExtractionState::ResultReady(records) => records,
        ExtractionState::ExtractionFailed(failure) => {
            tracing::debug!("Extraction failure detail: {}", failure);
            eprintln!("{}", red(failure.user_message()));
            std::process::exit(1);
        }
        other => anyhow::bail!("Extraction ended in unexpected state {:?}", other),
    };

    // ── Output ───────────────────────────────────────────────────────────
    if cli.json {
        let json = serde_json::to_string_pretty(&records).context("Failed to serialise output")?;
        println!("{json}");
    } else if records.is_empty() {
        if !cli.quiet {
            eprintln!("{}", NO_QUESTIONS_MESSAGE);
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{}", format_all(&records)).context("Failed to write to stdout")?;
    }

    // ── Clipboard ────────────────────────────────────────────────────────
    if cli.copy_all || cli.copy.is_some() {
        let mut clipboard = SystemClipboard::new().context("Clipboard unavailable")?;
        let copied = match cli.copy {
            Some(n) => controller
                .copy_one(&mut clipboard, (n - 1) as usize)
                .map(|_| format!("question {n}")),
            None => controller
                .copy_all(&mut clipboard)
                .map(|_| format!("{} questions", records.len())),
        };
        match copied {
            Ok(what) => {
                if !cli.quiet {
                    eprintln!("{} Copied {} to clipboard", green("✔"), what);
                }
            }
            Err(McqError::NoResults) => {
                if !cli.quiet {
                    eprintln!("{}", dim("Nothing to copy"));
                }
            }
            Err(e) => return Err(e).context("Copy failed"),
        }
    }

    Ok(())
}

/// Map CLI args to `ExtractorConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractorConfig> {
    let mut builder = ExtractorConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_configuration_error(err: &McqError) {
    eprintln!();
    eprintln!("  {}", bold(&red("Configuration Error")));
    eprintln!();
    for line in err.to_string().lines() {
        eprintln!("  {}", line);
    }
    eprintln!();
    eprintln!(
        "  {}",
        dim("The extraction client was not started. Set the credential and run again.")
    );
}
