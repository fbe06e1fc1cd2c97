//! CLI binary for edgequake-ocr.
//!
//! A thin shim over the library crate that maps CLI flags to `OcrConfig`,
//! runs a batch and prints or saves the results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_ocr::{
    read_cards_stream, recognize_stream, Artifact, CallStats, CardOutput, ContactRecord,
    DetailLevel, Language, OcrConfig, OcrProgressCallback, OutputFormat, ProgressCallback,
    TextOutput,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per image.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-image wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Reading");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl OcrProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.reset_eta();
    }

    fn on_image_start(&self, index: usize, _total: usize, name: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_image_complete(&self, index: usize, total: usize, name: &str) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index,
            total,
            name,
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        // First line only; the hint follows on the next line.
        let first_line = error.lines().next().unwrap_or_default();
        let msg: String = if first_line.chars().count() > 80 {
            first_line.chars().take(79).chain(['\u{2026}']).collect()
        } else {
            first_line.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            red("✗"),
            index,
            total,
            name,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let failed = total.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} image(s) read successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} image(s) read  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Transcribe an image (stdout)
  eqocr receipt.jpg

  # Japanese, as Markdown with a summary, saved to ./out/receipt.md
  eqocr --language japanese --format markdown --detail summary receipt.jpg -o out

  # Business cards → vCard + CSV + JSON in ./contacts
  eqocr --mode card --export vcard --export csv --export json card1.jpg card2.png -o contacts

  # Image from a URL
  eqocr https://example.com/scan.png

  # Any edgequake-llm provider instead of Gemini
  eqocr --provider openai --model gpt-4.1-mini notes.png

SUPPORTED IMAGES:
  JPG, JPEG, PNG, GIF, BMP, WEBP, TIFF up to 20 MB. Images are flattened
  onto white and downscaled to 1920 px on the long side before upload.

ENVIRONMENT VARIABLES:
  EQOCR_API_KEY       Gemini API key for this run
  GEMINI_API_KEY      Gemini API key (fallback)
  GOOGLE_API_KEY      Gemini API key (second fallback)
  EQOCR_PROVIDER      edgequake-llm provider (openai, anthropic, ollama, …)
  EQOCR_MODEL         Model ID (default: gemini-2.0-flash)
  RUST_LOG            Log filter, overrides --verbose/--quiet
"#;

/// Read text and business cards from images using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "eqocr",
    version,
    about = "Read text and business cards from images using Vision LLMs",
    long_about = "Send images (local files or URLs) to a multimodal model and get back a \
transcription, or structured contact data from business cards exported as vCard, CSV or JSON. \
Uses Google Gemini directly, or any edgequake-llm provider.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image file paths or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Free-text OCR or business-card extraction.
    #[arg(short, long, env = "EQOCR_MODE", value_enum, default_value = "text")]
    mode: ModeArg,

    /// Write result files to this directory instead of stdout.
    #[arg(short, long, env = "EQOCR_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Files to produce in card mode (repeatable).
    #[arg(long, value_enum, default_values_t = [ExportArg::Json])]
    export: Vec<ExportArg>,

    /// Gemini API key used for this run only.
    #[arg(long, env = "EQOCR_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model ID.
    #[arg(long, env = "EQOCR_MODEL", default_value = edgequake_ocr::config::DEFAULT_MODEL)]
    model: String,

    /// edgequake-llm provider name; uses Gemini REST when unset.
    #[arg(long, env = "EQOCR_PROVIDER")]
    provider: Option<String>,

    /// Language the text is written in.
    #[arg(long, env = "EQOCR_LANGUAGE", value_enum, default_value = "auto")]
    language: LanguageArg,

    /// Transcription layout (text mode).
    #[arg(long, env = "EQOCR_FORMAT", value_enum, default_value = "plain")]
    format: FormatArg,

    /// Append a summary after the transcription (text mode).
    #[arg(long, env = "EQOCR_DETAIL", value_enum, default_value = "exact")]
    detail: DetailArg,

    /// Max model output tokens per image.
    #[arg(long, env = "EQOCR_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Model temperature (0.0–2.0).
    #[arg(long, env = "EQOCR_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries after a rate-limit response.
    #[arg(long, env = "EQOCR_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// First backoff delay in milliseconds (doubles per retry).
    #[arg(long, env = "EQOCR_RETRY_DELAY_MS", default_value_t = 2000)]
    retry_delay_ms: u64,

    /// Longest image side sent to the model, in pixels.
    #[arg(long, env = "EQOCR_MAX_DIMENSION", default_value_t = 1920,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_dimension: u32,

    /// Per-image model call timeout in seconds.
    #[arg(long, env = "EQOCR_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "EQOCR_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print full results (image info, token stats) as JSON.
    #[arg(long, env = "EQOCR_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "EQOCR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "EQOCR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "EQOCR_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ModeArg {
    Text,
    Card,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ExportArg {
    Vcard,
    Csv,
    Json,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LanguageArg {
    Auto,
    Japanese,
    English,
    Chinese,
    Korean,
}

impl From<LanguageArg> for Language {
    fn from(v: LanguageArg) -> Self {
        match v {
            LanguageArg::Auto => Language::Auto,
            LanguageArg::Japanese => Language::Japanese,
            LanguageArg::English => Language::English,
            LanguageArg::Chinese => Language::Chinese,
            LanguageArg::Korean => Language::Korean,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Plain,
    Markdown,
    Table,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Plain => OutputFormat::Plain,
            FormatArg::Markdown => OutputFormat::Markdown,
            FormatArg::Table => OutputFormat::Table,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum DetailArg {
    Exact,
    Summary,
}

impl From<DetailArg> for DetailLevel {
    fn from(v: DetailArg) -> Self {
        match v {
            DetailArg::Exact => DetailLevel::Exact,
            DetailArg::Summary => DetailLevel::Summary,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the per-image feedback, so library INFO logs
    // are hidden while it is shown.
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
        Some(CliProgressCallback::new() as Arc<dyn OcrProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;
    let total = cli.inputs.len();

    let succeeded = match cli.mode {
        ModeArg::Text => run_text(&cli, &config).await?,
        ModeArg::Card => run_cards(&cli, &config).await?,
    };

    if !cli.quiet && !show_progress {
        eprintln!("Read {}/{} image(s)", succeeded, total);
    }
    if succeeded == 0 {
        anyhow::bail!("All {} image(s) failed", total);
    }
    Ok(())
}

/// Map CLI args to `OcrConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<OcrConfig> {
    let mut builder = OcrConfig::builder()
        .model(cli.model.clone())
        .language(cli.language.into())
        .output_format(cli.format.into())
        .detail(cli.detail.into())
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .retry_initial_delay_ms(cli.retry_delay_ms)
        .max_dimension(cli.max_dimension)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.trim());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn run_text(cli: &Cli, config: &OcrConfig) -> Result<usize> {
    let mut results = recognize_stream(cli.inputs.clone(), config)
        .context("Could not start recognition")?;
    let markdown = !matches!(cli.format, FormatArg::Plain);
    let mut names = OutputNames::default();
    let mut succeeded = 0;

    while let Some(item) = results.next().await {
        let output: TextOutput = match item {
            Ok(o) => o,
            Err(e) => {
                report_failure(cli, &e);
                continue;
            }
        };
        succeeded += 1;

        if let Some(ref dir) = cli.output_dir {
            let stem = names.claim(&output.image.file_name);
            let artifact = Artifact::text(&stem, &output.text, markdown);
            let path = artifact.write_to(dir).await?;
            log_written(cli, &path);
        } else if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?
            );
        } else {
            write_stdout(&output.text)?;
        }

        log_stats(cli, &output.stats);
    }
    Ok(succeeded)
}

async fn run_cards(cli: &Cli, config: &OcrConfig) -> Result<usize> {
    let mut results =
        read_cards_stream(cli.inputs.clone(), config).context("Could not start extraction")?;
    let mut records: Vec<ContactRecord> = Vec::new();
    let mut names = OutputNames::default();

    while let Some(item) = results.next().await {
        let output: CardOutput = match item {
            Ok(o) => o,
            Err(e) => {
                report_failure(cli, &e);
                continue;
            }
        };

        if let Some(ref dir) = cli.output_dir {
            let stem = names.claim(&output.image.file_name);
            for export in &cli.export {
                let artifact = match export {
                    ExportArg::Vcard => Artifact::vcard(&stem, &output.record),
                    ExportArg::Json => Artifact::json(&stem, &output.record)?,
                    // one combined file for the whole batch, written below
                    ExportArg::Csv => continue,
                };
                let path = artifact.write_to(dir).await?;
                log_written(cli, &path);
            }
        } else if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?
            );
        } else {
            write_stdout(&edgequake_ocr::to_json(&output.record)?)?;
        }

        log_stats(cli, &output.stats);
        records.push(output.record);
    }

    if let Some(ref dir) = cli.output_dir {
        if cli.export.contains(&ExportArg::Csv) && !records.is_empty() {
            let path = Artifact::csv("contacts", &records)?.write_to(dir).await?;
            log_written(cli, &path);
        }
    }
    Ok(records.len())
}

/// Print a failure when the progress bar is not already showing it.
fn report_failure(cli: &Cli, e: &edgequake_ocr::OcrError) {
    if cli.no_progress || cli.json || cli.quiet {
        eprintln!("{} {}", red("✗"), e);
    }
}

fn log_written(cli: &Cli, path: &Path) {
    if !cli.quiet {
        eprintln!("  {} {}", dim("→"), bold(&path.display().to_string()));
    }
}

fn log_stats(cli: &Cli, stats: &CallStats) {
    if cli.verbose {
        eprintln!(
            "   {} tokens in  /  {} tokens out  —  {}ms, {} retries",
            dim(&stats.input_tokens.to_string()),
            dim(&stats.output_tokens.to_string()),
            stats.duration_ms,
            stats.retries,
        );
    }
}

fn write_stdout(text: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

/// File name without its extension, for naming result files.
fn stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".to_string())
}

/// Result-file stems handed out during one run.
///
/// `a/card.jpg`, `b/card.jpg` and `card.png` all share the stem `card`; later
/// ones get `card_2`, `card_3`, … so no result replaces an earlier one.
#[derive(Debug, Default)]
struct OutputNames {
    used: HashSet<String>,
}

impl OutputNames {
    fn claim(&mut self, file_name: &str) -> String {
        let base = stem(file_name);
        let mut candidate = base.clone();
        let mut n = 2;
        while !self.used.insert(candidate.clone()) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        candidate
    }
}
