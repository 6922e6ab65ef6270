use crate::{
    config::Config,
    engine::{OcrEngine, pdf::PdfExtractEngine, tesseract::TesseractEngine},
    extract::Extractor,
    server,
    textbook::{SectionIndex, SegmentRule},
    util::ensure_dir,
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "drawing-mentor")]
#[command(about = "Engineering drawing tutor backend (textbook sections + vision LLM + OCR)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./drawing-mentor.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load the textbook and serve the HTTP API.
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
    /// Load the textbook and print the section index status.
    Status {
        /// Segment this plain-text file instead of extracting the configured PDF.
        #[arg(long)]
        text_file: Option<PathBuf>,
    },
    /// Print the textbook section for one problem, e.g. `12-7`, `12.7` or `7`.
    Section {
        problem: String,
        /// Print the full textbook text when the problem has no section.
        #[arg(long)]
        fallback: bool,
        #[arg(long)]
        text_file: Option<PathBuf>,
    },
    /// Extract text from a PDF or image file.
    Extract {
        #[arg(long)]
        input: PathBuf,
    },
    /// Check external tools and configuration.
    Doctor {},
}

pub fn dispatch(args: Args) -> Result<()> {
    if let Ok(path) = dotenvy::dotenv() {
        // logging is not up yet
        eprintln!("loaded environment from {}", path.display());
    }

    let cfg_path = resolve_config_path(args.config.as_deref());
    let mut cfg = match &cfg_path {
        Some(p) => Config::load(p)?,
        None => Config::default(),
    };
    cfg.apply_env();

    let log_path = resolve_log_path(&cfg);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;
    match &cfg_path {
        Some(p) => info!("config: {}", p.display()),
        None => info!("config: built-in defaults"),
    }

    match &args.cmd {
        Command::Serve { bind } => serve(&cfg, bind.as_deref()),
        Command::Status { text_file } => status(&cfg, text_file.as_deref()),
        Command::Section {
            problem,
            fallback,
            text_file,
        } => section(&cfg, problem, *fallback, text_file.as_deref()),
        Command::Extract { input } => extract(&cfg, input),
        Command::Doctor {} => doctor(&cfg),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    ["drawing-mentor.toml", "drawing-mentor.example.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output; logs go to stderr
    let console_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(PathBuf::from("logs").join("drawing-mentor.log"))
}

fn serve(cfg: &Config, bind: Option<&str>) -> Result<()> {
    let bind = bind.unwrap_or(cfg.server.bind.as_str()).to_string();
    let state = server::startup(cfg)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .with_context(|| "building tokio runtime")?;
    runtime.block_on(server::serve(state, &bind))
}

fn load_index(cfg: &Config, text_file: Option<&Path>) -> Result<SectionIndex> {
    let rule = SegmentRule::from_config(&cfg.textbook)?;
    match text_file {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading text file: {}", path.display()))?;
            Ok(SectionIndex::from_text(raw, rule))
        }
        None => Ok(SectionIndex::load(
            Path::new(&cfg.textbook.pdf_path),
            rule,
            &PdfExtractEngine,
        )),
    }
}

fn status(cfg: &Config, text_file: Option<&Path>) -> Result<()> {
    let index = load_index(cfg, text_file)?;
    println!("{}", serde_json::to_string_pretty(&index.status())?);
    Ok(())
}

fn section(cfg: &Config, problem: &str, fallback: bool, text_file: Option<&Path>) -> Result<()> {
    let index = load_index(cfg, text_file)?;
    if !index.is_loaded() {
        return Err(anyhow!("textbook not loaded: {}", cfg.textbook.pdf_path));
    }
    match index.get_section(problem) {
        Some(text) => println!("{text}"),
        None if fallback => {
            warn!("problem {problem} not found; printing full text");
            println!("{}", index.get_full_text());
        }
        None => return Err(anyhow!("problem {problem} not found")),
    }
    Ok(())
}

fn extract(cfg: &Config, input: &Path) -> Result<()> {
    validate_input(input)?;
    let filename = input
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("input has no file name: {}", input.display()))?;
    let bytes =
        std::fs::read(input).with_context(|| format!("reading input: {}", input.display()))?;

    let extractor = Extractor::new(
        cfg,
        Arc::new(PdfExtractEngine),
        Arc::new(TesseractEngine::new(cfg)),
    );
    let extraction = extractor.extract(filename, &bytes)?;
    println!("{}", serde_json::to_string_pretty(&extraction)?);
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    let tesseract = TesseractEngine::new(cfg).doctor()?;
    let rule = SegmentRule::from_config(&cfg.textbook)?;
    let key_present = std::env::var(&cfg.gemini.api_key_env)
        .map(|k| !k.trim().is_empty())
        .unwrap_or(false);

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "tesseract": tesseract,
            "textbook": {
                "pdf_path": cfg.textbook.pdf_path,
                "exists": Path::new(&cfg.textbook.pdf_path).exists(),
                "marker_pattern": rule.marker_pattern(),
                "lead_in_chars": rule.lead_in_chars(),
            },
            "gemini": {
                "model": cfg.gemini.model,
                "api_key_env": cfg.gemini.api_key_env,
                "api_key_present": key_present,
            },
        }))?
    );
    Ok(())
}

fn validate_input(input: &Path) -> Result<()> {
    let input_str = input.display().to_string();

    if looks_like_url(&input_str) {
        return Err(anyhow!("URL inputs are not supported: {input_str}"));
    }

    if !input.exists() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }

    Ok(())
}

fn looks_like_url(s: &str) -> bool {
    let s = s.to_ascii_lowercase();
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with("file://")
}
