//! CLI binary for formfill.
//!
//! Runs the HTTP server, or drives the pipeline once from the command line.
//! A thin shim that maps flags onto `FormFillConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use formfill::{
    fill_pdf, serve, AppState, FormFillConfig, FormFiller, FormFields, OcrEngineKind, ServerConfig,
};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the backend for the web frontend
  formfill serve --port 8000

  # OCR + extraction on a single file, JSON to stdout
  formfill extract passport.jpg > fields.json

  # Fill a template with (edited) fields
  formfill fill --fields fields.json --template application.pdf -o out/

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  GEMINI_MODEL_ID         Gemini model ID (default gemini-2.0-flash)
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama, …)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Directory containing libpdfium
  RUST_LOG                Log filter, overrides --verbose / --quiet
"#;

/// Extract form fields from scanned documents and fill PDF forms.
#[derive(Parser, Debug)]
#[command(
    name = "formfill",
    version,
    about = "Extract form fields from scanned documents and fill PDF forms",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server.
    Serve(ServeArgs),
    /// OCR a file and print the extracted fields as JSON.
    Extract(ExtractArgs),
    /// Write fields onto a PDF template or a summary page.
    Fill(FillArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// LLM model ID (e.g. gemini-2.0-flash, gpt-4.1-nano).
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Directory for uploads and generated PDFs.
    #[arg(long, global = true, env = "FORMFILL_UPLOADS_DIR", default_value = "uploads")]
    uploads_dir: PathBuf,

    /// OCR engine.
    #[arg(long, global = true, env = "FORMFILL_OCR_ENGINE", value_enum, default_value = "tesseract")]
    ocr_engine: OcrEngineArg,

    /// Tesseract language code(s), e.g. `eng` or `eng+deu`.
    #[arg(long, global = true, env = "FORMFILL_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Tesseract executable.
    #[arg(long, global = true, env = "FORMFILL_TESSERACT_CMD", default_value = "tesseract")]
    tesseract_cmd: String,

    /// PDF rasterisation DPI for OCR (72–600).
    #[arg(long, global = true, env = "FORMFILL_OCR_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// LLM temperature (0.0–2.0).
    #[arg(long, global = true, env = "FORMFILL_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, global = true, env = "FORMFILL_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// Retries on LLM failure.
    #[arg(long, global = true, env = "FORMFILL_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Per-request LLM timeout in seconds.
    #[arg(long, global = true, env = "FORMFILL_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "FORMFILL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "FORMFILL_QUIET")]
    quiet: bool,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to bind.
    #[arg(long, env = "FORMFILL_HOST", default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port to bind.
    #[arg(short, long, env = "FORMFILL_PORT", default_value_t = 8000)]
    port: u16,

    /// Allowed CORS origins, comma-separated.
    #[arg(
        long,
        env = "FORMFILL_CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:3000,http://127.0.0.1:3000"
    )]
    cors_origins: Vec<String>,

    /// Request body limit in megabytes.
    #[arg(long, env = "FORMFILL_MAX_UPLOAD_MB", default_value_t = 25)]
    max_upload_mb: usize,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Image or PDF to read.
    input: PathBuf,

    /// Write JSON here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct FillArgs {
    /// JSON file with the fields (an `extract` result or a bare field object).
    #[arg(long)]
    fields: PathBuf,

    /// PDF template to fill. Without it a summary PDF is written.
    #[arg(long)]
    template: Option<PathBuf>,

    /// Output directory. Defaults to the uploads directory.
    #[arg(short, long)]
    out_dir: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OcrEngineArg {
    Tesseract,
    Vision,
}

impl From<OcrEngineArg> for OcrEngineKind {
    fn from(v: OcrEngineArg) -> Self {
        match v {
            OcrEngineArg::Tesseract => OcrEngineKind::Tesseract,
            OcrEngineArg::Vision => OcrEngineKind::Vision,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = if cli.common.verbose {
        "debug"
    } else if cli.common.quiet {
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

    let config = build_config(&cli.common)?;

    match cli.command {
        Command::Serve(args) => run_serve(config, args).await,
        Command::Extract(args) => run_extract(config, args).await,
        Command::Fill(args) => run_fill(config, args, cli.common.quiet).await,
    }
}

/// Map CLI args to `FormFillConfig`.
fn build_config(common: &CommonArgs) -> Result<FormFillConfig> {
    let mut builder = FormFillConfig::builder()
        .uploads_dir(&common.uploads_dir)
        .ocr_engine(common.ocr_engine.into())
        .ocr_language(&common.ocr_lang)
        .tesseract_cmd(&common.tesseract_cmd)
        .ocr_dpi(common.dpi)
        .temperature(common.temperature)
        .max_tokens(common.max_tokens)
        .max_retries(common.max_retries);

    if let Some(ref model) = common.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = common.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(secs) = common.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }

    builder.build().context("Invalid configuration")
}

async fn run_serve(config: FormFillConfig, args: ServeArgs) -> Result<()> {
    let filler = FormFiller::from_config(config).context("Failed to initialise pipeline")?;
    let server = ServerConfig {
        bind: SocketAddr::new(args.host, args.port),
        cors_origins: args.cors_origins,
        max_upload_bytes: args.max_upload_mb.saturating_mul(1024 * 1024),
    };
    serve(AppState::new(filler), &server)
        .await
        .with_context(|| format!("Server on {} failed", server.bind))
}

async fn run_extract(config: FormFillConfig, args: ExtractArgs) -> Result<()> {
    let filler = FormFiller::from_config(config).context("Failed to initialise pipeline")?;
    let extracted = filler
        .extract_file(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let json = serde_json::to_string_pretty(&extracted).context("Failed to serialise fields")?;
    match args.output {
        Some(path) => tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

async fn run_fill(config: FormFillConfig, args: FillArgs, quiet: bool) -> Result<()> {
    let fields = read_fields(&args.fields).await?;
    let out_dir = args.out_dir.unwrap_or(config.uploads_dir);
    let path = fill_pdf(&fields, &out_dir, args.template.as_deref())
        .await
        .context("Fill failed")?;

    if !quiet {
        eprintln!("✔  {}", path.display());
    }
    Ok(())
}

/// Accept a bare field object, an `extract` result, or a `/process` response.
async fn read_fields(path: &Path) -> Result<FormFields> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut value: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("{} is not JSON", path.display()))?;
    if let Some(inner) = value.get_mut("fields").filter(|v| v.is_object()) {
        value = inner.take();
    }
    serde_json::from_value(value).with_context(|| format!("{} has no usable fields", path.display()))
}
