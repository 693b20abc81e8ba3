//! CLI binary for facesheet.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `GeneratorConfig` / `GoogleConfig` and prints the run log and result.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use facesheet::{
    GenerationProgressCallback, Generator, GeneratorConfig, GoogleConfig, ProgressCallback,
    ProgressEvent, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Prints every run-log line above a spinner that names the current stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Generating");
        bar.set_message("starting…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_stage(&self, stage: Stage) {
        if stage == Stage::Done {
            self.bar.finish_and_clear();
        } else {
            self.bar.set_message(stage.to_string());
        }
    }

    fn on_message(&self, event: &ProgressEvent) {
        self.bar.println(format!("  {}", event.message));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Generate the facesheet for a spreadsheet and publish it
  facesheet generate --sheet 1AbCdEf --identity me@example.org

  # Images live in a per-roster subfolder of the image folder
  facesheet generate --sheet 1AbCdEf --identity me@example.org \
      --image-folder 1ImGs --image-subfolder "Spring 2025"

  # Download photos next to the output instead of linking them
  facesheet generate --sheet 1AbCdEf --identity me@example.org --mirror-images

  # Full result as JSON
  facesheet generate --sheet 1AbCdEf --identity me@example.org --json

  # Spreadsheets in the parent folder, newest first
  facesheet sheets

ENVIRONMENT VARIABLES:
  GOOGLE_ACCESS_TOKEN          OAuth bearer token with Drive + Sheets scopes
  GOOGLE_API_BASE_URL          Send every API call to this base URL instead
  FACESHEET_PARENT_FOLDER      Drive folder receiving PDFs (and holding sheets)
  FACESHEET_IMAGE_FOLDER       Drive folder holding roster photos
  FACESHEET_OUTPUT_DIR         Local directory for HTML/PDF artifacts
  CHROME_PATH                  Browser executable; skips auto-detection

SETTINGS WORKSHEET KEYS:
  PDFSize        A0–A6, Letter, Legal, Tabloid, Ledger   (default A4)
  TopMargin      length with unit in/cm/mm/px             (default 0.5in)
  BottomMargin   length with unit in/cm/mm/px             (default 0.5in)
  Logo           image name of the logo                   (default logo)
"#;

/// Generate roster facesheet PDFs from Google Sheets and Drive.
#[derive(Parser, Debug)]
#[command(
    name = "facesheet",
    version,
    about = "Generate roster facesheet PDFs from Google Sheets and Drive",
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
    /// Generate and publish the facesheet for one spreadsheet.
    Generate(GenerateArgs),
    /// List spreadsheets in the parent folder.
    Sheets {
        /// Output structured JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// OAuth bearer token with Drive and Sheets scopes.
    #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true, global = true)]
    access_token: Option<String>,

    /// Base URL for every Google API call (proxies, local mocks).
    #[arg(long, env = "GOOGLE_API_BASE_URL", global = true)]
    api_base_url: Option<String>,

    /// Drive folder receiving the PDF and holding the spreadsheets.
    #[arg(long, env = "FACESHEET_PARENT_FOLDER", global = true)]
    parent_folder: Option<String>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "FACESHEET_VERBOSE", global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "FACESHEET_QUIET", global = true)]
    quiet: bool,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Spreadsheet id.
    #[arg(long, env = "FACESHEET_SHEET")]
    sheet: String,

    /// Confirmed identity (email) of the person generating.
    #[arg(long, env = "FACESHEET_IDENTITY")]
    identity: String,

    /// Drive folder holding roster photos.
    #[arg(long, env = "FACESHEET_IMAGE_FOLDER")]
    image_folder: Option<String>,

    /// Index this subfolder of the image folder instead.
    #[arg(long, env = "FACESHEET_IMAGE_SUBFOLDER")]
    image_subfolder: Option<String>,

    /// Download photos into <output-dir>/images and link them locally.
    #[arg(long, env = "FACESHEET_MIRROR_IMAGES")]
    mirror_images: bool,

    /// Local directory for HTML/PDF artifacts.
    #[arg(short, long, env = "FACESHEET_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Directory of extra Handlebars templates.
    #[arg(long, env = "FACESHEET_TEMPLATE_DIR")]
    template_dir: Option<PathBuf>,

    /// Template to render.
    #[arg(long, env = "FACESHEET_TEMPLATE", default_value = "facesheet.html")]
    template: String,

    /// Worksheet holding the settings table.
    #[arg(long, default_value = "Settings")]
    settings_worksheet: String,

    /// Worksheet holding the roster.
    #[arg(long, default_value = "People")]
    people_worksheet: String,

    /// Browser executable.
    #[arg(long, env = "CHROME_PATH")]
    chrome: Option<PathBuf>,

    /// Seconds to wait for the page to load.
    #[arg(long, default_value_t = 30)]
    load_timeout: u64,

    /// Image-readiness re-checks before printing anyway.
    #[arg(long, default_value_t = 3)]
    image_retries: u32,

    /// Seconds between image-readiness checks.
    #[arg(long, default_value_t = 10)]
    image_interval: u64,

    /// Output the full GenerationResult as JSON.
    #[arg(long, env = "FACESHEET_JSON")]
    json: bool,

    /// Disable the spinner.
    #[arg(long, env = "FACESHEET_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let json = match &cli.command {
        Command::Generate(args) => args.json,
        Command::Sheets { json } => *json,
    };
    let no_progress = matches!(&cli.command, Command::Generate(args) if args.no_progress);

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner prints the run log itself; keep library INFO logs quiet
    // while it is active.
    let show_progress = !cli.common.quiet && !no_progress && !json;
    let filter = if cli.common.verbose {
        "debug"
    } else if cli.common.quiet || show_progress {
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

    match cli.command {
        Command::Generate(ref args) => run_generate(&cli.common, args, show_progress).await,
        Command::Sheets { json } => run_sheets(&cli.common, json).await,
    }
}

async fn run_generate(common: &CommonArgs, args: &GenerateArgs, show_progress: bool) -> Result<()> {
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn GenerationProgressCallback>)
    } else {
        None
    };
    let config = build_config(common, args, progress)?;
    let generator = Generator::google(config, google_config(common)?)
        .context("Failed to set up generator")?;

    let result = generator.generate(&args.identity, &args.sheet).await;

    if args.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise result")?;
        println!("{json}");
    } else if !common.quiet {
        if !show_progress {
            for line in &result.log {
                eprintln!("  {line}");
            }
        }
        let secs = result.duration.unwrap_or_default();
        match (&result.pdf_link, &result.error) {
            (Some(link), _) => {
                eprintln!("{}  {}  {}", green("✔"), bold(link), dim(&format!("{secs:.1}s")));
                println!("{link}");
            }
            (None, err) => eprintln!(
                "{}  {}  {}",
                red("✘"),
                red(err.as_deref().unwrap_or("generation failed")),
                dim(&format!("{secs:.1}s"))
            ),
        }
    }

    if !result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_sheets(common: &CommonArgs, json: bool) -> Result<()> {
    let parent = common
        .parent_folder
        .clone()
        .context("--parent-folder (or FACESHEET_PARENT_FOLDER) is required")?;
    let config = GeneratorConfig::builder()
        .parent_folder_id(parent)
        .build()
        .context("Invalid configuration")?;
    let generator = Generator::google(config, google_config(common)?)
        .context("Failed to set up generator")?;

    let sheets = generator.list_sheets().await.context("Failed to list sheets")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&sheets).context("Failed to serialise sheets")?
        );
        return Ok(());
    }
    if sheets.is_empty() && !common.quiet {
        eprintln!("No spreadsheets found");
    }
    for sheet in &sheets {
        println!(
            "{:<44}  {:<18}  {}",
            sheet.id,
            dim(&sheet.modified_display()),
            sheet.name
        );
    }
    Ok(())
}

fn google_config(common: &CommonArgs) -> Result<GoogleConfig> {
    let token = common
        .access_token
        .clone()
        .context("--access-token (or GOOGLE_ACCESS_TOKEN) is required")?;
    let mut google = GoogleConfig::new(token);
    if let Some(ref base) = common.api_base_url {
        google = google.with_base_url(base.clone());
    }
    Ok(google)
}

/// Map CLI args to `GeneratorConfig`.
fn build_config(
    common: &CommonArgs,
    args: &GenerateArgs,
    progress: Option<ProgressCallback>,
) -> Result<GeneratorConfig> {
    let parent = common
        .parent_folder
        .clone()
        .context("--parent-folder (or FACESHEET_PARENT_FOLDER) is required")?;

    let mut builder = GeneratorConfig::builder()
        .parent_folder_id(parent)
        .output_dir(&args.output_dir)
        .template_name(&args.template)
        .settings_worksheet(&args.settings_worksheet)
        .people_worksheet(&args.people_worksheet)
        .mirror_images(args.mirror_images)
        .load_timeout_secs(args.load_timeout)
        .image_wait_retries(args.image_retries)
        .image_wait_interval_secs(args.image_interval);

    if let Some(ref folder) = args.image_folder {
        builder = builder.image_folder_id(folder);
    }
    if let Some(ref sub) = args.image_subfolder {
        builder = builder.image_subfolder(sub);
    }
    if let Some(ref dir) = args.template_dir {
        builder = builder.template_dir(dir);
    }
    if let Some(ref chrome) = args.chrome {
        builder = builder.chrome_executable(chrome);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
