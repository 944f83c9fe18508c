//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use pharmai_core::assembler::{self, load_collection, to_json_bytes};
use pharmai_core::context::{ContextOptions, format_context};
use pharmai_core::pipeline::{BatchConfig, BatchReport, ProgressReporter, process_path};
use pharmai_core::retrieval::{fragments_from_collection, fragments_from_record};
use pharmai_shared::{
    AppConfig, BatchDefaults, Collection, RetrievedFragment, init_config, load_config,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// PharmAI: structure drug label text for retrieval.
#[derive(Parser)]
#[command(
    name = "pharmai",
    version,
    about = "Extract structured sections from drug label text and prepare them for retrieval.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Extract sections from a .txt file or a directory of them.
    Extract {
        /// Input file or directory.
        input: PathBuf,

        /// Output directory (defaults to extraction.output_dir).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Maximum documents to process from a directory (0 = all).
        #[arg(short, long)]
        limit: Option<usize>,

        /// Documents extracted concurrently.
        #[arg(short, long)]
        concurrency: Option<usize>,
    },

    /// Export retrieval fragments from an extracted collection.
    Fragments {
        /// Collection or single-record JSON file.
        collection: PathBuf,

        /// Write fragments to this file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Render ranked search results as a context block.
    Context {
        /// JSON array of retrieved fragments, best first.
        results: PathBuf,

        /// Maximum fragments rendered.
        #[arg(long)]
        max_fragments: Option<usize>,

        /// Maximum characters per fragment.
        #[arg(long)]
        max_chars: Option<usize>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "pharmai=info",
        1 => "pharmai=debug",
        _ => "pharmai=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Extract {
            input,
            out,
            limit,
            concurrency,
        } => cmd_extract(input, out, limit, concurrency).await,
        Command::Fragments { collection, out } => cmd_fragments(&collection, out.as_deref()),
        Command::Context {
            results,
            max_fragments,
            max_chars,
        } => cmd_context(&results, max_fragments, max_chars),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

/// Merge CLI flags over config file values.
fn batch_config(
    config: &AppConfig,
    input: PathBuf,
    out: Option<PathBuf>,
    limit: Option<usize>,
    concurrency: Option<usize>,
) -> BatchConfig {
    let mut batch = BatchConfig::new(input, &BatchDefaults::from(config));
    if let Some(out) = out {
        batch.output_dir = out;
    }
    if let Some(limit) = limit {
        batch.limit = limit;
    }
    if let Some(concurrency) = concurrency {
        batch.concurrency = concurrency;
    }
    batch
}

async fn cmd_extract(
    input: PathBuf,
    out: Option<PathBuf>,
    limit: Option<usize>,
    concurrency: Option<usize>,
) -> Result<()> {
    let config = load_config()?;
    let batch = batch_config(&config, input, out, limit, concurrency);

    info!(
        input = %batch.input.display(),
        output_dir = %batch.output_dir.display(),
        "extracting"
    );

    let reporter = CliProgress::new();
    let report = process_path(&batch, &reporter).await?;

    println!();
    println!("  Extraction finished");
    println!("  Processed: {}", report.processed);
    println!("  Failed:    {}", report.failed.len());
    for name in &report.failed {
        println!("    - {name}: {}", report.statuses[name]);
    }
    println!("  Output:    {}", report.artifact.path.display());
    println!("  SHA-256:   {}", report.artifact.sha256);
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_fragments(collection_path: &Path, out: Option<&Path>) -> Result<()> {
    let collection = load_collection(collection_path)?;
    let fragments = match &collection {
        Collection::Single(record) => {
            let stem = collection_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            fragments_from_record(&stem, record)
        }
        Collection::Batch(_) => fragments_from_collection(&collection),
    };

    info!(count = fragments.len(), "fragments exported");

    match out {
        Some(path) => {
            let meta = assembler::write_json_atomic(path, &fragments)?;
            println!("Wrote {} fragments to {}", fragments.len(), meta.path.display());
        }
        None => {
            let bytes = to_json_bytes(&fragments)?;
            print!("{}", String::from_utf8_lossy(&bytes));
        }
    }
    Ok(())
}

fn cmd_context(
    results_path: &Path,
    max_fragments: Option<usize>,
    max_chars: Option<usize>,
) -> Result<()> {
    let config = load_config()?;
    let mut options = ContextOptions::from(&config.retrieval);
    if let Some(n) = max_fragments {
        options.max_fragments = n;
    }
    if let Some(n) = max_chars {
        options.max_fragment_chars = n;
    }

    let content = std::fs::read_to_string(results_path)
        .map_err(|e| eyre!("cannot read {}: {e}", results_path.display()))?;
    let results: Vec<RetrievedFragment> = serde_json::from_str(&content)?;

    println!("{}", format_context(&results, &options));
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn started(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn document_done(&self, name: &str, ok: bool, current: usize, _total: usize) {
        self.bar.set_position(current as u64);
        if ok {
            self.bar.set_message(name.to_string());
        } else {
            self.bar.set_message(format!("{name} (failed)"));
        }
    }

    fn done(&self, _report: &BatchReport) {
        self.bar.finish_and_clear();
    }
}
