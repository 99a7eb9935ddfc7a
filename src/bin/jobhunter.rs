//! Operator-facing CLI (§6.7): `store init`, `store stats`, `import`,
//! `run`. Wires the typed configuration surface to the core pipeline.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use jobhunter_core::config::{ConfigLoader, LlmProvidersConfig};
use jobhunter_core::error::{Error, Result};
use jobhunter_core::llm::{Provider, ProviderRegistry, ProviderSelection, Purpose};
use jobhunter_core::pipeline::{ImportSource, Pipeline, RunOptions};
use jobhunter_core::prefilter::PreFilter;
use jobhunter_core::store::Store;

#[derive(Parser)]
#[command(name = "jobhunter", about = "Autonomous job-hunting pipeline: ingest, dedupe, score, and route job postings")]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory holding resume.toml, preferences.toml, achievements.toml,
    /// credentials.toml, llm_providers.toml.
    #[arg(long, global = true, default_value = "config")]
    config_dir: PathBuf,

    /// Path to the SQLite database file.
    #[arg(long, global = true, default_value = "jobhunter.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Database schema management and reporting.
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
    /// Import scraped job records from a file or directory.
    Import {
        /// A single JSON file, or a directory to scan with `--glob`.
        path: PathBuf,
        /// Glob pattern used when `path` is a directory.
        #[arg(long, default_value = "*_scraped.json")]
        glob: String,
    },
    /// Run one pipeline invocation (optional import, then scoring).
    Run(RunArgs),
}

#[derive(Subcommand)]
enum StoreAction {
    /// Create the schema at the configured database path.
    Init,
    /// Print aggregate counters for a day.
    Stats {
        /// Date in `YYYY-MM-DD` format; defaults to today.
        #[arg(long)]
        date: Option<String>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Optional source to import before scoring.
    #[arg(long)]
    import: Option<PathBuf>,
    #[arg(long, default_value = "*_scraped.json")]
    glob: String,
    #[arg(long, default_value_t = 5)]
    batch_size: usize,
    #[arg(long)]
    limit: Option<i64>,
    #[arg(long)]
    no_semantic_dedup: bool,
    #[arg(long)]
    no_tier1_resume: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("jobhunter_core={level},jobhunter={level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Store { action } => match action {
            StoreAction::Init => {
                Store::open(&cli.db)?;
                println!("initialized store at {}", cli.db.display());
                Ok(())
            }
            StoreAction::Stats { date } => {
                let store = Store::open(&cli.db)?;
                let date = date.unwrap_or_else(today);
                let stats = store.daily_stats(&date)?;
                println!("{}", serde_json::to_string_pretty(&stats)?);
                Ok(())
            }
        },
        Command::Import { path, glob } => {
            let store = Store::open(&cli.db)?;
            let stats = if path.is_dir() {
                jobhunter_core::importer::import_directory(&store, &path, &glob)?
            } else {
                jobhunter_core::importer::import_file(&store, &path)?
            };
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        Command::Run(args) => run_pipeline(&cli.db, &cli.config_dir, args).await,
    }
}

async fn run_pipeline(db: &PathBuf, config_dir: &PathBuf, args: RunArgs) -> Result<()> {
    let store = Store::open(db)?;
    let loader = ConfigLoader::new(config_dir);

    let config_errors = loader.validate()?;
    if !config_errors.is_empty() {
        return Err(Error::config(format!("configuration invalid: {}", config_errors.join("; "))));
    }

    let preferences = loader.preferences()?;
    let achievements = loader.achievements()?;
    let llm_providers = loader.llm_providers()?;
    let credentials = loader.credentials().ok();

    let registry = build_registry(llm_providers, credentials.map(|c| &c.services))?;
    let prefilter = PreFilter::new(preferences);

    let pipeline = Pipeline::new(&store, &prefilter, &registry, achievements, preferences, None);

    let source = match &args.import {
        Some(path) if path.is_dir() => ImportSource::Directory { dir: path, glob_pattern: &args.glob },
        Some(path) => ImportSource::File(path),
        None => ImportSource::None,
    };

    let options = RunOptions {
        batch_size: args.batch_size,
        limit: args.limit,
        enable_semantic_dedup: !args.no_semantic_dedup,
        enable_tier1_resume: !args.no_tier1_resume,
    };

    let report = pipeline.run(source, options).await?;
    println!("run {} complete: {:?}", report.run_id, report.scoring_stats);
    Ok(())
}

/// Builds a [`ProviderRegistry`] from the `llm_providers.toml` purpose map,
/// resolving each provider's API key from `credentials.toml`'s services
/// table (falling back to the provider's environment variable, e.g.
/// `ANTHROPIC_API_KEY`).
fn build_registry(
    llm_providers: &LlmProvidersConfig,
    services: Option<&HashMap<String, jobhunter_core::config::ServiceCredential>>,
) -> Result<ProviderRegistry> {
    let mut selections = HashMap::new();

    for (purpose_name, entry) in &llm_providers.active {
        let purpose = match purpose_name.as_str() {
            "filter" => Purpose::Filter,
            "tailor" => Purpose::Tailor,
            other => {
                tracing::warn!(purpose = other, "ignoring unknown llm_providers purpose");
                continue;
            }
        };

        let selection = ProviderSelection {
            provider: entry.provider,
            model: entry.model.clone(),
            api_key: api_key_for(entry.provider, services)?,
            base_url: services.and_then(|s| s.get(&provider_key(entry.provider))).and_then(|c| c.url.clone()),
        };

        selections.insert(purpose, selection);
    }

    // `filter` is the purpose every run exercises, so it anchors the fallback
    // deterministically instead of depending on HashMap iteration order.
    let default = selections
        .get(&Purpose::Filter)
        .or_else(|| selections.get(&Purpose::Tailor))
        .cloned()
        .ok_or_else(|| Error::config("llm_providers.toml defines no usable provider"))?;
    Ok(ProviderRegistry::new(selections, default))
}

fn provider_key(provider: Provider) -> String {
    provider.to_string()
}

fn api_key_for(provider: Provider, services: Option<&HashMap<String, jobhunter_core::config::ServiceCredential>>) -> Result<String> {
    let key = provider_key(provider);
    if let Some(cred) = services.and_then(|s| s.get(&key)) {
        if !cred.api_key.is_empty() {
            return Ok(cred.api_key.clone());
        }
    }

    let env_var = format!("{}_API_KEY", key.to_uppercase());
    std::env::var(&env_var).map_err(|_| Error::config(format!("no API key for provider {key}: set credentials.toml services.{key}.api_key or ${env_var}")))
}

fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}
