use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use catalog_importer::config::Config;
use catalog_importer::constants::DEFAULT_CONFIG_PATH;
use catalog_importer::error::ImportError;
use catalog_importer::importer::{ImportSummary, Importer};
use catalog_importer::storage::{CatalogStore, InMemoryStore, SqliteStore};
use catalog_importer::{logging, metrics};

#[derive(Parser)]
#[command(name = "catalog-importer")]
#[command(about = "Import retailer product feeds into a shared catalog")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// SQLite database file, overrides the config
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Use a throwaway in-memory catalog instead of SQLite
    #[arg(long, global = true)]
    in_memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import one or more feed files
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Force the feed format instead of detecting it from the file name.
        /// Available: store_a, store_b, store_c
        #[arg(long)]
        format: Option<String>,

        /// Print a Prometheus snapshot of the run metrics when done
        #[arg(long)]
        print_metrics: bool,
    },
    /// List known stores
    Stores,
    /// List the items of one store
    Items {
        /// Retailer location id of the store
        location_id: String,
    },
}

fn open_store(cli: &Cli, config: &Config) -> Result<Arc<dyn CatalogStore>> {
    if cli.in_memory {
        return Ok(Arc::new(InMemoryStore::new()));
    }
    let path = cli
        .database
        .clone()
        .unwrap_or_else(|| config.database.path.clone());
    let store = SqliteStore::open(&path, config.database.busy_timeout())
        .with_context(|| format!("opening catalog database {}", path.display()))?;
    info!("Using catalog database {}", path.display());
    Ok(Arc::new(store))
}

fn print_summary(summary: &ImportSummary) {
    println!("\n📊 Import results for {}:", summary.source);
    println!("   Store: {} ({})", summary.location_id, summary.grocer);
    println!("   Products in feed: {}", summary.total_products);
    println!("   Created: {}", summary.created);
    println!("   Updated: {}", summary.updated);
    println!("   Unchanged: {}", summary.unchanged);
    println!("   Failed: {}", summary.failed_upserts);
    println!("   Feed sha256: {}", summary.feed_sha256);
    for failure in &summary.failures {
        println!(
            "   - {} / {}: {}",
            failure.name, failure.manufacturer, failure.error
        );
    }
}

async fn run_import(
    store: Arc<dyn CatalogStore>,
    files: &[PathBuf],
    format: Option<&str>,
) -> Result<bool> {
    // An unknown --format tag surfaces per file as UnsupportedFormat.
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl-C, finishing the current item and stopping");
            signal_token.cancel();
        }
    });

    let importer = Importer::new(store);
    let outcomes = importer.import_files(files, format, &cancel).await;

    let mut all_ok = outcomes.len() == files.len();
    for outcome in &outcomes {
        match &outcome.result {
            Ok(summary) => print_summary(summary),
            Err(ImportError::Cancelled { summary }) => {
                all_ok = false;
                print_summary(summary);
                println!("⚠️  Cancelled with {} product(s) not imported", summary.skipped());
            }
            Err(e) => {
                all_ok = false;
                error!("Import of {} failed: {}", outcome.path.display(), e);
                println!("❌ {}: {}", outcome.path.display(), e);
            }
        }
    }
    Ok(all_ok)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    let _guard = logging::init_logging(&config.logging);
    metrics::init_metrics(config.metrics.prometheus_listen);

    let store = open_store(&cli, &config)?;

    match &cli.command {
        Commands::Import {
            files,
            format,
            print_metrics,
        } => {
            let ok = run_import(store, files, format.as_deref()).await?;
            if *print_metrics {
                if let Some(snapshot) = metrics::render() {
                    println!("\n{}", snapshot);
                }
            }
            if !ok {
                anyhow::bail!("one or more feeds were not fully imported");
            }
        }
        Commands::Stores => {
            for s in store.list_stores().await? {
                println!("{}\t{}\t{}\t{}", s.id, s.location_id, s.grocer, s.created_at);
            }
        }
        Commands::Items { location_id } => {
            let store_record = store
                .find_store(location_id)
                .await?
                .with_context(|| format!("no store with location id '{}'", location_id))?;
            for item in store.list_items(store_record.id).await? {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    item.id, item.name, item.manufacturer, item.price, item.updated_at
                );
            }
        }
    }
    Ok(())
}
