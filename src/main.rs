use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use shoplake::{
    aggregate, dedup_policy, ingest_all, init_lake, init_sources, init_tracing, list_partitions,
    normalize_all, render_partitions, RunContext,
};
use shoplake_config::{RuntimeConfig, StorageBackend};
use shoplake_core::{MartKind, TableSpec};
use std::path::PathBuf;
use tracing::info;

/// Layered batch pipeline over a partitioned Parquet lake
#[derive(Parser)]
#[command(name = "shoplake")]
#[command(version)]
#[command(about = "Layered batch pipeline over a partitioned Parquet lake", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Lake root directory (filesystem backend only)
    #[arg(short, long, value_name = "DIR", global = true)]
    lake: Option<PathBuf>,

    /// Directory holding the source tables
    #[arg(short, long, value_name = "DIR", global = true)]
    source: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy source tables into new raw partitions
    Ingest {
        /// Ingest only this table
        #[arg(long, value_name = "TABLE")]
        table: Option<String>,
    },
    /// Rebuild staging snapshots from raw partitions
    Normalize {
        /// Normalize only this table
        #[arg(long, value_name = "TABLE")]
        table: Option<String>,
    },
    /// Build curated marts from staging snapshots
    Aggregate {
        /// Build only this mart
        #[arg(long, value_name = "MART")]
        mart: Option<String>,
    },
    /// Print the raw partitions of a table
    Partitions {
        /// Table name
        table: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // CLI flags override file and environment; validate only once they are in
    let mut config = match &cli.config {
        Some(config_path) => RuntimeConfig::layered(Some(config_path.as_path()))
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?,
        None => RuntimeConfig::layered(None).context("Failed to load configuration")?,
    };
    apply_cli_overrides(&mut config, &cli)?;
    config.validate().context("Invalid configuration")?;

    init_tracing(&config);

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(run(cli.command, config))
}

fn apply_cli_overrides(config: &mut RuntimeConfig, cli: &Cli) -> Result<()> {
    if let Some(lake) = &cli.lake {
        if config.storage.backend != StorageBackend::Fs {
            bail!(
                "--lake only works with the filesystem backend, but backend is '{}'",
                config.storage.backend
            );
        }
        let fs_config = config.storage.fs.get_or_insert_with(Default::default);
        fs_config.path = lake.to_string_lossy().to_string();
    }

    if let Some(source) = &cli.source {
        config.source.path = source.to_string_lossy().to_string();
    }

    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    Ok(())
}

async fn run(command: Commands, config: RuntimeConfig) -> Result<()> {
    let lake = init_lake(&config)?;

    match command {
        Commands::Ingest { table } => {
            let sources = init_sources(&config)?;
            let tables = match table {
                Some(name) => vec![config
                    .source_for(&name)
                    .cloned()
                    .with_context(|| format!("No source configured for table '{}'", name))?],
                None => config.sources.clone(),
            };

            let ctx = RunContext::new();
            info!(run_id = %ctx.run_id, tables = tables.len(), "Starting ingestion");
            let report = ingest_all(&lake, &sources, &tables, &ctx).await;
            if !report.is_success() {
                bail!(
                    "{} of {} sources failed to ingest",
                    report.failed.len(),
                    tables.len()
                );
            }
        }
        Commands::Normalize { table } => {
            let specs: Vec<&'static TableSpec> = match table {
                Some(name) => vec![TableSpec::by_name(&name)?],
                None => TableSpec::all().iter().collect(),
            };
            let policy = dedup_policy(&config);
            info!(tables = specs.len(), dedup_policy = %policy, "Starting normalization");

            let report = normalize_all(&lake, &specs, policy).await;
            if !report.is_success() {
                bail!("{} of {} tables failed to normalize", report.failed.len(), specs.len());
            }
            // A single named table with nothing to normalize is an error
            if specs.len() == 1 && report.written.is_empty() {
                bail!("No raw data for table '{}'", specs[0].name);
            }
        }
        Commands::Aggregate { mart } => {
            let marts: Vec<MartKind> = match mart {
                Some(name) => vec![name.parse::<MartKind>()?],
                None => MartKind::all().to_vec(),
            };
            info!(marts = marts.len(), "Starting aggregation");

            let report = aggregate(&lake, &marts, config.pipeline.mirror_csv).await;
            if !report.is_success() {
                bail!("{} of {} marts failed", report.failed.len(), marts.len());
            }
        }
        Commands::Partitions { table } => {
            let entries = list_partitions(&lake, &table).await?;
            print!("{}", render_partitions(&entries));
        }
    }

    Ok(())
}
