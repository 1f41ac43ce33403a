//! emu-migrate - EMu to ReCollect migration tool
//!
//! One subcommand per EMu export, each writing template-shaped batches and a
//! run log into the output directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use emu_migrate::{
    config::AppConfig,
    emu,
    models::{report::NODE_TITLE, AuditLogIndex, NodeReport, TemplateStore},
    services::{
        batch::BatchOptions,
        derivatives::DerivativePool,
        pipeline::{Migration, RunSummary},
        replacer::MultimediaReplacer,
        Services,
    },
};

/// Command-line arguments for emu-migrate
#[derive(Parser, Debug)]
#[command(name = "emu-migrate")]
#[command(about = "Migrate EMu XML exports into ReCollect import batches")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Directory receiving batches, assets and the run log
    #[arg(short, long, default_value = "output", global = true)]
    output: PathBuf,

    /// EMu audit log export to attach per-record change history from
    #[arg(long, global = true, env = "EMU_AUDIT_LOG")]
    audit: Option<PathBuf>,

    /// Batch identifier used in spreadsheet and log names
    #[arg(long, global = true)]
    batch_id: Option<String>,

    /// Extra configuration file layered over config/default.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert catalogue items
    Items {
        /// ecatalogue XML export
        input: PathBuf,
        /// ReCollect accession report used to name item accessions
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Convert series and accessions, merging in accession lots
    Recordsets {
        /// ecatalogue XML export
        input: PathBuf,
        /// eaccessionlots XML export
        #[arg(long)]
        lots: Option<PathBuf>,
    },
    /// Convert people and organisations
    Agents {
        /// eparties XML export
        input: PathBuf,
    },
    /// Convert storage units
    Units {
        /// elocations XML export
        input: PathBuf,
    },
    /// Convert deposit agreements
    Agreements {
        /// emultimedia XML export
        input: PathBuf,
    },
    /// Generate JPEG derivatives for every master image under a folder
    Jpegs {
        /// Folder of tif/dng masters
        source: PathBuf,
    },
    /// Replace undersized multimedia images with fresh derivatives of
    /// their master TIFs
    Replace {
        /// ecatalogue XML export with multimedia references
        input: PathBuf,
        /// Longest side, in pixels, below which an image is replaced
        #[arg(long)]
        min_size: Option<u32>,
    },
    /// Print every record of an export as flat `field: value` lines
    Dump {
        input: PathBuf,
        /// Only print the record with this irn
        #[arg(long)]
        irn: Option<String>,
    },
    /// Check template headers against a base template
    Templates {
        #[arg(long, default_value = "item")]
        base: String,
        /// Templates to check; all of them when omitted
        names: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load(cli.run.config.as_deref()).context("Failed to load configuration")?;
    let batch_id = cli
        .run
        .batch_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

    std::fs::create_dir_all(&cli.run.output)
        .with_context(|| format!("Failed to create {}", cli.run.output.display()))?;
    let _guard = init_logging(&config, &cli.run.output, &batch_id);

    tracing::info!("Starting emu-migrate v{}, batch {}", env!("CARGO_PKG_VERSION"), batch_id);

    match cli.command {
        Command::Jpegs { source } => {
            let services = Services::new(&config.assets);
            let pool = DerivativePool::new(
                services.deriver.clone(),
                config.assets.derivative_dimension,
                config.assets.derivative_workers,
            );
            let summary = pool.run(&source, &cli.run.output).await?;
            if !summary.failed.is_empty() {
                anyhow::bail!("{} derivatives failed", summary.failed.len());
            }
            Ok(())
        }
        Command::Replace { input, min_size } => {
            let min_size = min_size.unwrap_or(config.assets.replace_min_dimension);
            let output = cli.run.output.clone();
            tokio::task::spawn_blocking(move || replace(&config, &input, &output, min_size))
                .await
                .context("Replacement task failed")?
        }
        Command::Dump { input, irn } => dump(&input, irn.as_deref()),
        Command::Templates { base, names } => check_templates(&config, &base, &names),
        command => {
            let summary = tokio::task::spawn_blocking(move || migrate(&config, &cli.run, &batch_id, command))
                .await
                .context("Migration task failed")??;
            for batch in &summary.batches {
                tracing::info!("Wrote {} ({} rows)", batch.sheet.display(), batch.rows);
            }
            Ok(())
        }
    }
}

/// Console plus `<output>/<batch_id>.log` logging. The returned guard
/// flushes the file writer on drop.
fn init_logging(
    config: &AppConfig,
    output: &Path,
    batch_id: &str,
) -> tracing_appender::non_blocking::WorkerGuard {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("emu_migrate={}", config.logging.level).into());

    let file = tracing_appender::rolling::never(output, format!("{}.log", batch_id));
    let (writer, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    guard
}

fn migrate(config: &AppConfig, run: &RunArgs, batch_id: &str, command: Command) -> Result<RunSummary> {
    let services = Services::new(&config.assets);
    let templates = TemplateStore::load(&config.templates)
        .with_context(|| format!("Failed to load templates from {}", config.templates.dir.display()))?;
    let audit = run
        .audit
        .as_deref()
        .map(AuditLogIndex::load)
        .transpose()
        .context("Failed to load audit log")?;

    let mut migration = Migration::new(&services, templates, audit.as_ref(), &run.output)?;
    let options = BatchOptions::new(batch_id);
    let options = match command {
        Command::Items { input, report } => {
            let report = report
                .as_deref()
                .map(NodeReport::load)
                .transpose()
                .context("Failed to load accession report")?;
            migration.items(&read(&input)?, report.as_ref());
            options.sorted_by("Identifier")
        }
        Command::Recordsets { input, lots } => {
            let lots = match lots {
                Some(path) => read(&path)?,
                None => Vec::new(),
            };
            migration.recordsets(&read(&input)?, &lots);
            options.sorted_by("Identifier")
        }
        Command::Agents { input } => {
            migration.agents(&read(&input)?);
            options.sorted_by(NODE_TITLE)
        }
        Command::Units { input } => {
            migration.units(&read(&input)?);
            options.sorted_by(NODE_TITLE)
        }
        Command::Agreements { input } => {
            migration.agreements(&read(&input)?);
            options.sorted_by(NODE_TITLE)
        }
        other => anyhow::bail!("{:?} is not a migration", other),
    };
    Ok(migration.finish(&options)?)
}

fn replace(config: &AppConfig, input: &Path, output: &Path, min_size: u32) -> Result<()> {
    let services = Services::new(&config.assets);
    let replacer = MultimediaReplacer::new(
        services.locator.as_ref(),
        services.deriver.as_ref(),
        config.assets.derivative_dimension,
        min_size,
    );
    let replacements = replacer.run(&read(input)?, output);
    for path in replacements.write(output, services.sink.as_ref())? {
        tracing::info!("Wrote {}", path.display());
    }
    Ok(())
}

fn read(path: &Path) -> Result<Vec<emu::EmuRecord>> {
    let records = emu::read_path(path).with_context(|| format!("Failed to read {}", path.display()))?;
    tracing::info!("Read {} records from {}", records.len(), path.display());
    Ok(records)
}

fn dump(input: &Path, irn: Option<&str>) -> Result<()> {
    for record in read(input)? {
        if irn.is_some() && record.irn() != irn {
            continue;
        }
        for (field, value) in record.flatten() {
            println!("{}: {}", field, value);
        }
        println!();
    }
    Ok(())
}

fn check_templates(config: &AppConfig, base: &str, names: &[String]) -> Result<()> {
    let store = TemplateStore::load(&config.templates)?;
    let base = store.get(base)?;
    let names: Vec<&str> = if names.is_empty() {
        store.names().collect()
    } else {
        names.iter().map(String::as_str).collect()
    };
    let mut problems = 0;
    for name in names {
        let template = store.get(name)?;
        for issue in TemplateStore::compare(base, template) {
            tracing::warn!("{}: {}", name, issue);
            problems += 1;
        }
    }
    tracing::info!("{} header issues found", problems);
    Ok(())
}
