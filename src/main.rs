use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tracing::{error, info};

use address_importer::config::{ImporterConfig, Projection};
use address_importer::dedupe::{DedupeOracle, HttpDedupeOracle};
use address_importer::interpolation::Interpolator;
use address_importer::pipeline::{ImportPipeline, ImportSummary, JsonLinesSink, OutputFormat, SourceSet};
use address_importer::sources::{OpenAddressesAdapter, OsmAdapter, SourceAdapter, SourceKind, TigerAdapter};
use address_importer::{logging, metrics, readers};

#[derive(Parser)]
#[command(name = "address-importer")]
#[command(about = "Import, interpolate and deduplicate address datasets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import one or more datasets through the deduplication oracle
    Import(ImportArgs),
}

#[derive(Args)]
struct ImportArgs {
    /// OpenAddresses CSV file or directory
    #[arg(long)]
    openaddresses: Option<PathBuf>,
    /// OSM nodes as newline-delimited JSON, file or directory
    #[arg(long)]
    osm: Option<PathBuf>,
    /// TIGER address edges as newline-delimited GeoJSON, file or directory
    #[arg(long)]
    tiger: Option<PathBuf>,
    /// TOML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Output file, or `-` for stdout
    #[arg(long, short, default_value = "-")]
    output: String,
    /// `address` or `document`
    #[arg(long, default_value = "address")]
    format: OutputFormat,
    /// Overrides `[osm] projection` from the config file
    #[arg(long)]
    osm_projection: Option<Projection>,
}

fn build_sources(args: &ImportArgs, config: &ImporterConfig) -> anyhow::Result<SourceSet> {
    let mut sources = SourceSet::new();

    if let Some(path) = &args.openaddresses {
        let rows = readers::openaddresses_rows(path).with_context(|| source_error(SourceKind::OpenAddresses, path))?;
        sources.insert(SourceKind::OpenAddresses, OpenAddressesAdapter.address_stream(rows));
    }
    if let Some(path) = &args.osm {
        let nodes = readers::osm_nodes(path).with_context(|| source_error(SourceKind::Osm, path))?;
        let projection = args.osm_projection.unwrap_or(config.osm.projection);
        sources.insert(SourceKind::Osm, OsmAdapter::new(projection).address_stream(nodes));
    }
    if let Some(path) = &args.tiger {
        let features = readers::tiger_features(path).with_context(|| source_error(SourceKind::Tiger, path))?;
        let adapter = TigerAdapter::new(Interpolator::new(config.interpolation.offset_degrees));
        sources.insert(SourceKind::Tiger, adapter.address_stream(features));
    }

    if sources.is_empty() {
        bail!("No sources given; pass at least one of --openaddresses, --osm, --tiger");
    }
    Ok(sources)
}

fn source_error(kind: SourceKind, path: &Path) -> String {
    format!("Failed to open {} dataset at {}", kind, path.display())
}

async fn import_into<W>(
    pipeline: &ImportPipeline,
    sources: SourceSet,
    writer: W,
    format: OutputFormat,
) -> anyhow::Result<ImportSummary>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut sink = JsonLinesSink::new(writer, format);
    Ok(pipeline.run(sources, &mut sink).await?)
}

async fn run_import(args: ImportArgs) -> anyhow::Result<()> {
    let config = ImporterConfig::load(args.config.as_deref()).context("Invalid configuration")?;
    let sources = build_sources(&args, &config)?;

    let oracle: Arc<dyn DedupeOracle> =
        Arc::new(HttpDedupeOracle::new(&config.oracle.base_url, config.oracle_timeout())?);
    info!(oracle = %config.oracle.base_url, "Using deduplication oracle");
    let pipeline = ImportPipeline::from_config(oracle, &config);

    let summary = if args.output == "-" {
        import_into(&pipeline, sources, tokio::io::stdout(), args.format).await?
    } else {
        let file = tokio::fs::File::create(&args.output)
            .await
            .with_context(|| format!("Failed to create output file {}", args.output))?;
        import_into(&pipeline, sources, file, args.format).await?
    };

    // stdout may be carrying records, so the summary goes to stderr
    eprintln!("\n📊 Import summary:");
    for (source, count) in &summary.normalized {
        eprintln!("   {}: {} normalized", source, count);
    }
    eprintln!("   Batches: {} ({} failed)", summary.dedupe.batches_dispatched, summary.dedupe.batches_failed);
    eprintln!("   Unique: {}", summary.dedupe.unique);
    eprintln!("   Duplicates: {}", summary.dedupe.duplicates);
    eprintln!("   Dropped: {}", summary.dedupe.dropped);
    eprintln!("   Imported: {}", summary.imported);
    eprintln!("   Elapsed: {}s", summary.duration().num_seconds());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();
    metrics::init_metrics();

    let cli = Cli::parse();

    match cli.command {
        Commands::Import(args) => {
            if let Err(e) = run_import(args).await {
                error!("Import failed: {:#}", e);
                return Err(e);
            }
        }
    }
    Ok(())
}
