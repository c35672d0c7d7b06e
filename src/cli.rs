use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::analyzer::HeatmapEntry;
use crate::chunking::{chunk_document, ChunkingResult, SemanticChunk};
use crate::config::ChunkheatConfig;
use crate::database::{ChunkStore, ClickRecord};
use crate::fragment::load_fragments;

#[derive(Debug, Parser)]
#[command(name = "chunkheat")]
#[command(version)]
#[command(about = "Chunk extracted PDF pages into clickable regions and map where readers click")]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "CHUNKHEAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database file (overrides the configuration)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Write logs to daily files in this directory instead of stderr
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Chunk a fragment file and print the result without storing it
    Chunk(ChunkArgs),
    /// Chunk a fragment file and store the document
    Ingest(IngestArgs),
    /// Record one click on a chunk
    Record(RecordArgs),
    /// Show heat scores for a document
    Heatmap(HeatmapArgs),
    /// Show click-density clusters for one page
    Clusters(ClustersArgs),
    /// Attach a description to a chunk
    Summary(SummaryArgs),
    /// Print what the explanation generator sees for a chunk
    Context(ContextArgs),
    /// List stored documents
    Documents,
    /// Delete a document with its chunks and events
    Delete(DeleteArgs),
}

#[derive(Args, Debug)]
pub struct ChunkArgs {
    /// JSON array of positioned fragments
    pub input: PathBuf,

    /// Force a split once a chunk reaches this many characters
    #[arg(long)]
    pub max_chars: Option<usize>,

    /// Write the JSON report here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// JSON array of positioned fragments
    pub input: PathBuf,

    /// Name stored with the document (defaults to the input file name)
    #[arg(long)]
    pub file_name: Option<String>,

    #[arg(long)]
    pub max_chars: Option<usize>,
}

#[derive(Args, Debug)]
pub struct RecordArgs {
    pub chunk_id: Uuid,

    /// Who clicked; without it only the counters move
    #[arg(short, long)]
    pub user: Option<String>,

    #[arg(short, long, requires = "y")]
    pub x: Option<f64>,

    #[arg(short, long, requires = "x")]
    pub y: Option<f64>,

    /// Page the click landed on (defaults to the chunk's page)
    #[arg(short, long)]
    pub page: Option<u32>,
}

#[derive(Args, Debug)]
pub struct HeatmapArgs {
    pub document_id: Uuid,

    /// Hot-zone threshold in [0, 1] (defaults to the configured value)
    #[arg(short, long)]
    pub threshold: Option<f64>,

    /// Only print hot zones
    #[arg(long)]
    pub hot_only: bool,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ClustersArgs {
    pub document_id: Uuid,

    pub page: u32,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SummaryArgs {
    pub chunk_id: Uuid,

    pub text: String,
}

#[derive(Args, Debug)]
pub struct ContextArgs {
    pub chunk_id: Uuid,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub document_id: Uuid,
}

impl Cli {
    /// Configuration file (or defaults), then `CHUNKHEAT_*` variables, then
    /// command-line flags.
    pub fn resolve_config(&self) -> Result<ChunkheatConfig> {
        let mut config = match &self.config {
            Some(path) => ChunkheatConfig::load_from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ChunkheatConfig::default(),
        };
        config.apply_env();

        if let Some(database) = &self.database {
            config.database.path = database.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(dir) = &self.log_dir {
            config.logging.log_dir = dir.clone();
            config.logging.enable_file_logging = true;
        }

        config.validate()?;
        Ok(config)
    }
}

/// JSON shape printed by `chunk`
#[derive(Debug, Serialize)]
pub struct ChunkReport<'a> {
    pub pages_processed: usize,
    pub text_fragments: usize,
    pub image_fragments: usize,
    pub dropped_fragments: usize,
    pub chunks_created: usize,
    pub chunks: &'a [SemanticChunk],
}

impl<'a> From<&'a ChunkingResult> for ChunkReport<'a> {
    fn from(result: &'a ChunkingResult) -> Self {
        Self {
            pages_processed: result.pages_processed,
            text_fragments: result.text_fragments,
            image_fragments: result.image_fragments,
            dropped_fragments: result.dropped_fragments,
            chunks_created: result.chunks_created(),
            chunks: &result.chunks,
        }
    }
}

fn chunk_file(
    input: &Path,
    max_chars: Option<usize>,
    config: &ChunkheatConfig,
) -> Result<ChunkingResult> {
    let mut chunking = config.chunking.clone();
    if let Some(max_chars) = max_chars {
        anyhow::ensure!(max_chars > 0, "--max-chars must be positive");
        chunking.max_chunk_chars = max_chars;
    }

    let fragments = load_fragments(input)?;
    info!("📄 Loaded {} fragments from {}", fragments.len(), input.display());
    Ok(chunk_document(fragments, &chunking))
}

pub fn chunk_command(args: &ChunkArgs, config: &ChunkheatConfig) -> Result<()> {
    let result = chunk_file(&args.input, args.max_chars, config)?;
    let report = serde_json::to_string_pretty(&ChunkReport::from(&result))?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, report).with_context(|| format!("writing {}", path.display()))?;
            println!(
                "✅ {} chunks from {} pages written to {}",
                result.chunks_created(),
                result.pages_processed,
                path.display()
            );
        }
        None => println!("{}", report),
    }
    Ok(())
}

pub async fn ingest_command(
    args: &IngestArgs,
    store: &ChunkStore,
    config: &ChunkheatConfig,
) -> Result<()> {
    let result = chunk_file(&args.input, args.max_chars, config)?;
    let file_name = args.file_name.clone().unwrap_or_else(|| {
        args.input
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| args.input.display().to_string())
    });

    let document = store.save_document(&file_name, &result.chunks).await?;

    println!("🎉 Ingested {}", file_name);
    println!("   Document:  {}", document.id);
    println!("   Pages:     {}", result.pages_processed);
    println!(
        "   Fragments: {} text, {} image ({} dropped)",
        result.text_fragments, result.image_fragments, result.dropped_fragments
    );
    println!("   Chunks:    {}", result.chunks_created());
    Ok(())
}

pub async fn record_command(args: &RecordArgs, store: &ChunkStore) -> Result<()> {
    let mut click = ClickRecord::new(args.chunk_id);
    if let Some(user) = &args.user {
        click = click.with_user(user.clone());
    }
    if let (Some(x), Some(y)) = (args.x, args.y) {
        click = click.at(x, y);
    }
    if let Some(page) = args.page {
        click = click.on_page(page);
    }

    let interactions = store.record_interaction(click).await?;
    println!("👆 Chunk {} now has {} interactions", args.chunk_id, interactions);
    Ok(())
}

fn print_heatmap(entries: &[HeatmapEntry]) {
    println!("{:<6} {:<6} {:>8} {:>6}  {}", "page", "index", "clicks", "heat", "chunk");
    for entry in entries {
        println!(
            "{:<6} {:<6} {:>8} {:>6.2}  {}{}",
            entry.page_number,
            entry.chunk_index,
            entry.interactions,
            entry.heat_score,
            entry.chunk_id,
            if entry.is_hot_zone { " 🔥" } else { "" }
        );
    }
}

pub async fn heatmap_command(
    args: &HeatmapArgs,
    store: &ChunkStore,
    config: &ChunkheatConfig,
) -> Result<()> {
    let threshold = args.threshold.unwrap_or(config.heatmap.hot_zone_threshold);
    anyhow::ensure!((0.0..=1.0).contains(&threshold), "--threshold must be within [0, 1]");

    let entries = if args.hot_only {
        store.hot_zones(args.document_id, threshold).await?
    } else {
        store.heatmap(args.document_id, threshold).await?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        println!("No chunks to show for document {}", args.document_id);
    } else {
        print_heatmap(&entries);
    }
    Ok(())
}

pub async fn clusters_command(
    args: &ClustersArgs,
    store: &ChunkStore,
    config: &ChunkheatConfig,
) -> Result<()> {
    let clusters = store
        .page_clusters(args.document_id, args.page, &config.clustering)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&clusters)?);
        return Ok(());
    }

    println!("🎯 {} clusters on page {}", clusters.len(), args.page);
    for cluster in &clusters {
        println!(
            "   ({:.1}, {:.1}) count={} density={:.2} size={:.1} opacity={:.2} {}",
            cluster.center.x,
            cluster.center.y,
            cluster.count,
            cluster.density,
            cluster.size,
            cluster.opacity,
            cluster.color
        );
    }
    Ok(())
}

pub async fn summary_command(args: &SummaryArgs, store: &ChunkStore) -> Result<()> {
    store.set_summary(args.chunk_id, &args.text).await?;
    println!("📝 Summary saved for chunk {}", args.chunk_id);
    Ok(())
}

pub async fn context_command(args: &ContextArgs, store: &ChunkStore) -> Result<()> {
    let context = store.chunk_context(args.chunk_id).await?;
    println!("{}", serde_json::to_string_pretty(&context)?);
    Ok(())
}

pub async fn documents_command(store: &ChunkStore) -> Result<()> {
    let documents = store.list_documents().await?;
    if documents.is_empty() {
        println!("No documents stored yet");
    }
    for document in documents {
        println!(
            "{}  {:>6} clicks  {}  {}",
            document.id,
            document.total_clicks,
            document.created_at.format("%Y-%m-%d %H:%M"),
            document.file_name
        );
    }
    Ok(())
}

pub async fn delete_command(args: &DeleteArgs, store: &ChunkStore) -> Result<()> {
    store.delete_document(args.document_id).await?;
    println!("🗑️  Deleted document {}", args.document_id);
    Ok(())
}

/// Dispatch a parsed command. Only `chunk` runs without the database.
pub async fn run(command: Commands, config: ChunkheatConfig) -> Result<()> {
    if let Commands::Chunk(args) = &command {
        return chunk_command(args, &config);
    }

    let store = ChunkStore::open(&config.database).await?;
    let outcome = match &command {
        Commands::Chunk(_) => Ok(()),
        Commands::Ingest(args) => ingest_command(args, &store, &config).await,
        Commands::Record(args) => record_command(args, &store).await,
        Commands::Heatmap(args) => heatmap_command(args, &store, &config).await,
        Commands::Clusters(args) => clusters_command(args, &store, &config).await,
        Commands::Summary(args) => summary_command(args, &store).await,
        Commands::Context(args) => context_command(args, &store).await,
        Commands::Documents => documents_command(&store).await,
        Commands::Delete(args) => delete_command(args, &store).await,
    };
    store.close().await;
    outcome
}
