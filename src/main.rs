use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fessi_graph::{
    graph_stats, load_facility_source, load_waste_item_source, Config, DryRunStore, FacilityIndex,
    GraphStats, GraphStore, ImportReport, IssueKind, MemoryGraphStore, NodeLabel, Pipeline,
    RelType, SqliteGraphStore, Vocabulary,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "fessi-import")]
#[command(about = "Import the FES waste-disposal data into the knowledge graph")]
#[command(version)]
struct Cli {
    /// Run every stage but write nothing
    #[arg(short = 'n', long, global = true)]
    dry_run: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Graph database file (overrides FESSI_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Vocabulary JSON (overrides FESSI_VOCABULARY_FILE)
    #[arg(long, global = true)]
    vocabulary: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import facilities only
    Facilities {
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Import waste items only (facilities already in the graph resolve)
    WasteItems {
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Import facilities, then waste items
    Import {
        #[arg(long)]
        facilities: Option<PathBuf>,

        #[arg(long)]
        waste_items: Option<PathBuf>,
    },

    /// Show node and relationship counts
    Stats,

    /// Delete every node and relationship
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::from_env();
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    if let Some(vocabulary) = &cli.vocabulary {
        config.vocabulary_file = Some(vocabulary.clone());
    }

    match &cli.command {
        Commands::Facilities { file } => {
            let path = file.clone().unwrap_or_else(|| config.facilities_file.clone());
            run_import(&config, cli.dry_run, Some(&path), None)
        }
        Commands::WasteItems { file } => {
            let path = file.clone().unwrap_or_else(|| config.waste_items_file.clone());
            run_import(&config, cli.dry_run, None, Some(&path))
        }
        Commands::Import {
            facilities,
            waste_items,
        } => {
            let facilities = facilities.clone().unwrap_or_else(|| config.facilities_file.clone());
            let waste_items = waste_items.clone().unwrap_or_else(|| config.waste_items_file.clone());
            run_import(&config, cli.dry_run, Some(&facilities), Some(&waste_items))
        }
        Commands::Stats => run_stats(&config),
        Commands::Reset { yes } => run_reset(&config, *yes, cli.dry_run),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

// ============================================================================
// IMPORT
// ============================================================================

fn run_import(
    config: &Config,
    dry_run: bool,
    facilities_file: Option<&Path>,
    waste_items_file: Option<&Path>,
) -> Result<()> {
    println!("🗑️  Fessi Import - FES waste data → knowledge graph");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if dry_run {
        println!("👀 DRY RUN - nothing will be written");
    }

    // Configuration problems stop the run before any row is read
    let vocabulary = config
        .load_vocabulary()
        .context("Failed to load vocabulary")?;
    let pipeline = Pipeline::new(&vocabulary).context("Failed to build pipeline")?;

    let facilities = facilities_file.map(load_facility_source).transpose()?;
    let waste_items = waste_items_file.map(load_waste_item_source).transpose()?;

    let mut report = ImportReport::new(dry_run);

    if dry_run {
        let mut store = open_dry_run_store(&config.db_path)?;
        import_into(&pipeline, facilities, waste_items, store.as_mut(), &mut report)?;
        print_report(&report, &vocabulary, None);
    } else {
        let mut store = open_store(&config.db_path)?;
        import_into(&pipeline, facilities, waste_items, &mut store, &mut report)?;

        store
            .record_run(&report.run_id, report.to_event_data())
            .context("Failed to record import run")?;

        let stats = store.stats().context("Failed to read graph statistics")?;
        print_report(&report, &vocabulary, Some(&stats));
    }

    Ok(())
}

fn import_into(
    pipeline: &Pipeline<'_>,
    facilities: Option<Vec<fessi_graph::RawFacility>>,
    waste_items: Option<fessi_graph::WasteItemSource>,
    store: &mut dyn GraphStore,
    report: &mut ImportReport,
) -> Result<()> {
    match (facilities, waste_items) {
        (Some(facilities), Some(waste_items)) => {
            pipeline.run(facilities, waste_items, store, report)?;
        }
        (Some(facilities), None) => {
            pipeline.import_facilities(facilities, store, report)?;
        }
        (None, Some(waste_items)) => {
            pipeline.import_waste_items(waste_items, &FacilityIndex::default(), store, report)?;
        }
        (None, None) => {}
    }

    Ok(())
}

fn open_store(db_path: &Path) -> Result<SqliteGraphStore> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    SqliteGraphStore::open(db_path)
        .with_context(|| format!("Graph store unavailable: {}", db_path.display()))
}

/// Dry runs read the existing graph when there is one, so Created/Matched
/// counts match what a real run would do.
fn open_dry_run_store(db_path: &Path) -> Result<Box<dyn GraphStore>> {
    if db_path.exists() {
        let store = SqliteGraphStore::open(db_path)
            .with_context(|| format!("Graph store unavailable: {}", db_path.display()))?;
        Ok(Box::new(DryRunStore::new(store)))
    } else {
        Ok(Box::new(DryRunStore::new(MemoryGraphStore::new())))
    }
}

fn print_report(report: &ImportReport, vocabulary: &Vocabulary, stats: Option<&GraphStats>) {
    println!("\n📊 Import Statistics");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Run:                  {}", report.run_id);
    println!("Vocabulary:           {} streams, {} synonyms", vocabulary.waste_streams().len(), vocabulary.synonym_count());

    if report.facility_records_read > 0 {
        println!("Facility records:     {}", report.facility_records_read);
        println!("  → facilities:       {} ({} merged)", report.facilities_loaded, report.facilities_merged);
    }
    if report.waste_item_rows_read > 0 {
        println!("Waste item rows:      {} ({} section markers)", report.waste_item_rows_read, report.section_markers);
        println!("  → waste items:      {}", report.waste_items);
        println!("  → target mentions:  {}", report.mentions_extracted);
    }

    let verb = if report.dry_run { "would create" } else { "created" };
    println!();
    for label in NodeLabel::ALL {
        let tally = report.nodes(label);
        println!("{:<22}{} {}, matched {}", format!("{}:", label), verb, tally.created, tally.matched);
    }
    for rel_type in RelType::ALL {
        let tally = report.relationships(rel_type);
        println!("{:<22}{} {}, matched {}", format!("{}:", rel_type), verb, tally.created, tally.matched);
    }

    let quality = report.quality();
    println!();
    println!("⚠️  Data quality: {}", quality.summary());
    let unresolved: Vec<&str> = report
        .issues_of(IssueKind::UnresolvedReference)
        .map(|issue| issue.subject.as_str())
        .collect();
    if !unresolved.is_empty() {
        println!("   Unresolved facilities: {}", unresolved.join(", "));
    }

    if let Some(stats) = stats {
        println!();
        print_stats(stats);
    }

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if report.dry_run {
        println!("✅ Dry run complete - graph unchanged");
    } else {
        println!("✅ Import complete");
    }
}

// ============================================================================
// STATS & RESET
// ============================================================================

fn run_stats(config: &Config) -> Result<()> {
    if !config.db_path.exists() {
        bail!(
            "Graph database not found: {} (run `fessi-import import` first)",
            config.db_path.display()
        );
    }

    let store = open_store(&config.db_path)?;
    let stats = graph_stats(&store).context("Failed to read graph statistics")?;

    println!("📊 Graph Statistics ({})", config.db_path.display());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    print_stats(&stats);

    let runs = store
        .recent_events("import_run", 1)
        .context("Failed to read import history")?;
    if let Some(last) = runs.first() {
        println!("Last import:          {} ({})", last.timestamp.to_rfc3339(), last.entity_id);
    }

    Ok(())
}

fn print_stats(stats: &GraphStats) {
    println!("Facility nodes:       {}", stats.facilities);
    println!("WasteItem nodes:      {}", stats.waste_items);
    println!("WasteStream nodes:    {}", stats.waste_streams);
    println!("DISPOSED_AT:          {}", stats.disposed_at);
    println!("DISPOSED_IN:          {}", stats.disposed_in);
    if stats.items_without_target > 0 {
        println!("Items without target: {}", stats.items_without_target);
    }
}

fn run_reset(config: &Config, yes: bool, dry_run: bool) -> Result<()> {
    if !yes {
        bail!("Refusing to reset {} without --yes", config.db_path.display());
    }

    if !config.db_path.exists() {
        println!("✓ Nothing to reset: {} does not exist", config.db_path.display());
        return Ok(());
    }

    let mut store = open_store(&config.db_path)?;

    if dry_run {
        let stats = store.stats().context("Failed to read graph statistics")?;
        println!(
            "👀 DRY RUN - would delete {} nodes and {} relationships",
            stats.nodes(),
            stats.relationships()
        );
        return Ok(());
    }

    let deleted = store.clear_all().context("Failed to reset graph")?;
    println!("✓ Deleted {} nodes (audit trail kept)", deleted);

    Ok(())
}
