use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cardlive_data::config::{ConfigLoader, ResolvedConfig};
use cardlive_data::domain::{CutoffTier, SelectionScope, TaxonomyMethod};
use cardlive_data::error::CardLiveError;
use cardlive_data::fs_util::{archive_entries, write_file_atomic};
use cardlive_data::loader::RecordLoader;
use cardlive_data::manager::DataManager;
use cardlive_data::output::{ExportResult, JsonOutput, SnapshotSummary};
use cardlive_data::record::parse_timestamp;
use cardlive_data::selection::{RgiSelection, Selection};
use cardlive_data::snapshot::Snapshot;

#[derive(Parser)]
#[command(name = "cardlive-data")]
#[command(about = "Load, filter and export CARD:Live antimicrobial resistance submissions")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    data_dir: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Load all records once and print a JSON summary")]
    Summary(FilterArgs),
    #[command(about = "Write the selected raw records to a zip archive")]
    Export(ExportArgs),
    #[command(about = "Keep reloading as new records arrive")]
    Watch(WatchArgs),
}

#[derive(Args, Clone, Default)]
struct FilterArgs {
    #[arg(long)]
    cutoff: Option<CutoffTier>,

    #[arg(long = "drug-class")]
    drug_classes: Vec<String>,

    #[arg(long = "amr-gene")]
    amr_genes: Vec<String>,

    #[arg(long = "amr-gene-family")]
    amr_gene_families: Vec<String>,

    #[arg(long = "resistance-mechanism")]
    resistance_mechanisms: Vec<String>,

    #[arg(long, help = "Match drug classes and genes per row instead of per sample")]
    per_row: bool,

    #[arg(long)]
    from: Option<String>,

    #[arg(long)]
    to: Option<String>,

    #[arg(long)]
    lmat_taxonomy: Option<String>,

    #[arg(long)]
    rgi_kmer_taxonomy: Option<String>,
}

#[derive(Args)]
struct ExportArgs {
    #[arg(long)]
    output: Utf8PathBuf,

    #[command(flatten)]
    filter: FilterArgs,
}

#[derive(Args)]
struct WatchArgs {
    #[arg(long, help = "Refresh interval in seconds (defaults to the configured value)")]
    interval: Option<u64>,

    #[arg(long, help = "Stop after this many seconds")]
    duration: Option<u64>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<CardLiveError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CardLiveError) -> u8 {
    match error {
        CardLiveError::MissingDataDirectory(_)
        | CardLiveError::ConfigRead(_)
        | CardLiveError::ConfigParse(_)
        | CardLiveError::InvalidSelectionKind(_)
        | CardLiveError::InvalidSelectionScope(_)
        | CardLiveError::InvalidSelectionTable(_)
        | CardLiveError::InvalidCutoffLevel(_)
        | CardLiveError::InvalidTimestamp(_) => 2,
        CardLiveError::KeyConsistencyViolation { .. } | CardLiveError::RefreshFailure(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    match cli.command {
        Commands::Summary(filter) => {
            let manager = DataManager::new(RecordLoader::from_config(&config)?)?;
            let snapshot = apply_filters(&manager.current_snapshot(), &filter)?;
            JsonOutput::print_summary(&SnapshotSummary::from_snapshot(&snapshot)?).into_diagnostic()
        }
        Commands::Export(args) => {
            let manager = DataManager::new(RecordLoader::from_config(&config)?)?;
            let snapshot = apply_filters(&manager.current_snapshot(), &args.filter)?;
            let records = write_file_atomic(&args.output, |writer| {
                manager.write_archive(Some(snapshot.files()), writer)
            })?;
            let entries = archive_entries(&args.output)?;
            info!(records, path = %args.output, "archive written");
            JsonOutput::print_export(&ExportResult {
                path: args.output.to_string(),
                records,
                entries,
            })
            .into_diagnostic()
        }
        Commands::Watch(args) => watch(&config, args),
    }
}

fn apply_filters(snapshot: &Snapshot, filter: &FilterArgs) -> Result<Snapshot, CardLiveError> {
    let scope = if filter.per_row {
        SelectionScope::Row
    } else {
        SelectionScope::File
    };
    let mut selections = vec![
        Selection::Rgi(RgiSelection::cutoff(SelectionScope::Row, filter.cutoff)),
        Selection::Rgi(RgiSelection::drug_classes(scope, &filter.drug_classes)),
        Selection::Rgi(RgiSelection::amr_genes(scope, &filter.amr_genes)),
        Selection::Rgi(RgiSelection::amr_gene_families(scope, &filter.amr_gene_families)),
        Selection::Rgi(RgiSelection::resistance_mechanisms(
            scope,
            &filter.resistance_mechanisms,
        )),
        Selection::taxonomy(TaxonomyMethod::Lmat, filter.lmat_taxonomy.as_deref()),
        Selection::taxonomy(TaxonomyMethod::RgiKmer, filter.rgi_kmer_taxonomy.as_deref()),
    ];
    if filter.from.is_some() || filter.to.is_some() {
        let start = match &filter.from {
            Some(from) => parse_timestamp(from)?,
            None => chrono::DateTime::<chrono::Utc>::MIN_UTC,
        };
        let end = match &filter.to {
            Some(to) => parse_timestamp(to)?,
            None => chrono::DateTime::<chrono::Utc>::MAX_UTC,
        };
        selections.push(Selection::time(start, end));
    }

    selections
        .iter()
        .try_fold(snapshot.clone(), |current, selection| current.select(selection))
}

fn watch(config: &ResolvedConfig, args: WatchArgs) -> miette::Result<()> {
    let manager = Arc::new(DataManager::new(RecordLoader::from_config(config)?)?);
    let interval = args
        .interval
        .map(Duration::from_secs)
        .unwrap_or(config.refresh_interval);
    info!(
        samples = manager.current_snapshot().samples_count(),
        interval_secs = interval.as_secs(),
        data_dir = %config.data_dir,
        "watching for new records"
    );
    let handle = manager.spawn_refresh(interval)?;
    match args.duration {
        Some(duration) => {
            thread::sleep(Duration::from_secs(duration));
            handle.stop();
            let summary = SnapshotSummary::from_snapshot(&manager.current_snapshot())?;
            JsonOutput::print_summary(&summary).into_diagnostic()
        }
        None => loop {
            thread::park();
        },
    }
}
