use analytics::{
    AggregationEngine, ConcentrationAnalyzer, Dimension, Metric, RankBy, ReportAssembler, ReportRequest,
};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Table};
use configuration::ReportSettings;
use core_types::Snapshot;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// The main entry point for the Ganaderia BI command-line tool.
fn main() -> Result<()> {
    // Load environment overrides from a .env file, if there is one.
    dotenvy::dotenv().ok();

    // Logs go to stderr so the JSON on stdout stays machine-readable.
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let settings = configuration::load_config(cli.config.as_deref())
        .context("Failed to load report settings")?;

    match cli.command {
        Commands::Report(args) => handle_report(args, settings),
        Commands::Rankings(args) => handle_rankings(args),
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Business intelligence reports over livestock brand registrations.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML file with report settings. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a report from a JSON snapshot and print it as JSON.
    Report(ReportArgs),
    /// Print the distribution of registrations over one dimension.
    Rankings(RankingsArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportKind {
    Monthly,
    Annual,
    Departments,
    Producer,
    Executive,
    Custom,
}

#[derive(Parser)]
struct ReportArgs {
    /// JSON file with `registrations`, `logos` and `statusEvents`.
    #[arg(long)]
    snapshot: PathBuf,

    #[arg(long, value_enum)]
    kind: ReportKind,

    /// Year of the monthly or annual report.
    #[arg(long)]
    year: Option<i32>,

    /// Month (1-12) of the monthly report.
    #[arg(long)]
    month: Option<u32>,

    /// Brand of the producer report.
    #[arg(long)]
    brand_id: Option<u64>,

    /// First registration date of the department or custom report (YYYY-MM-DD).
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last registration date of the department or custom report (YYYY-MM-DD).
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Grouping dimension of the custom report, e.g. breed or month.
    #[arg(long)]
    by: Option<String>,

    /// Metrics of the custom report, comma separated, e.g. head_count,certification_amount.
    #[arg(long, value_delimiter = ',')]
    metric: Vec<String>,

    /// Reference instant of the executive dashboard (RFC 3339). Defaults to now.
    #[arg(long)]
    as_of: Option<DateTime<Utc>>,

    /// Indent the JSON output.
    #[arg(long)]
    pretty: bool,
}

#[derive(Parser)]
struct RankingsArgs {
    #[arg(long)]
    snapshot: PathBuf,

    /// Grouping dimension, e.g. breed, department, purpose or municipality.
    #[arg(long)]
    by: String,
}

// ==============================================================================
// Command Logic
// ==============================================================================

fn handle_report(args: ReportArgs, settings: ReportSettings) -> Result<()> {
    let snapshot = load_snapshot(&args.snapshot)?;
    let request = build_request(&args)?;

    let report = ReportAssembler::new(settings)
        .assemble(&request, &snapshot)
        .context("Failed to assemble report")?;

    for warning in &report.metadata.warnings {
        tracing::warn!(section = %warning.section, kind = warning.kind, "{}", warning.message);
    }

    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");
    Ok(())
}

fn build_request(args: &ReportArgs) -> Result<ReportRequest> {
    let request = match args.kind {
        ReportKind::Monthly => ReportRequest::Monthly {
            year: args.year.context("--year is required for monthly reports")?,
            month: args.month.context("--month is required for monthly reports")?,
        },
        ReportKind::Annual => ReportRequest::Annual {
            year: args.year.context("--year is required for annual reports")?,
        },
        ReportKind::Departments => ReportRequest::Departments {
            from: args.from,
            to: args.to,
        },
        ReportKind::Producer => ReportRequest::Producer {
            brand_id: args.brand_id.context("--brand-id is required for producer reports")?,
        },
        ReportKind::Executive => ReportRequest::Executive {
            as_of: args.as_of.unwrap_or_else(Utc::now),
        },
        ReportKind::Custom => ReportRequest::Custom {
            dimension: args
                .by
                .as_deref()
                .context("--by is required for custom reports")?
                .parse()?,
            metrics: args
                .metric
                .iter()
                .map(|m| m.parse::<Metric>())
                .collect::<Result<_, _>>()?,
            from: args.from,
            to: args.to,
        },
    };
    Ok(request)
}

fn handle_rankings(args: RankingsArgs) -> Result<()> {
    let snapshot = load_snapshot(&args.snapshot)?;
    let dimension: Dimension = args.by.parse()?;

    let basis = RankBy::Sum(Metric::HeadCount);
    let grouping = AggregationEngine::new().group_by_dimension(
        &snapshot.registrations,
        dimension,
        &[Metric::HeadCount],
    );
    let analyzer = ConcentrationAnalyzer::new();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![dimension.key(), "count", "head count", "share %", "HHI contribution"]);
    for (key, stats) in grouping.ranked(basis) {
        table.add_row(vec![
            key.as_str().to_string(),
            stats.count.to_string(),
            format!("{:.0}", stats.sum(Metric::HeadCount)),
            format!("{:.2}", grouping.percentage(key, basis)),
            format!("{:.2}", analyzer.hhi_contribution(grouping.share(key, basis))),
        ]);
    }
    println!("{table}");

    let index = analyzer.concentration(&grouping.shares(basis));
    let classification = serde_json::to_value(index.classification)?;
    println!("HHI: {:.2} ({})", index.hhi, classification.as_str().unwrap_or_default());
    println!("Gini: {:.4}", index.gini);
    println!("Effective diversity count: {:.2}", index.effective_diversity_count);
    let excluded = grouping.excluded + snapshot.unreadable;
    if excluded > 0 {
        println!("Excluded records: {excluded}");
    }
    Ok(())
}

fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;
    tracing::info!(
        registrations = snapshot.registrations.len(),
        logos = snapshot.logos.len(),
        events = snapshot.status_events.len(),
        unreadable = snapshot.unreadable,
        "Snapshot loaded."
    );
    Ok(snapshot)
}
