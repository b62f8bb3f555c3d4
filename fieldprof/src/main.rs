//! Field profiling tool.
//!
//! This binary profiles the fields of a JSON Lines dataset in a single
//! streaming pass and writes the statistics report as JSON.
//!
//! # Guarantees
//! - Bounded memory regardless of input size
//! - Read-only access to the input file
//! - Ctrl-C cancels the pass without writing a partial report

use anyhow::{Context, bail};
use clap::{Args, Parser, ValueEnum};
use fieldprof_core::{
    FieldDomain, JsonLinesSource, ProfileOptions, ProfilerConfig, ProfilingEngine, ProfilingTask,
    RecordId, RecordSource, RunOutcome, RunRequest, TemporalValue, logging::init_logging,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Exit code used when the run is interrupted.
const EXIT_CANCELLED: i32 = 130;

#[derive(Parser)]
#[command(name = "fieldprof")]
#[command(about = "Streaming field profiler for JSON Lines datasets")]
#[command(version)]
#[command(long_about = "
fieldprof - Streaming field profiler

Reads a JSON Lines file once and reports per-field statistics:
- Numeric: extrema, mean, stdev, quartiles, outliers, distribution shape
- Text: empty strings, lengths, top values, casing, word frequency
- Temporal: date range, common years/months/days, weekend share

Fields with more values than --max-exact-values are profiled from a uniform
sample; counts derived from the sample are marked (Est.).

EXAMPLES:
  fieldprof data.jsonl
  fieldprof --field age,name --rule '\"age\" >= 18' data.jsonl
  fieldprof --field-type zip=text --disable rarity --pretty -o report.json data.jsonl
")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    /// Input file
    #[arg(help = "JSON Lines file to profile (one object per line)")]
    input: PathBuf,

    /// Fields to profile
    #[arg(
        short,
        long = "field",
        value_delimiter = ',',
        help = "Comma-separated fields to profile (default: every field)"
    )]
    fields: Vec<String>,

    /// Domain overrides
    #[arg(
        long = "field-type",
        value_delimiter = ',',
        help = "Override inferred field domains (name=numeric|text|temporal|other)"
    )]
    field_types: Vec<String>,

    /// Validation rules
    #[arg(
        long = "rule",
        help = "Validation rule, repeatable (e.g. '\"age\" > 20 AND \"name\" IS NOT NULL')"
    )]
    rules: Vec<String>,

    /// Record selection
    #[arg(
        long,
        value_delimiter = ',',
        help = "Comma-separated line numbers to restrict the pass to"
    )]
    select_ids: Vec<u64>,

    /// Core statistics only
    #[arg(long, help = "Skip every optional statistic group")]
    minimal: bool,

    /// Statistic groups to skip
    #[arg(long, value_enum, value_delimiter = ',', help = "Optional statistic groups to skip")]
    disable: Vec<StatGroup>,

    /// Disable distribution shape tests
    #[arg(long, help = "Report skewness, kurtosis and normality as unavailable")]
    no_advanced_stats: bool,

    /// Top value count
    #[arg(long, help = "Number of top values listed per field (1-100)")]
    limit_unique: Option<usize>,

    /// Display precision
    #[arg(long, help = "Decimal places for rendered reals (0-10)")]
    decimal_places: Option<usize>,

    /// Sampling threshold
    #[arg(
        long,
        env = "FIELDPROF_MAX_EXACT_VALUES",
        help = "Non-null values per field kept exactly before sampling"
    )]
    max_exact_values: Option<usize>,

    /// Flagged id cap
    #[arg(long, help = "Record ids kept per flagged-value list (counts stay exact)")]
    id_list_cap: Option<usize>,

    /// Progress granularity
    #[arg(long, help = "Rows between progress updates")]
    progress_interval: Option<u64>,

    /// Random seed
    #[arg(long, help = "Seed for reproducible sampling")]
    seed: Option<u64>,

    /// Reference time
    #[arg(
        long,
        help = "Reference time for before/after comparisons (YYYY-MM-DD[ HH:MM:SS])"
    )]
    reference_time: Option<String>,

    /// Configuration file
    #[arg(long, help = "JSON profiler configuration; flags override its values")]
    config: Option<PathBuf>,

    /// Output file path
    #[arg(short, long, help = "Write the report here instead of stdout")]
    output: Option<PathBuf>,

    /// Pretty-print JSON
    #[arg(long, help = "Pretty-print the JSON report")]
    pretty: bool,

    /// Print the schema only
    #[arg(long, help = "Print the inferred schema and exit")]
    show_schema: bool,
}

#[derive(Args)]
struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        global = true,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all output except errors")]
    quiet: bool,
}

/// Optional statistic groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StatGroup {
    /// Skewness, kurtosis, Shapiro-Wilk
    DistShape,
    /// 1st/5th/95th/99th percentiles, optimal bins
    AdvPercentiles,
    /// Integer and decimal value counts
    IntDecimal,
    /// Zeros, positives, negatives, low variance
    OutlierDetails,
    /// Case distribution and whitespace anomalies
    CaseAnalysis,
    /// Singleton values, top words, pattern matches
    Rarity,
    /// Weekend share, midnight/noon, common hours
    Weekend,
}

enum Event {
    Progress(bool),
    Interrupt,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet)?;

    let config = build_config(&cli).await?;
    let overrides = parse_field_types(&cli.field_types)?;

    let input = cli.input.clone();
    let source = tokio::task::spawn_blocking(move || JsonLinesSource::open(&input, &overrides))
        .await
        .context("Schema inference worker failed")?
        .with_context(|| format!("Failed to open {}", cli.input.display()))?;

    if cli.show_schema {
        println!("{}", serde_json::to_string_pretty(source.schema())?);
        return Ok(());
    }

    let fields: Vec<String> = if cli.fields.is_empty() {
        source.schema().iter().map(|f| f.name.clone()).collect()
    } else {
        cli.fields.clone()
    };
    let mut request = RunRequest::new(fields).with_rules(cli.rules.iter().cloned());
    if !cli.select_ids.is_empty() {
        request = request.with_selection(cli.select_ids.iter().copied().map(RecordId));
    }

    info!(
        "Profiling {} fields of {}",
        request.fields.len(),
        cli.input.display()
    );

    let task = ProfilingTask::spawn(ProfilingEngine::new(config), source, request)?;
    let mut progress = task.progress();
    let mut last_logged = None;

    loop {
        let event = tokio::select! {
            changed = progress.changed() => Event::Progress(changed.is_ok()),
            _ = tokio::signal::ctrl_c() => Event::Interrupt,
        };
        match event {
            Event::Progress(true) => {
                let percent = *progress.borrow_and_update();
                if last_logged != Some(percent) {
                    info!("Progress: {}%", percent);
                    last_logged = Some(percent);
                }
            }
            Event::Progress(false) => break,
            Event::Interrupt => {
                warn!("Interrupt received, cancelling profiling run");
                task.cancel();
                break;
            }
        }
    }

    match task.wait().await? {
        RunOutcome::Completed(report) => {
            for (name, field) in &report.fields {
                if let Some(message) = field.error_message() {
                    warn!("Field '{}': {}", name, message);
                }
            }
            let json = if cli.pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            write_report(&json, cli.output.as_deref()).await?;
            info!(
                "✓ Profiled {} fields over {} rows",
                report.fields.len(),
                report.rows_analyzed
            );
            Ok(())
        }
        RunOutcome::Cancelled => {
            eprintln!("Profiling cancelled, no report written");
            std::process::exit(EXIT_CANCELLED);
        }
        RunOutcome::Failed(e) => Err(e).context("Profiling run failed"),
    }
}

/// Loads the configuration file, if any, and applies flag overrides.
async fn build_config(cli: &Cli) -> anyhow::Result<ProfilerConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str::<ProfilerConfig>(&text)
                .with_context(|| format!("Invalid configuration in {}", path.display()))?
        }
        None => ProfilerConfig::new(),
    };

    let mut options = if cli.minimal {
        ProfileOptions::minimal()
            .with_limit_unique(config.options.limit_unique)
            .with_decimal_places(config.options.decimal_places)
            .with_advanced_stats(config.options.advanced_stats_available)
    } else {
        config.options.clone()
    };
    for group in &cli.disable {
        options = match group {
            StatGroup::DistShape => options.with_dist_shape(false),
            StatGroup::AdvPercentiles => options.with_adv_percentiles(false),
            StatGroup::IntDecimal => options.with_int_decimal(false),
            StatGroup::OutlierDetails => options.with_outlier_details(false),
            StatGroup::CaseAnalysis => options.with_case_analysis(false),
            StatGroup::Rarity => options.with_rarity(false),
            StatGroup::Weekend => options.with_weekend(false),
        };
    }
    if cli.no_advanced_stats {
        options = options.with_advanced_stats(false);
    }
    if let Some(limit) = cli.limit_unique {
        options = options.with_limit_unique(limit);
    }
    if let Some(places) = cli.decimal_places {
        options = options.with_decimal_places(places);
    }
    config = config.with_options(options);

    if let Some(max) = cli.max_exact_values {
        config = config.with_max_exact_values(max);
    }
    if let Some(cap) = cli.id_list_cap {
        config = config.with_id_list_cap(cap);
    }
    if let Some(rows) = cli.progress_interval {
        config = config.with_progress_interval(rows);
    }
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }
    if let Some(text) = &cli.reference_time {
        let Some(reference) = TemporalValue::parse(text) else {
            bail!("Invalid reference time '{}'", text);
        };
        config = config.with_reference_time(reference.as_datetime());
    }

    config.validate()?;
    Ok(config)
}

/// Parses `name=domain` overrides.
fn parse_field_types(entries: &[String]) -> anyhow::Result<HashMap<String, FieldDomain>> {
    let mut overrides = HashMap::new();
    for entry in entries {
        let Some((name, domain)) = entry.split_once('=') else {
            bail!("Invalid field type '{}', expected name=domain", entry);
        };
        overrides.insert(name.trim().to_string(), domain.parse::<FieldDomain>()?);
    }
    Ok(overrides)
}

/// Writes the report to a file or stdout.
async fn write_report(json: &str, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("Failed to write to {}", path.display()))?;
            info!("✓ Report saved to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
