use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use std::env;
use std::fs;
use std::io;
use tracing_subscriber::EnvFilter;

use genealogy_stats::export::{write_comparison, write_series, write_snapshots};
use genealogy_stats::{
    AppConfig, DataSource, DateRange, ExportFormat, FieldKind, FieldValue, HistoryService, Normalizer,
    SnapshotFilter, StatisticsSnapshot, StatisticsStore, VERSION,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("genealogy_stats=info,warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let config = AppConfig::load()?;

    match args.get(1).map(String::as_str) {
        Some("init") => run_init(&config),
        Some("normalize") => run_normalize(&config, &args[2..]),
        Some("record") => run_record(&config, &args[2..]),
        Some("export") => run_export(&config, &args[2..]),
        Some("series") => run_series(&config, &args[2..]),
        Some("compare") => run_compare(&config, &args[2..]),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("📊 genealogy-stats {}", VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  init                                           create the statistics store");
    println!("  normalize <surname|date|location> <value>      normalize one value");
    println!("  record <snapshots.json>                        append one statistics run");
    println!("  export <csv|json> [source]                     dump stored snapshots");
    println!("  series <source|all> <column> [from] [to]       value over time (YYYY-MM-DD)");
    println!("  compare <source|all> <column> <group> [dates]  latest snapshot dates side by side");
    println!();
    println!("  series/compare accept --csv or --json for machine-readable output");
}

fn open_store(config: &AppConfig) -> Result<StatisticsStore> {
    StatisticsStore::open(&config.store)
        .with_context(|| format!("Cannot open statistics store {:?}", config.store.path))
}

fn parse_source(arg: Option<&String>) -> Result<Option<DataSource>> {
    match arg.map(String::as_str) {
        None | Some("all") => Ok(None),
        Some(name) => Ok(Some(name.parse()?)),
    }
}

/// Split off a trailing `--csv` / `--json` flag
fn split_format(args: &[String]) -> (Vec<String>, Option<ExportFormat>) {
    let mut format = None;
    let mut positional = Vec::new();
    for arg in args {
        match arg.strip_prefix("--").and_then(ExportFormat::from_name) {
            Some(f) => format = Some(f),
            None => positional.push(arg.clone()),
        }
    }
    (positional, format)
}

fn run_init(config: &AppConfig) -> Result<()> {
    println!("🔧 Setting up statistics store...");
    let store = open_store(config)?;

    println!("✓ Store ready at {}", config.store.path.display());
    println!("✓ Schema version: {}", store.schema_version()?);
    println!("✓ Snapshots stored: {}", store.count()?);
    Ok(())
}

fn run_normalize(config: &AppConfig, args: &[String]) -> Result<()> {
    let usage = "usage: normalize <surname|date|location> <value>";
    let Some(kind) = args.first() else {
        bail!(usage);
    };
    if args.len() < 2 {
        bail!(usage);
    }

    let kind = match kind.as_str() {
        "surname" => FieldKind::Surname,
        "date" => FieldKind::Date,
        "location" => FieldKind::Location,
        other => bail!("unknown field kind {:?} (expected surname, date or location)", other),
    };

    let normalizer = Normalizer::new(config.rules()?)?;
    let input = FieldValue::from(args[1..].join(" "));
    tracing::debug!(?kind, rules = %normalizer.rules().fingerprint(), "normalizing value");

    match kind {
        FieldKind::Surname => println!("{}", normalizer.surname(&input)),
        FieldKind::Location => println!("{}", normalizer.location(&input)),
        FieldKind::Date => {
            let result = normalizer.date(&input);
            if result.is_unparsed() {
                println!("⚠️  Unparsed date: {}", result.value);
            } else {
                println!("{}", result.value);
            }
        }
    }
    Ok(())
}

fn run_record(config: &AppConfig, args: &[String]) -> Result<()> {
    let Some(path) = args.first() else {
        bail!("usage: record <snapshots.json>");
    };

    println!("📂 Loading snapshots from {}...", path);
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    let snapshots: Vec<StatisticsSnapshot> =
        serde_json::from_str(&content).with_context(|| format!("Invalid snapshot file {}", path))?;
    println!("✓ Loaded {} snapshots", snapshots.len());

    println!("\n💾 Recording run...");
    let store = open_store(config)?;
    let recorded = store.record_run(snapshots)?;

    match recorded.first().and_then(|s| s.timestamp()) {
        Some(timestamp) => println!("✓ Recorded {} snapshots at {}", recorded.len(), timestamp),
        None => println!("✓ Nothing to record"),
    }
    println!("✓ Store contains {} snapshots", store.count()?);
    Ok(())
}

fn run_export(config: &AppConfig, args: &[String]) -> Result<()> {
    let format = args
        .first()
        .and_then(|f| ExportFormat::from_name(f))
        .context("usage: export <csv|json> [source]")?;
    let source = parse_source(args.get(1))?;

    let store = open_store(config)?;
    let snapshots = store.query(&SnapshotFilter::for_source(source))?;
    write_snapshots(io::stdout().lock(), format, &snapshots)?;
    Ok(())
}

fn run_series(config: &AppConfig, args: &[String]) -> Result<()> {
    let (args, format) = split_format(args);
    let Some(column) = args.get(1) else {
        bail!("usage: series <source|all> <column> [from] [to]");
    };
    let source = parse_source(args.first())?;

    let parse_day = |arg: Option<&String>| -> Result<Option<NaiveDate>> {
        arg.map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Invalid date {:?}", s)))
            .transpose()
    };
    let range = DateRange::days(parse_day(args.get(2))?, parse_day(args.get(3))?);

    let store = open_store(config)?;
    let series = HistoryService::new(&store).time_series(source, column, range)?;

    if let Some(format) = format {
        write_series(io::stdout().lock(), format, &series)?;
        return Ok(());
    }

    println!("📈 {} over time ({} points)", column, series.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for point in &series {
        println!("  {}  {:>10}", point.timestamp.format("%Y-%m-%d %H:%M:%S"), point.value);
    }
    Ok(())
}

fn run_compare(config: &AppConfig, args: &[String]) -> Result<()> {
    let (args, format) = split_format(args);
    let (Some(value_column), Some(group_column)) = (args.get(1), args.get(2)) else {
        bail!("usage: compare <source|all> <column> <group> [dates]");
    };
    let source = parse_source(args.first())?;
    let max_dates = match args.get(3) {
        Some(n) => n.parse().with_context(|| format!("Invalid date count {:?}", n))?,
        None => config.history_limit,
    };

    let store = open_store(config)?;
    let comparison = HistoryService::new(&store).compare(source, value_column, group_column, max_dates)?;

    if let Some(format) = format {
        write_comparison(io::stdout().lock(), format, &comparison)?;
        return Ok(());
    }

    println!("🔍 {} by {} ({} dates)", value_column, group_column, comparison.groups.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for (timestamp, groups) in &comparison.groups {
        println!("\n📅 {}", timestamp.format("%Y-%m-%d %H:%M:%S"));
        for group in groups {
            println!("  {:<24} {:>10}", group.key.to_string(), group.value);
        }
    }
    Ok(())
}
