use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use plankton_datakit::app::{App, CompareReport, IndexReport, QualityReport};
use plankton_datakit::calc::DiversityCalc;
use plankton_datakit::compare::fmt_num;
use plankton_datakit::config::Settings;
use plankton_datakit::error::DatakitError;
use plankton_datakit::ops::MergeCountsMode;
use plankton_datakit::output::JsonOutput;
use plankton_datakit::quality::IssueLevel;
use plankton_datakit::snapshot;

#[derive(Parser)]
#[command(name = "plankton-dk")]
#[command(about = "Plankton count dataset toolkit: diversity indices, dataset diffing, quality checks")]
#[command(version, author)]
struct Cli {
    /// Print results as JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    /// Settings file (defaults to plankton-dk.json when present).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Diff two dataset snapshots (points, species, per-point indices)")]
    Compare(CompareArgs),
    #[command(about = "Per-point diversity indices of a dataset")]
    Indices(DatasetArgs),
    #[command(about = "Validate a dataset for counting and calculation problems")]
    Check(DatasetArgs),
    #[command(about = "Merge species rows that share the same name")]
    MergeDuplicates(MergeArgs),
}

#[derive(Args)]
struct CompareArgs {
    /// Baseline dataset snapshot (side A).
    a: Utf8PathBuf,
    /// Target dataset snapshot (side B).
    b: Utf8PathBuf,

    /// Override the floating-metric tolerance.
    #[arg(long)]
    tolerance: Option<f64>,

    /// Also write the comparison report to this file.
    #[arg(long)]
    output: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct DatasetArgs {
    dataset: Utf8PathBuf,
}

#[derive(Args)]
struct MergeArgs {
    dataset: Utf8PathBuf,

    #[arg(long, value_enum, default_value_t = MergeCountsMode::Sum)]
    mode: MergeCountsMode,

    /// Where to write the merged dataset (defaults to in-place).
    #[arg(long)]
    output: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<DatakitError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &DatakitError) -> u8 {
    match error {
        DatakitError::ConfigRead(_) | DatakitError::SnapshotRead(_) => 2,
        DatakitError::ConfigParse(_)
        | DatakitError::SnapshotParse { .. }
        | DatakitError::Serialize(_) => 3,
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
    let settings = Settings::resolve(cli.config.as_deref()).into_diagnostic()?;
    let app = App::with_builtin_calc(settings);

    match cli.command {
        Commands::Compare(args) => run_compare(&app, args, cli.json),
        Commands::Indices(args) => run_indices(&app, args, cli.json),
        Commands::Check(args) => run_check(&app, args, cli.json),
        Commands::MergeDuplicates(args) => run_merge(&app, args, cli.json),
    }
}

fn run_compare(
    app: &App<DiversityCalc>,
    args: CompareArgs,
    json: bool,
) -> miette::Result<()> {
    let a = snapshot::read_dataset(&args.a).into_diagnostic()?;
    let b = snapshot::read_dataset(&args.b).into_diagnostic()?;
    let report = match args.tolerance {
        Some(tolerance) => app
            .compare_with_tolerance(&a, &b, tolerance)
            .into_diagnostic()?,
        None => app.compare(&a, &b),
    };

    if let Some(output) = &args.output {
        snapshot::write_json(output, &report).into_diagnostic()?;
    }

    if json {
        JsonOutput::print_compare(&report).into_diagnostic()?;
    } else {
        print_compare_text(&report);
    }
    Ok(())
}

fn run_indices(
    app: &App<DiversityCalc>,
    args: DatasetArgs,
    json: bool,
) -> miette::Result<()> {
    let dataset = snapshot::read_dataset(&args.dataset).into_diagnostic()?;
    let report = app.indices(&dataset);
    if json {
        JsonOutput::print_indices(&report).into_diagnostic()?;
    } else {
        print_indices_text(&report);
    }
    Ok(())
}

fn run_check(
    app: &App<DiversityCalc>,
    args: DatasetArgs,
    json: bool,
) -> miette::Result<()> {
    let dataset = snapshot::read_dataset(&args.dataset).into_diagnostic()?;
    let report = app.check(&dataset);
    if json {
        JsonOutput::print_check(&report).into_diagnostic()?;
    } else {
        print_check_text(&report);
    }
    Ok(())
}

fn run_merge(
    app: &App<DiversityCalc>,
    args: MergeArgs,
    json: bool,
) -> miette::Result<()> {
    let dataset = snapshot::read_dataset(&args.dataset).into_diagnostic()?;
    let (merged, report) = app.merge_duplicates(&dataset, args.mode).into_diagnostic()?;

    let destination = args.output.as_ref().unwrap_or(&args.dataset);
    snapshot::write_dataset(destination, &merged).into_diagnostic()?;

    if json {
        JsonOutput::print_merge(&report).into_diagnostic()?;
    } else {
        println!(
            "merged {} duplicate species row(s): {} -> {} species ({destination})",
            report.merged_count, report.species_before, report.species_after
        );
    }
    Ok(())
}

fn print_compare_text(report: &CompareReport) {
    println!("A: {}", report.dataset_a.title);
    println!("B: {}", report.dataset_b.title);
    println!();

    print_key_list("points only in A", &report.result.points_only_in_a);
    print_key_list("points only in B", &report.result.points_only_in_b);
    print_key_list("species only in A", &report.result.species_only_in_a);
    print_key_list("species only in B", &report.result.species_only_in_b);

    if report.result.index_diffs.is_empty() {
        println!("indices: no changes beyond tolerance");
    } else {
        println!("changed indices ({}):", report.result.index_diffs.len());
        for row in &report.result.index_diffs {
            println!(
                "  {}  {:<2} {} -> {} (delta {})",
                row.point_label,
                row.metric.as_str(),
                row.a_value,
                row.b_value,
                row.delta
            );
        }
    }
}

fn print_key_list(heading: &str, keys: &[String]) {
    if keys.is_empty() {
        println!("{heading}: none");
    } else {
        println!("{heading}: {}", keys.join(", "));
    }
}

fn print_indices_text(report: &IndexReport) {
    println!("{}", report.dataset.title);
    println!(
        "{:<12} {:>6} {:>4} {:>10} {:>10} {:>10}",
        "point", "N", "S", "H'", "D", "J"
    );
    for point in &report.points {
        let label = if point.label.trim().is_empty() {
            point.point_id.as_str()
        } else {
            point.label.trim()
        };
        println!(
            "{:<12} {:>6} {:>4} {:>10} {:>10} {:>10}",
            label,
            point.total_count,
            point.species_count,
            fmt_num(point.shannon_h),
            fmt_num(point.margalef_d),
            fmt_num(point.pielou_j)
        );
    }
}

fn print_check_text(report: &QualityReport) {
    println!("{}", report.dataset.title);
    println!(
        "{} error(s), {} warning(s), {} info",
        report.errors, report.warnings, report.infos
    );
    for issue in &report.issues {
        let level = match issue.level {
            IssueLevel::Error => "ERROR",
            IssueLevel::Warn => "WARN ",
            IssueLevel::Info => "INFO ",
        };
        println!("{level} {}: {}", issue.title, issue.detail);
    }
}
