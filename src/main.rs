use clap::Parser;
use colored::Colorize;
use mobility_balance::constants::DEFAULT_DELIMITER;
use mobility_balance::pipeline::DatasetDiagnostics;
use mobility_balance::records::RawTable;
use mobility_balance::{BalanceConfig, BalanceError, BalancePipeline, BalanceReport};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Score rail-station demand against last-mile mobility supply on an H3 grid
#[derive(Parser, Debug)]
#[command(name = "mobility-balance", version)]
struct Args {
    /// JSON run configuration (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Passenger frequency table
    #[arg(long)]
    demand: PathBuf,
    /// Mobility offer table
    #[arg(long)]
    supply: PathBuf,
    /// GeoJSON destination; stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,
    /// Field separator of both tables
    #[arg(long, default_value_t = DEFAULT_DELIMITER as char)]
    delimiter: char,
    /// Print the per-stage timing report
    #[arg(long)]
    timings: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err @ BalanceError::EmptySelection { .. }) => {
            eprintln!("{} {}", "no selection:".yellow().bold(), err);
            ExitCode::from(2)
        }
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> mobility_balance::Result<()> {
    let config = match &args.config {
        Some(path) => BalanceConfig::from_json_file(path)?,
        None => BalanceConfig::default(),
    };
    let delimiter = u8::try_from(args.delimiter)
        .map_err(|_| BalanceError::config("delimiter", "must be a single-byte character"))?;

    let pipeline = BalancePipeline::new(config)?;
    let demand = RawTable::from_csv_path(&args.demand, delimiter)?;
    let supply = RawTable::from_csv_path(&args.supply, delimiter)?;

    let report = pipeline.run(&demand, &supply)?;

    match &args.output {
        Some(path) => {
            let file = File::create(path).map_err(|source| BalanceError::Io {
                path: path.clone(),
                source,
            })?;
            let mut writer = BufWriter::new(file);
            report.write_geojson(&mut writer)?;
            writer.flush().map_err(|source| BalanceError::Io {
                path: path.clone(),
                source,
            })?;
        }
        None => {
            let stdout = io::stdout();
            report.write_geojson(stdout.lock())?;
        }
    }

    print_summary(&report);
    if args.timings {
        eprintln!("{}", report.timing_report());
    }
    Ok(())
}

fn print_dataset(diagnostics: &DatasetDiagnostics) {
    let dropped = diagnostics.drops.total();
    let dropped_text = format!("{} dropped", dropped);
    eprintln!(
        "  {:<7} {} rows, {} records, {} source cells, {}",
        diagnostics.dataset,
        diagnostics.rows_read,
        diagnostics.records,
        diagnostics.source_cells,
        if dropped > 0 { dropped_text.yellow() } else { dropped_text.green() }
    );
}

fn print_summary(report: &BalanceReport) {
    eprintln!("{}", "Balance grid".bold());
    print_dataset(&report.demand);
    print_dataset(&report.supply);
    match report.grid.balance_range() {
        Some((lo, hi)) => eprintln!(
            "  {} cells, balance {} .. {}",
            report.grid.len(),
            format!("{:.3}", lo).cyan(),
            format!("{:.3}", hi).red()
        ),
        None => eprintln!("  {}", "no cells scored".yellow()),
    }
}
