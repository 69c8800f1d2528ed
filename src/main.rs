//! Muskingum-Mann Stream Routing CLI
//!
//! Command-line tool that routes daily lateral inflow volumes through a
//! stream network described by CSV parameter tables.

use clap::Parser;
use muskingum::budget::BudgetType;
use muskingum::csv::{self as tables, OutputCsvRecord};
use muskingum::solver::{CalcMethod, MuskingumSolver, SolverConfig};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "muskingum")]
#[command(version = "0.1.0")]
#[command(about = "Muskingum-Mann stream network routing", long_about = None)]
struct Cli {
    /// Path to segments CSV file (columns: segment, tosegment, mann_n,
    /// seg_depth, seg_length, seg_slope, segment_type, x_coef,
    /// segment_flow_init)
    #[arg(short, long, value_name = "FILE")]
    segments: PathBuf,

    /// Path to HRUs CSV file (columns: hru, hru_segment, hru_area)
    #[arg(short = 'u', long, value_name = "FILE")]
    hrus: PathBuf,

    /// Path to daily forcing CSV file (columns: date, hru, sroff_vol,
    /// ssres_flow_vol, gwres_flow_vol)
    #[arg(short, long, value_name = "FILE")]
    forcing: PathBuf,

    /// Output CSV file path (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Numeric kernel: "reference" or "optimized"
    #[arg(long, default_value = "reference")]
    calc_method: String,

    /// Mass-budget reporting: "none", "warn", or "error"
    #[arg(long, default_value = "none")]
    budget_type: String,

    /// Outer-step length in seconds
    #[arg(long, default_value = "86400")]
    step_seconds: f64,

    /// Emit diagnostic logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    pretty_env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run_routing(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run_routing(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading network data...");

    let segments = tables::parse_segments_csv(&cli.segments)
        .map_err(|e| format!("Failed to parse segments file: {}", e))?;
    println!("  Loaded {} segments", segments.len());

    let hrus = tables::parse_hrus_csv(&cli.hrus)
        .map_err(|e| format!("Failed to parse HRUs file: {}", e))?;
    println!("  Loaded {} HRUs", hrus.len());

    let params = tables::build_parameters(&segments, &hrus)?;

    let forcing_records = tables::parse_forcing_csv(&cli.forcing)
        .map_err(|e| format!("Failed to parse forcing file: {}", e))?;
    let days = tables::group_forcing_by_day(&forcing_records, params.nhru)?;
    println!("  Loaded forcing for {} days", days.len());

    let config = SolverConfig {
        calc_method: cli.calc_method.parse::<CalcMethod>()?,
        budget_type: cli.budget_type.parse::<BudgetType>()?,
        verbose: cli.verbose,
        zero_orphan_inflows: true,
    };
    let mut solver = MuskingumSolver::new(&params, config)?;

    println!("Routing {} days...", days.len());
    let mut records = Vec::with_capacity(days.len() * params.nsegment);
    for day in &days {
        let mut sroff = day.sroff_vol.clone();
        let mut ssres = day.ssres_flow_vol.clone();
        let mut gwres = day.gwres_flow_vol.clone();
        solver.advance(&mut sroff, &mut ssres, &mut gwres, cli.step_seconds);

        for i in 0..params.nsegment {
            records.push(OutputCsvRecord {
                date: day.date,
                segment: i + 1,
                seg_lateral_inflow: solver.seg_lateral_inflow()[i],
                seg_upstream_inflow: solver.seg_upstream_inflow()[i],
                seg_inflow: solver.seg_inflow()[i],
                seg_outflow: solver.seg_outflow()[i],
                seg_stor_change: solver.seg_stor_change()[i],
                channel_outflow_vol: solver.channel_outflow_vol()[i],
            });
        }
    }

    match &cli.output {
        Some(path) => {
            tables::write_output_csv(path, &records)?;
            println!("Wrote {} records to {}", records.len(), path.display());
        }
        None => {
            tables::write_output(std::io::stdout().lock(), &records)?;
        }
    }

    let budget = solver.mass_budget();
    println!(
        "Mass budget over {} days: in {:.3e} ft³, out {:.3e} ft³, storage {:.3e} ft³",
        budget.steps, budget.inputs, budget.outputs, budget.storage_change
    );

    Ok(())
}
