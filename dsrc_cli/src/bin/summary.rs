use std::{
    fs::{File, read_dir},
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::{Parser, arg, command};
use dsrccore::{
    analysis::RunAnalysis,
    config::SimConfig,
    scenario::ScenarioIdentity,
    sim_file::{SimOutput, load_file, load_output},
    simulation::run_simulation,
    units::Time,
};
use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// A file containing a list of scenario identities that will be run.
    /// This overrides `results`.
    #[arg(long)]
    pack: Option<PathBuf>,

    /// Run configuration used with `--pack`. Defaults to both presets.
    #[arg(long)]
    config: Option<Vec<PathBuf>>,

    #[arg(long)]
    no_verify: bool,

    /// Results file or directory containing results files
    #[arg(short, long)]
    results: Option<PathBuf>,

    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();

    let no_verify = args.no_verify;
    let verbose = args.verbose;
    let results_path = args.results.unwrap_or("sim_output.json".into());

    let table: Vec<TableEntry> = if let Some(pack_path) = args.pack {
        let scenarios = match load_file::<Vec<ScenarioIdentity>>(pack_path) {
            Ok(scenarios) => scenarios,
            Err(e) => {
                eprintln!("<Error> {e}");
                return ExitCode::FAILURE;
            }
        };

        let configs = match args.config {
            Some(paths) => {
                let mut configs = Vec::new();
                for path in paths {
                    match load_file::<SimConfig>(path) {
                        Ok(config) => configs.push(config),
                        Err(e) => {
                            eprintln!("<Error> {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                }
                configs
            }
            None => vec![SimConfig::simple(), SimConfig::meshed()],
        };

        let mut table = Vec::new();
        for config in configs {
            let mut inner_table: Vec<Option<TableEntry>> = Vec::new();

            scenarios
                .clone()
                .into_par_iter()
                .map(|identity| {
                    let scenario = identity
                        .create()
                        .map_err(|e| eprintln!("<Error> {e}"))
                        .ok()?;
                    let results = run_simulation(123456, scenario, config.clone())
                        .map_err(|e| eprintln!("<Error> {e}"))
                        .ok()?;
                    Some(make_table_entry(no_verify, verbose, &results))
                })
                .collect_into_vec(&mut inner_table);

            eprintln!("Finished {:?}", config.mode);
            table.extend(inner_table.into_iter().flatten());
        }
        table
    } else {
        load_result_files(results_path)
            .iter()
            .map(|results| make_table_entry(no_verify, verbose, results))
            .collect()
    };

    match write_table(args.output, &table) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("<Error> {e}");
            ExitCode::FAILURE
        }
    }
}

fn write_table(maybe_path: Option<PathBuf>, table: &[TableEntry]) -> Result<(), csv::Error> {
    let write = if let Some(out_path) = maybe_path {
        let file = File::create(out_path)?;
        Box::new(file) as Box<dyn Write>
    } else {
        Box::new(io::stdout())
    };

    let mut writer = csv::Writer::from_writer(write);
    for entry in table {
        writer.serialize(entry)?;
    }
    writer.flush()?;
    Ok(())
}

fn make_table_entry(no_verify: bool, verbose: bool, results: &SimOutput) -> TableEntry {
    let analysis = RunAnalysis::new(results);
    let identity = &analysis.complete_identity;
    let summary = &analysis.summary;

    let entry = TableEntry {
        scenario_identity: serde_json::to_string(&identity.scenario_identity)
            .unwrap_or_default(),
        mode: format!("{:?}", identity.config.mode),
        sim_version: identity.sim_version.clone(),
        seed: identity.simulation_seed,
        variant: format!("{:?}", summary.variant),
        max_range: summary.max_range.metres(),
        pdr_percent: summary.pdr_percent,
        total_sent: summary.total_sent,
        total_delivered: summary.total_delivered,
        links_detected: summary.links_detected,
        ticks: summary.ticks,
        rtv_events: analysis.rtv_events,
        vtv_events: analysis.vtv_events,
        mean_rtv_delay: analysis.mean_rtv_delay.map(Time::seconds),
        mean_vtv_delay: analysis.mean_vtv_delay.map(Time::seconds),
        max_delay: analysis.max_delay.seconds(),
        vehicles_reached: analysis.vehicles_reached,
        vehicles_linked: analysis.vehicles_linked,
        end_time: analysis.end_time.seconds(),
    };

    if verbose {
        printout(&analysis);
    }

    if !no_verify && !dsrccore::verification::verify_all(results) {
        eprintln!(
            "<Error> Verification failed for {:#?}",
            analysis.complete_identity
        );
    }

    entry
}

fn load_result_files(results_path: PathBuf) -> Vec<SimOutput> {
    let mut sim_results: Vec<SimOutput> = Vec::new();

    if results_path.is_file() {
        match load_output(results_path) {
            Ok(loaded) => sim_results.push(loaded),
            Err(e) => {
                eprintln!("<Error> {e}");
            }
        }
        return sim_results;
    }

    let dir = match read_dir(&results_path) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("<Error> {results_path:?}: {e}");
            return sim_results;
        }
    };

    for thing in dir {
        let file = match thing {
            Ok(file) => file,
            Err(e) => {
                eprintln!("<Error> {e}");
                continue;
            }
        };

        match load_output(file.path()) {
            Ok(loaded) => {
                sim_results.push(loaded);
            }
            Err(e) => {
                eprintln!("<Warning> {e}");
                continue;
            }
        };
    }

    sim_results
}

#[derive(Debug, Clone, Serialize)]
struct TableEntry {
    scenario_identity: String,
    mode: String,
    sim_version: String,
    seed: u64,
    variant: String,

    max_range: f64,
    pdr_percent: f64,
    total_sent: u64,
    total_delivered: u64,
    links_detected: u64,
    ticks: u64,

    rtv_events: usize,
    vtv_events: usize,
    mean_rtv_delay: Option<f64>,
    mean_vtv_delay: Option<f64>,
    max_delay: f64,

    vehicles_reached: usize,
    vehicles_linked: usize,
    end_time: f64,
}

fn printout(analysis: &RunAnalysis) {
    let identity = &analysis.complete_identity;
    let summary = &analysis.summary;

    println!();
    println!(
        "{:?} in {:?} mode",
        identity.scenario_identity, identity.config.mode
    );
    println!(
        "random seed: {}   simulation version: {}",
        identity.simulation_seed, identity.sim_version
    );
    println!(
        "PDR: {:.2}%  ({} / {})  Max Range: {:.2} m",
        summary.pdr_percent, summary.total_delivered, summary.total_sent, summary.max_range
    );
    println!(
        "Events: rtv({})  vtv({})  (Simulation End Time: {:.4})",
        analysis.rtv_events, analysis.vtv_events, analysis.end_time,
    );
}
