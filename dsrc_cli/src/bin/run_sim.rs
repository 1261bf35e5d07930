//! The simulator cli.

use std::{
    fs::{create_dir_all, read_dir},
    path::{Path, PathBuf},
    process::ExitCode,
    sync::atomic::{AtomicU64, Ordering},
    time::Instant,
};

use clap::Parser;
use dsrccore::{
    config::{Mode, SimConfig},
    events::{NullSink, TsvLog},
    link::LinkDetection,
    metrics::RunSummary,
    scenario::{Scenario, ScenarioIdentity},
    sim_file::{self, OutputIdentity, load_file},
    simulation::run_recorded,
};
use log::info;
use rand::{Rng, rng};
use rayon::prelude::*;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long)]
    quiet: bool,

    /// Scenario file or directory containing scenario files
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// File name for output or folder to put simulation results into
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run configuration file. Uses the simple preset if not specified
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the mode in the configuration (simple or meshed)
    #[arg(long, value_parser = parse_mode)]
    mode: Option<Mode>,

    /// Use spatial hashing for vehicle link detection
    #[arg(long)]
    grid: bool,

    /// Seed for the rng. A random seed will be used if not specified
    #[arg(long)]
    seed: Option<u64>,

    /// Also write a tab separated event log. Single scenario only
    #[arg(long)]
    tsv: Option<PathBuf>,

    /// Pace ticks against the wall clock. Single scenario only
    #[arg(long)]
    realtime: bool,

    /// Show timing information
    #[arg(long)]
    time: bool,

    #[arg(long)]
    json: bool,
}

fn parse_mode(s: &str) -> Result<Mode, String> {
    match s.to_ascii_lowercase().as_str() {
        "simple" => Ok(Mode::Simple),
        "meshed" => Ok(Mode::Meshed),
        other => Err(format!("unknown mode {other:?}, expected simple or meshed")),
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();

    let do_timing = args.time;
    let input_path = args.input.clone().unwrap_or("sim_file.sim".into());
    let use_rmp = !args.json;

    let mut config = match &args.config {
        Some(path) => match load_file::<SimConfig>(path.clone()) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("<Error> Could not load config {path:?}: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => SimConfig::simple(),
    };

    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if args.grid {
        config.link_detection = LinkDetection::Grid;
    }

    if let Err(e) = config.validate() {
        eprintln!("<Error> Invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    if !input_path.is_dir() {
        let timer = do_timing.then(Instant::now);
        let output_path = args.output.clone().unwrap_or("sim_output.json".into());

        let code = run_single(&args, &input_path, &output_path, config, use_rmp);

        if let Some(timer) = timer {
            println!("Ran 1 sim in {:.4}s", timer.elapsed().as_secs_f32());
        }
        return code;
    }

    if args.tsv.is_some() || args.realtime {
        eprintln!("<Warning> --tsv and --realtime are ignored when running a directory");
    }

    let output_path = match args.output.clone() {
        Some(path) => path,
        None => {
            let count = read_dir("outputs").map(|dir| dir.count()).unwrap_or(0);
            PathBuf::from(format!("outputs/{count}"))
        }
    };
    if let Err(e) = create_dir_all(&output_path) {
        eprintln!("<Error> Could not create {output_path:?}: {e}");
        return ExitCode::FAILURE;
    }

    let files: Vec<PathBuf> = match read_dir(&input_path) {
        Ok(dir) => dir
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.path()),
                Err(e) => {
                    eprintln!("<Error> {e}");
                    None
                }
            })
            .collect(),
        Err(e) => {
            eprintln!("<Error> {e}");
            return ExitCode::FAILURE;
        }
    };

    let timer = do_timing.then(Instant::now);
    let count = AtomicU64::new(0);
    let quiet = args.quiet;

    files.into_par_iter().for_each(|path| {
        let scenario = match load_scenario(&path) {
            Ok(scenario) => scenario,
            Err(e) => {
                eprintln!("<Warning> {path:?}: {e}");
                return;
            }
        };

        // A new seed per scenario unless one was given
        let random_seed = args.seed.unwrap_or_else(|| rng().random());

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !quiet {
            println!("<Message> Running simulation for {file_name}");
        }

        count.fetch_add(1, Ordering::Relaxed);
        let identity = OutputIdentity::new(scenario.identity.clone(), config.clone(), random_seed);
        let record = match run_recorded(identity, scenario.into_mobility(), NullSink, false) {
            Ok(record) => record,
            Err(e) => {
                eprintln!("<Error> {file_name}: {e}");
                return;
            }
        };
        if let Some(fault) = &record.fault {
            eprintln!("<Error> {file_name}: {fault}, writing partial results");
        }
        let output = record.output;

        let out = output_path.join(format!("output_{file_name}"));
        if !quiet {
            println!("<Message> Writing output to {out:?}");
        }

        if let Err(e) = sim_file::write_output(out, &output, use_rmp) {
            eprintln!("<Error> {e}");
        }
    });

    if let Some(timer) = timer {
        let final_count = count.load(Ordering::Relaxed);
        let final_time = timer.elapsed().as_secs_f32();
        println!(
            "Ran {final_count} sims in {:.4}s ({} sims / s)",
            final_time,
            final_count as f32 / final_time
        )
    }

    ExitCode::SUCCESS
}

/// Accepts a full scenario or an identity to regenerate one from.
fn load_scenario(path: &Path) -> Result<Scenario, String> {
    match load_file::<Scenario>(path.to_path_buf()) {
        Ok(scenario) => Ok(scenario),
        Err(scenario_err) => {
            let identity = load_file::<ScenarioIdentity>(path.to_path_buf())
                .map_err(|_| scenario_err.to_string())?;
            identity.create().map_err(|e| e.to_string())
        }
    }
}

fn run_single(
    args: &Args,
    input_path: &Path,
    output_path: &Path,
    config: SimConfig,
    use_rmp: bool,
) -> ExitCode {
    let scenario = match load_scenario(input_path) {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("<Error> {input_path:?}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let random_seed = args.seed.unwrap_or_else(|| rng().random());
    let identity = OutputIdentity::new(scenario.identity.clone(), config, random_seed);

    let tsv = match &args.tsv {
        Some(path) => match TsvLog::create(path) {
            Ok(tsv) => Some(tsv),
            Err(e) => {
                eprintln!("<Error> Could not create {path:?}: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    info!("Running {input_path:?} with seed {random_seed}");

    let record = match run_recorded(identity, scenario.into_mobility(), tsv, args.realtime) {
        Ok(record) => record,
        Err(e) => {
            eprintln!("<Error> {e}");
            return ExitCode::FAILURE;
        }
    };

    let code = match &record.fault {
        None => ExitCode::SUCCESS,
        Some(fault) => {
            eprintln!("<Error> {fault}, writing partial results");
            ExitCode::FAILURE
        }
    };

    let output = record.output;
    if !args.quiet {
        print_summary(&output.summary);
    }

    if let Err(e) = sim_file::write_output(output_path.to_path_buf(), &output, use_rmp) {
        eprintln!("<Error> {e}");
        return ExitCode::FAILURE;
    }

    code
}

fn print_summary(summary: &RunSummary) {
    println!("End of Simulation ({:?})", summary.variant);
    println!("Max Range: {:.2} m", summary.max_range);
    println!(
        "PDR: {:.2}% ({} delivered / {} sent)",
        summary.pdr_percent, summary.total_delivered, summary.total_sent
    );
}
