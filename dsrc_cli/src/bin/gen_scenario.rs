use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, command};
use dsrccore::{
    scenario::{
        ScenarioIdentity,
        generation::{
            ScenarioGenerator,
            positioning::{HighwayTraffic, WanderingVehicles},
        },
    },
    sim_file::{self, load_file},
    units::{METRES, MPS, SECONDS},
};
use rand::Rng;

#[derive(Parser, Debug)]
#[command()]
struct Args {
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Vehicles wandering in a square instead of highway traffic
    #[arg(long)]
    wandering: bool,

    #[arg(long, default_value_t = 60)]
    vehicles: usize,

    /// Distance between generated roadside units on the highway, none if not set
    #[arg(long)]
    roadside_spacing: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,

    /// Generate from an identity
    #[arg(long)]
    id: Option<PathBuf>,

    /// Generate as an identity
    #[arg(long)]
    asid: bool,

    /// Use JSON instead of rust messagepack
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    let seed: u64 = args.seed.unwrap_or_else(|| rand::rng().random());
    let output_file = args.output.unwrap_or("sim_file.sim".into());
    let use_rmp = !args.json;

    let identity = if let Some(path) = args.id {
        match load_file::<ScenarioIdentity>(path) {
            Ok(identity) => identity,
            Err(e) => {
                eprintln!("<Error> {e}");
                return ExitCode::FAILURE;
            }
        }
    } else if args.wandering {
        ScenarioIdentity::Generated {
            generator: ScenarioGenerator::Wandering {
                movement: WanderingVehicles {
                    vehicle_count: args.vehicles,
                    side_len: 500.0 * METRES,
                    wander_speed: 12.0 * MPS,
                    turn_chance: 0.05,
                    tick: 1.0 * SECONDS,
                    duration: 300.0 * SECONDS,
                },
            },
            seed,
        }
    } else {
        ScenarioIdentity::Generated {
            generator: ScenarioGenerator::Highway {
                traffic: HighwayTraffic {
                    road_length: 2000.0 * METRES,
                    lanes: 3,
                    lane_spacing: 3.5 * METRES,
                    vehicle_count: args.vehicles,
                    spawn_interval: 2.0 * SECONDS,
                    mean_speed: 27.0 * MPS,
                    std_speed: 4.0 * MPS,
                    tick: 1.0 * SECONDS,
                },
                roadside_spacing: args.roadside_spacing.map(|x| x * METRES),
            },
            seed,
        }
    };

    let sim = match identity.create() {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("<Error> {e}");
            return ExitCode::FAILURE;
        }
    };

    let written = if args.asid {
        sim_file::write_file(output_file, sim.identity, use_rmp)
    } else {
        sim_file::write_file(output_file, sim, use_rmp)
    };

    match written {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("<Error> {e}");
            ExitCode::FAILURE
        }
    }
}
