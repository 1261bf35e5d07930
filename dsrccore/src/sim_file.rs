use rmp_serde::{decode, encode};
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::PathBuf,
};
use thiserror::Error;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    config::SimConfig, events::EventRecord, metrics::RunSummary, scenario::ScenarioIdentity,
};

#[derive(Debug, Error)]
pub enum SimFileError {
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
    #[error(transparent)]
    RMPWriteError(#[from] encode::Error),
    #[error(transparent)]
    RMPReadError(#[from] decode::Error),
}

pub fn load_output(path: PathBuf) -> Result<SimOutput, SimFileError> {
    load_file(path)
}

pub fn write_output(path: PathBuf, output: &SimOutput, use_rmp: bool) -> Result<(), SimFileError> {
    write_file(path, output, use_rmp)
}

/// Reads JSON, falling back to MessagePack when the file is not valid JSON.
pub fn load_file<T>(path: PathBuf) -> Result<T, SimFileError>
where
    T: DeserializeOwned,
{
    use serde_json::error::Category;

    let file = File::open(&path)?;
    let buf_reader = BufReader::new(file);

    let json_result: Result<T, _> = serde_json::from_reader(buf_reader);

    json_result.or_else(|err| match err.classify() {
        Category::Io | Category::Eof => Err(err.into()),
        _ => {
            let file = File::open(path)?;
            let buf_reader = BufReader::new(file);
            let res: Result<T, _> = decode::from_read(buf_reader);
            res.map_err(|x| x.into())
        }
    })
}

pub fn write_file<T>(path: PathBuf, object: T, use_rmp: bool) -> Result<(), SimFileError>
where
    T: Serialize,
{
    let file = File::create(path)?;
    let mut buf = BufWriter::new(file);

    if use_rmp {
        encode::write(&mut buf, &object)?;
    } else {
        serde_json::to_writer_pretty(buf, &object)?;
    }

    Ok(())
}

/// Contains enough information to completely recreate the simulation run it describes.
/// Unless a custom (i.e. hand created) scenario was used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputIdentity {
    pub scenario_identity: ScenarioIdentity,
    pub config: SimConfig,
    pub simulation_seed: u64,
    pub sim_version: String,
}

impl OutputIdentity {
    pub fn new(scenario_identity: ScenarioIdentity, config: SimConfig, simulation_seed: u64) -> Self {
        OutputIdentity {
            scenario_identity,
            config,
            simulation_seed,
            sim_version: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimOutput {
    // Data values
    /// Every event in emission order, ending with the summary.
    pub events: Vec<EventRecord>,
    pub summary: RunSummary,

    // Regeneration
    pub complete_identity: OutputIdentity,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SimConfig,
        geometry::Point,
        mobility::{Frame, Trace},
        scenario::Scenario,
        simulation::run_simulation,
        units::SECONDS,
    };

    fn small_output() -> SimOutput {
        let frames = (0..3)
            .map(|n| Frame {
                time: (n as f64 + 1.0) * SECONDS,
                vehicles: vec![
                    ("veh0".into(), Point::new(0.0, 0.0)),
                    ("veh1".into(), Point::new(12.0, 5.0)),
                ],
            })
            .collect();

        run_simulation(4, Scenario::custom(Trace::new(frames)), SimConfig::meshed()).unwrap()
    }

    #[test]
    fn json_and_rmp_load_back() {
        let output = small_output();
        let dir = std::env::temp_dir();

        for (name, use_rmp) in [("dsrc_output_test.json", false), ("dsrc_output_test.rmp", true)] {
            let path = dir.join(format!("{}-{name}", std::process::id()));
            write_output(path.clone(), &output, use_rmp).unwrap();
            let loaded = load_output(path.clone()).unwrap();
            std::fs::remove_file(path).unwrap();

            assert_eq!(loaded.events.len(), output.events.len());
            assert_eq!(loaded.summary.total_sent, output.summary.total_sent);
            assert_eq!(
                loaded.complete_identity.simulation_seed,
                output.complete_identity.simulation_seed
            );
            if use_rmp {
                assert_eq!(loaded, output);
            }
        }
    }
}
