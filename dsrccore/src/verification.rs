//! Verifications / tests to be run on simulation results to make sure the simulator is working correctly.
//! Each public function, other than [`verify_all`], represents some property that should hold for all simulation results.

use std::collections::{HashMap, HashSet};

use crate::{
    entity::EntityId,
    events::Event,
    metrics::MetricVariant,
    sim_file::SimOutput,
    units::Time,
};

pub fn verify_all(output: &SimOutput) -> bool {
    summary_emitted_once_last(output)
        && pdr_within_bounds(output)
        && events_in_time_order(output)
        && roadside_freshness_respected(output)
        && no_duplicate_links_per_tick(output)
        && max_range_covers_events(output)
}

/// Exactly one summary event and nothing after it.
pub fn summary_emitted_once_last(output: &SimOutput) -> bool {
    let summaries = output
        .events
        .iter()
        .filter(|record| matches!(record.event, Event::Summary(_)))
        .count();

    let last_is_summary = output
        .events
        .last()
        .is_some_and(|record| matches!(record.event, Event::Summary(_)));

    if summaries != 1 || !last_is_summary {
        eprintln!("Found {summaries} summary events, last is summary: {last_is_summary}");
        return false;
    }

    true
}

/// PDR is a percentage and delivered never exceeds sent.
pub fn pdr_within_bounds(output: &SimOutput) -> bool {
    let summary = &output.summary;

    if !(0.0..=100.0).contains(&summary.pdr_percent)
        || summary.total_delivered > summary.total_sent
    {
        eprintln!("PDR out of bounds");
        eprintln!("{summary:#?}");
        return false;
    }

    true
}

pub fn events_in_time_order(output: &SimOutput) -> bool {
    for pair in output.events.windows(2) {
        if pair[1].time < pair[0].time {
            eprintln!("Events out of order");
            eprintln!("= First = {:#?} \n = Second = \n {:#?}", pair[0], pair[1]);
            return false;
        }
    }

    true
}

/// Two roadside log entries for the same vehicle are more than the freshness window apart.
pub fn roadside_freshness_respected(output: &SimOutput) -> bool {
    let window = output.complete_identity.config.freshness_window;
    let mut last_logged: HashMap<&EntityId, Time> = HashMap::new();

    for record in output.events.iter() {
        let Event::Rtv { target, .. } = &record.event else {
            continue;
        };

        if let Some(previous) = last_logged.insert(target, record.time) {
            if record.time - previous <= window {
                eprintln!(
                    "Vehicle {target} logged at {} s and again at {} s",
                    previous, record.time
                );
                return false;
            }
        }
    }

    true
}

/// No directed link is logged twice in the same tick.
///
/// In meshed runs this means a live message is never recreated.
pub fn no_duplicate_links_per_tick(output: &SimOutput) -> bool {
    let mut seen = HashSet::new();

    for record in output.events.iter() {
        let key = match &record.event {
            Event::Rtv { source, target, .. } | Event::Vtv { source, target, .. } => {
                (record.time.seconds().to_bits(), source, target)
            }
            Event::Summary(_) => continue,
        };

        if !seen.insert(key) {
            eprintln!("Duplicate link event");
            eprintln!("{record:#?}");
            return false;
        }
    }

    true
}

/// The reported max range is at least the range of every event that feeds it.
pub fn max_range_covers_events(output: &SimOutput) -> bool {
    let max_range = output.summary.max_range;

    for record in output.events.iter() {
        let range = match (&record.event, output.summary.variant) {
            (Event::Rtv { range, .. }, MetricVariant::LinkCount) => *range,
            (Event::Vtv { range, .. }, MetricVariant::MessageDelivery) => *range,
            _ => continue,
        };

        if range > max_range {
            eprintln!("Event range {range} m exceeds reported max range {max_range} m");
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{Mode, SimConfig},
        events::EventRecord,
        scenario::generation::{ScenarioGenerator, positioning::WanderingVehicles},
        simulation::run_simulation,
        units::{METRES, MPS, SECONDS},
    };

    fn wandering_output(mode: Mode) -> SimOutput {
        let scenario = ScenarioGenerator::Wandering {
            movement: WanderingVehicles {
                vehicle_count: 25,
                side_len: 200.0 * METRES,
                wander_speed: 10.0 * MPS,
                turn_chance: 0.2,
                tick: 0.5 * SECONDS,
                duration: 40.0 * SECONDS,
            },
        }
        .generate_from_seed(17)
        .unwrap();

        run_simulation(3, scenario, SimConfig::simple().with_mode(mode)).unwrap()
    }

    #[test]
    fn generated_runs_verify() {
        for mode in [Mode::Simple, Mode::Meshed] {
            let output = wandering_output(mode);
            assert!(output.events.len() > 1);
            assert!(verify_all(&output), "{mode:?} run failed verification");
        }
    }

    #[test]
    fn detects_missing_summary() {
        let mut output = wandering_output(Mode::Meshed);
        output.events.pop();

        assert!(!summary_emitted_once_last(&output));
    }

    #[test]
    fn detects_fresh_roadside_repeat() {
        let mut output = wandering_output(Mode::Simple);
        let first_rtv = output
            .events
            .iter()
            .find(|record| matches!(record.event, Event::Rtv { .. }))
            .cloned()
            .unwrap();

        output.events.insert(
            0,
            EventRecord {
                time: first_rtv.time + 0.5 * SECONDS,
                ..first_rtv
            },
        );

        assert!(!roadside_freshness_respected(&output));
    }
}
