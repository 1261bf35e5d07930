use std::collections::HashSet;

use crate::{
    entity::EntityId,
    events::{Event, EventRecord},
    metrics::RunSummary,
    sim_file::{OutputIdentity, SimOutput},
    units::{Length, Time},
};

/// Per-run statistics derived from the event stream.
#[derive(Debug, Clone)]
pub struct RunAnalysis {
    //Event Type Breakdown
    pub rtv_events: usize,
    pub vtv_events: usize,
    pub summary_events: usize,

    /// Mean reported delay, `None` when there were no events of that class.
    pub mean_rtv_delay: Option<Time>,
    pub mean_vtv_delay: Option<Time>,
    pub max_delay: Time,

    /// Longest range carried by any link event.
    pub max_event_range: Length,

    /// Distinct vehicles logged as reached by a roadside unit.
    pub vehicles_reached: usize,
    /// Distinct vehicles appearing on either side of a vehicle link event.
    pub vehicles_linked: usize,

    /// Time of the last event.
    pub end_time: Time,

    pub summary: RunSummary,
    pub complete_identity: OutputIdentity,
}

impl RunAnalysis {
    pub fn new(output: &SimOutput) -> RunAnalysis {
        let mut rtv_delays = Vec::new();
        let mut vtv_delays = Vec::new();
        let mut summary_events = 0;
        let mut max_event_range = Length::ZERO;
        let mut reached: HashSet<&EntityId> = HashSet::new();
        let mut linked: HashSet<&EntityId> = HashSet::new();

        for record in output.events.iter() {
            match &record.event {
                Event::Rtv {
                    target,
                    delay,
                    range,
                    ..
                } => {
                    rtv_delays.push(*delay);
                    reached.insert(target);
                    max_event_range = max_event_range.max(*range);
                }
                Event::Vtv {
                    source,
                    target,
                    delay,
                    range,
                } => {
                    vtv_delays.push(*delay);
                    linked.insert(source);
                    linked.insert(target);
                    max_event_range = max_event_range.max(*range);
                }
                Event::Summary(_) => summary_events += 1,
            }
        }

        let max_delay = rtv_delays
            .iter()
            .chain(vtv_delays.iter())
            .fold(Time::ZERO, |a, b| a.max(*b));

        let end_time = output
            .events
            .last()
            .map(|record: &EventRecord| record.time)
            .unwrap_or(Time::ZERO);

        RunAnalysis {
            rtv_events: rtv_delays.len(),
            vtv_events: vtv_delays.len(),
            summary_events,
            mean_rtv_delay: mean(&rtv_delays),
            mean_vtv_delay: mean(&vtv_delays),
            max_delay,
            max_event_range,
            vehicles_reached: reached.len(),
            vehicles_linked: linked.len(),
            end_time,
            summary: output.summary.clone(),
            complete_identity: output.complete_identity.clone(),
        }
    }
}

fn mean(values: &[Time]) -> Option<Time> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().copied().sum::<Time>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assert_close,
        config::SimConfig,
        geometry::Point,
        mobility::{Frame, Trace},
        scenario::Scenario,
        simulation::run_simulation,
        units::{METRES, SECONDS},
    };

    #[test]
    fn counts_simple_run() {
        // Stationary vehicles, one near the roadside unit at (50, 0)
        let frames = (0..4)
            .map(|n| Frame {
                time: (n as f64 + 1.0) * SECONDS,
                vehicles: vec![
                    ("veh0".into(), Point::new(40.0, 0.0)),
                    ("veh1".into(), Point::new(200.0, 0.0)),
                    ("veh2".into(), Point::new(210.0, 0.0)),
                ],
            })
            .collect();

        let output = run_simulation(
            0,
            Scenario::custom(Trace::new(frames)),
            SimConfig::simple(),
        )
        .unwrap();
        let analysis = RunAnalysis::new(&output);

        // Logged at 1 s and 3 s, 2 s and 4 s are inside the freshness window
        assert_eq!(analysis.rtv_events, 2);
        assert_eq!(analysis.vehicles_reached, 1);
        assert_close(analysis.mean_rtv_delay.unwrap(), 1.0 * SECONDS);

        // Both directions from the second tick on
        assert_eq!(analysis.vtv_events, 6);
        assert_eq!(analysis.vehicles_linked, 2);
        assert_eq!(analysis.max_delay, 3.0 * SECONDS);
        assert_eq!(analysis.max_event_range, 10.0 * METRES);

        assert_eq!(analysis.summary_events, 1);
        assert_eq!(analysis.end_time, 4.0 * SECONDS);
    }

    #[test]
    fn empty_means() {
        let output = run_simulation(
            0,
            Scenario::custom(Trace::default()),
            SimConfig::simple(),
        )
        .unwrap();
        let analysis = RunAnalysis::new(&output);

        assert_eq!(analysis.mean_rtv_delay, None);
        assert_eq!(analysis.mean_vtv_delay, None);
        assert_eq!(analysis.summary_events, 1);
        assert_eq!(analysis.summary.ticks, 0);
    }
}
