//! DSRC link simulation and analysis tools.
//!
//! A run asks a [`mobility::MobilityProvider`] for vehicle positions once per tick, detects
//! roadside to vehicle and vehicle to vehicle links, and reports them through an
//! [`events::EventSink`]. See [`simulation::Simulation`] for the engine and
//! [`config::SimConfig`] for the parameters a run takes.
//!
//! ## Custom Mobility
//! Anything that can report positions by entity id can drive a run by implementing
//! [`mobility::MobilityProvider`]. Recorded or generated traces are replayed with
//! [`mobility::TraceMobility`].

pub mod analysis;
pub mod config;
pub mod delivery;
pub mod entity;
pub mod events;
pub mod freshness;
pub mod geometry;
pub mod link;
pub mod metrics;
pub mod mobility;
pub mod registry;
pub mod scenario;
pub mod sim_file;
pub mod simulation;
pub mod units;
pub mod verification;

use std::fmt::Debug;

/// Checks two values are within 0.001% of each other.
#[allow(unused)]
fn assert_close<T>(a: T, b: T)
where
    T: Into<f64> + Copy + Debug,
{
    let float_a: f64 = a.into();
    let float_b: f64 = b.into();

    if float_a == 0. || float_b == 0. {
        assert!(float_a == float_b, "{a:?} and {b:?} are not close.");
        return;
    }

    let percent_diff = (float_a - float_b).abs() / float_a.abs();

    assert!(percent_diff < 0.00001, "{a:?} and {b:?} are not close.");
}

#[cfg(test)]
mod tests {
    use crate::{assert_close, units::Length};

    #[test]
    fn test_assert_close_pos() {
        assert_close(10.0, 10.0);
        assert_close(Length::from_metres(200.002), Length::from_metres(200.001));
    }

    #[test]
    fn test_assert_close_neg() {
        let result = std::panic::catch_unwind(|| assert_close(10.0, 11.0));
        assert!(result.is_err());
        let result = std::panic::catch_unwind(|| {
            assert_close(Length::from_metres(10231.0), Length::from_metres(10231.15))
        });
        assert!(result.is_err());
        let result = std::panic::catch_unwind(|| assert_close(0.01, 0.002));
        assert!(result.is_err());
    }
}
