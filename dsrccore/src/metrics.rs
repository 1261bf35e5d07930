use serde::{Deserialize, Serialize};

use crate::units::Length;

/// What "sent" and "delivered" count in a run.
///
/// The two definitions come from different modes and are not comparable,
/// which is why every summary records the one it used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricVariant {
    /// Sent counts every in-range roadside and vehicle link each tick.
    /// Delivered counts every in-range roadside link each tick.
    LinkCount,
    /// Sent counts created messages.
    /// Delivered counts created messages whose delivery trial succeeded.
    MessageDelivery,
}

/// Final metrics of a run, emitted once when it ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub variant: MetricVariant,
    pub max_range: Length,
    /// Packet delivery ratio as a percentage
    pub pdr_percent: f64,
    pub total_sent: u64,
    pub total_delivered: u64,
    /// In-range links seen over the whole run, of any class.
    pub links_detected: u64,
    pub ticks: u64,
}

#[derive(Debug, Clone)]
pub struct Metrics {
    variant: MetricVariant,
    sent: u64,
    delivered: u64,
    links_detected: u64,
    ticks: u64,
    max_range: Length,
}

impl Metrics {
    pub fn new(variant: MetricVariant) -> Self {
        Metrics {
            variant,
            sent: 0,
            delivered: 0,
            links_detected: 0,
            ticks: 0,
            max_range: Length::ZERO,
        }
    }

    pub fn record_sent(&mut self) {
        self.sent += 1;
    }

    pub fn record_delivered(&mut self) {
        self.delivered += 1;
    }

    pub fn record_link(&mut self) {
        self.links_detected += 1;
    }

    pub fn record_tick(&mut self) {
        self.ticks += 1;
    }

    /// Keeps the running maximum. Non-finite distances are ignored.
    pub fn observe_range(&mut self, distance: Length) {
        if distance.is_finite() && distance > self.max_range {
            self.max_range = distance;
        }
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn max_range(&self) -> Length {
        self.max_range
    }

    /// Packet delivery ratio in percent, zero when nothing has been sent.
    pub fn pdr(&self) -> f64 {
        if self.sent == 0 {
            return 0.0;
        }

        (self.delivered as f64 / self.sent as f64 * 100.0).clamp(0.0, 100.0)
    }

    pub fn finalize(&self) -> RunSummary {
        RunSummary {
            variant: self.variant,
            max_range: self.max_range,
            pdr_percent: self.pdr(),
            total_sent: self.sent,
            total_delivered: self.delivered,
            links_detected: self.links_detected,
            ticks: self.ticks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assert_close, units::METRES};

    #[test]
    fn pdr_zero_without_traffic() {
        let metrics = Metrics::new(MetricVariant::LinkCount);
        assert_eq!(metrics.pdr(), 0.0);

        let summary = metrics.finalize();
        assert_eq!(summary.pdr_percent, 0.0);
        assert_eq!(summary.total_sent, 0);
    }

    #[test]
    fn pdr_percent() {
        let mut metrics = Metrics::new(MetricVariant::MessageDelivery);
        for n in 0..8 {
            metrics.record_sent();
            if n % 4 != 0 {
                metrics.record_delivered();
            }
        }

        assert_close(metrics.pdr(), 75.0);
        assert_eq!(metrics.sent(), 8);
        assert_eq!(metrics.delivered(), 6);
    }

    #[test]
    fn max_range_only_grows() {
        let mut metrics = Metrics::new(MetricVariant::LinkCount);
        let mut last = metrics.max_range();

        for d in [3.0, 1.0, 40.0, 39.9, f64::NAN, f64::INFINITY, 40.5, 0.0] {
            metrics.observe_range(d * METRES);
            assert!(metrics.max_range() >= last);
            last = metrics.max_range();
        }

        assert_eq!(metrics.max_range(), 40.5 * METRES);
    }
}
