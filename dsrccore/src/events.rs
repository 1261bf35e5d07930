//! Structured events emitted by a run and the sinks that consume them.

use std::{
    fmt::Display,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    entity::EntityId,
    metrics::RunSummary,
    units::{Length, Time},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub time: Time,
    pub event: Event,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// A roadside unit reached a vehicle.
    Rtv {
        source: EntityId,
        target: EntityId,
        delay: Time,
        range: Length,
    },
    /// A vehicle reached another vehicle.
    Vtv {
        source: EntityId,
        target: EntityId,
        delay: Time,
        range: Length,
    },
    /// Final metrics. Always the last event of a run.
    Summary(RunSummary),
}

impl Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::Rtv {
                source,
                target,
                delay,
                range,
            } => write!(
                f,
                "RTV {} -> {} delay {:.2}s range {:.2}m",
                source, target, delay, range
            ),
            Event::Vtv {
                source,
                target,
                delay,
                range,
            } => write!(
                f,
                "VTV {} -> {} delay {:.2}s range {:.2}m",
                source, target, delay, range
            ),
            Event::Summary(summary) => write!(
                f,
                "End of simulation: max range {:.2}m, PDR {:.2}% ({}/{})",
                summary.max_range,
                summary.pdr_percent,
                summary.total_delivered,
                summary.total_sent
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    #[error(transparent)]
    CsvError(#[from] csv::Error),
}

/// Consumer of simulation events.
pub trait EventSink {
    fn emit(&mut self, record: &EventRecord) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Sends every event to both sinks, first then second.
impl<A, B> EventSink for (A, B)
where
    A: EventSink,
    B: EventSink,
{
    fn emit(&mut self, record: &EventRecord) -> Result<(), SinkError> {
        self.0.emit(record)?;
        self.1.emit(record)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.0.flush()?;
        self.1.flush()
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, record: &EventRecord) -> Result<(), SinkError> {
        (**self).emit(record)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }
}

/// An absent sink drops events.
impl<S: EventSink> EventSink for Option<S> {
    fn emit(&mut self, record: &EventRecord) -> Result<(), SinkError> {
        match self {
            Some(sink) => sink.emit(record),
            None => Ok(()),
        }
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        match self {
            Some(sink) => sink.flush(),
            None => Ok(()),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    pub records: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_records(self) -> Vec<EventRecord> {
        self.records
    }

    /// Send the stored events to another sink in order.
    pub fn replay_into(&self, sink: &mut impl EventSink) -> Result<(), SinkError> {
        for record in self.records.iter() {
            sink.emit(record)?;
        }
        sink.flush()
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, record: &EventRecord) -> Result<(), SinkError> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _record: &EventRecord) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Tab separated communication log.
///
/// One row per link event with a header line, followed by an
/// `End of Simulation` block when the summary arrives.
pub struct TsvLog<W: Write> {
    writer: csv::Writer<W>,
}

impl TsvLog<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let file = File::create(path)?;
        TsvLog::new(BufWriter::new(file))
    }
}

impl<W: Write> TsvLog<W> {
    pub fn new(inner: W) -> Result<Self, SinkError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .has_headers(false)
            .from_writer(inner);

        writer.write_record([
            "Time",
            "Source",
            "Target",
            "Type",
            "Delay (s)",
            "Range (m)",
        ])?;

        Ok(TsvLog { writer })
    }

    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer
            .into_inner()
            .map_err(|err| SinkError::IOError(err.into_error()))
    }

    fn link_row(
        &mut self,
        time: Time,
        kind: &str,
        source: &EntityId,
        target: &EntityId,
        delay: Time,
        range: Length,
    ) -> Result<(), SinkError> {
        self.writer.write_record([
            format!("{:.2}", time),
            source.to_string(),
            target.to_string(),
            kind.to_owned(),
            format!("{:.2}", delay),
            format!("{:.2}", range),
        ])?;
        Ok(())
    }
}

impl<W: Write> EventSink for TsvLog<W> {
    fn emit(&mut self, record: &EventRecord) -> Result<(), SinkError> {
        match &record.event {
            Event::Rtv {
                source,
                target,
                delay,
                range,
            } => self.link_row(record.time, "RTV", source, target, *delay, *range),
            Event::Vtv {
                source,
                target,
                delay,
                range,
            } => self.link_row(record.time, "VTV", source, target, *delay, *range),
            Event::Summary(summary) => {
                self.writer.write_record(["End of Simulation"])?;
                self.writer
                    .write_record(["Max Range (m)".to_owned(), format!("{:.2}", summary.max_range)])?;
                self.writer
                    .write_record(["PDR (%)".to_owned(), format!("{:.2}", summary.pdr_percent)])?;
                self.writer
                    .write_record(["Sent".to_owned(), summary.total_sent.to_string()])?;
                self.writer.write_record([
                    "Delivered".to_owned(),
                    summary.total_delivered.to_string(),
                ])?;
                Ok(())
            }
        }
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metrics::MetricVariant,
        units::{METRES, SECONDS},
    };

    fn rtv(time: f64) -> EventRecord {
        EventRecord {
            time: time * SECONDS,
            event: Event::Rtv {
                source: "RSU".into(),
                target: "veh0".into(),
                delay: 0.0 * SECONDS,
                range: 12.3456 * METRES,
            },
        }
    }

    fn summary() -> EventRecord {
        EventRecord {
            time: 3.0 * SECONDS,
            event: Event::Summary(RunSummary {
                variant: MetricVariant::LinkCount,
                max_range: 60.0 * METRES,
                pdr_percent: 50.0,
                total_sent: 4,
                total_delivered: 2,
                links_detected: 4,
                ticks: 3,
            }),
        }
    }

    #[test]
    fn tsv_layout() {
        let mut log = TsvLog::new(Vec::new()).unwrap();
        log.emit(&rtv(1.0)).unwrap();
        log.emit(&EventRecord {
            time: 2.0 * SECONDS,
            event: Event::Vtv {
                source: "veh0".into(),
                target: "veh1".into(),
                delay: 1.0 * SECONDS,
                range: 7.0 * METRES,
            },
        })
        .unwrap();
        log.emit(&summary()).unwrap();
        log.flush().unwrap();

        let text = String::from_utf8(log.into_inner().unwrap()).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], "Time\tSource\tTarget\tType\tDelay (s)\tRange (m)");
        assert_eq!(lines[1], "1.00\tRSU\tveh0\tRTV\t0.00\t12.35");
        assert_eq!(lines[2], "2.00\tveh0\tveh1\tVTV\t1.00\t7.00");
        assert_eq!(lines[3], "End of Simulation");
        assert_eq!(lines[4], "Max Range (m)\t60.00");
        assert_eq!(lines[5], "PDR (%)\t50.00");
    }

    #[test]
    fn tuple_sink_fans_out() {
        let mut first = EventLog::new();
        let mut second = EventLog::new();

        {
            let mut both = (&mut first, &mut second);
            both.emit(&rtv(1.0)).unwrap();
            both.emit(&summary()).unwrap();
        }

        assert_eq!(first.records, second.records);
        assert_eq!(first.records.len(), 2);
    }

    #[test]
    fn absent_sink_drops() {
        let mut none: Option<EventLog> = None;
        none.emit(&rtv(1.0)).unwrap();
        none.flush().unwrap();

        let mut some = Some(EventLog::new());
        some.emit(&rtv(1.0)).unwrap();
        assert_eq!(some.map(|log| log.records.len()), Some(1));
    }

    #[test]
    fn replay_matches() {
        let mut log = EventLog::new();
        log.emit(&rtv(1.0)).unwrap();
        log.emit(&rtv(2.5)).unwrap();

        let mut copy = EventLog::new();
        log.replay_into(&mut copy).unwrap();
        assert_eq!(log.records, copy.records);
    }

    #[test]
    fn display() {
        assert_eq!(
            rtv(1.0).event.to_string(),
            "RTV RSU -> veh0 delay 0.00s range 12.35m"
        );
    }
}
