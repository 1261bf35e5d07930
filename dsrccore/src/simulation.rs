use std::{collections::HashSet, time::Duration};

use log::{debug, info, trace, warn};
use rand::Rng;
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::{ConfigError, Mode, SimConfig},
    delivery::DeliveryModel,
    entity::Entity,
    events::{Event, EventLog, EventRecord, EventSink, NullSink, SinkError},
    freshness::{ContactLedger, FreshnessGate},
    link::{farthest_roadside_distance, roadside_links},
    metrics::{MetricVariant, Metrics, RunSummary},
    mobility::{MobilityError, MobilityProvider},
    registry::{MessageEvent, MessageRegistry},
    scenario::Scenario,
    sim_file::{OutputIdentity, SimOutput},
    units::Time,
};

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),
    #[error(transparent)]
    MobilityProviderUnavailable(MobilityError),
    /// The run was finalised before returning, `partial` holds what was measured.
    #[error("run aborted after {} ticks: {source}", .partial.ticks)]
    MobilityProviderFault {
        source: MobilityError,
        partial: Box<RunSummary>,
    },
    #[error("event sink failed: {0}")]
    Sink(#[from] SinkError),
    #[error("simulation is {0:?}, not running")]
    NotRunning(RunState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Running,
    Finalizing,
    Terminated,
}

/// What happened during a single tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub time: Time,
    pub vehicles: usize,
    pub rtv_links: usize,
    pub vtv_links: usize,
    /// Link events handed to the sink.
    pub events: usize,
    pub messages_created: usize,
    pub messages_expired: usize,
}

enum TickFailure {
    Mobility(MobilityError),
    Sink(SinkError),
}

impl From<MobilityError> for TickFailure {
    fn from(value: MobilityError) -> Self {
        TickFailure::Mobility(value)
    }
}

impl From<SinkError> for TickFailure {
    fn from(value: SinkError) -> Self {
        TickFailure::Sink(value)
    }
}

/// Runs a generated or custom scenario to completion and collects every event.
pub fn run_simulation(
    random_seed: u64,
    scenario: Scenario,
    config: SimConfig,
) -> Result<SimOutput, SimError> {
    let identity = OutputIdentity::new(scenario.identity.clone(), config, random_seed);
    let record = run_recorded(identity, scenario.into_mobility(), NullSink, false)?;

    match record.fault {
        None => Ok(record.output),
        Some(source) => Err(SimError::MobilityProviderFault {
            source,
            partial: Box::new(record.output.summary),
        }),
    }
}

/// Output of [`run_recorded`].
pub struct RunRecord<S> {
    pub output: SimOutput,
    /// Set when the provider failed part way, `output` then holds the partial run.
    pub fault: Option<MobilityError>,
    /// The extra sink handed in, after it saw every event.
    pub sink: S,
}

/// Runs `mobility` with the configuration and seed in `identity`, logging to `sink`
/// as well as the returned output.
///
/// A provider fault still produces output, so partial runs can be written and
/// inspected. Only failures before the first tick or sink errors are returned as `Err`.
pub fn run_recorded<M, S>(
    identity: OutputIdentity,
    mobility: M,
    sink: S,
    realtime: bool,
) -> Result<RunRecord<S>, SimError>
where
    M: MobilityProvider,
    S: EventSink,
{
    let mut sim = Simulation::new(
        identity.config.clone(),
        mobility,
        (EventLog::new(), sink),
        identity.simulation_seed,
    )?;
    if realtime {
        sim = sim.with_realtime_pacing();
    }

    let (summary, fault) = match sim.run() {
        Ok(summary) => (summary, None),
        Err(SimError::MobilityProviderFault { source, partial }) => (*partial, Some(source)),
        Err(e) => return Err(e),
    };

    let (log, sink) = sim.into_sink();
    Ok(RunRecord {
        output: SimOutput {
            events: log.into_records(),
            summary,
            complete_identity: identity,
        },
        fault,
        sink,
    })
}

/// The link simulation engine.
///
/// Owns every piece of state that lives across ticks. Each call to [`Simulation::step`]
/// queries the mobility provider once and fully processes the tick before returning.
pub struct Simulation<M, S, R = ChaCha12Rng> {
    config: SimConfig,
    mobility: M,
    sink: S,

    delivery: DeliveryModel<R>,
    registry: MessageRegistry,
    ledger: ContactLedger,
    gate: FreshnessGate,
    metrics: Metrics,

    roadside_units: Vec<Entity>,
    state: RunState,
    sim_time: Time,
    summary: Option<RunSummary>,
    pacing: Option<Duration>,
}

impl<M, S> Simulation<M, S, ChaCha12Rng>
where
    M: MobilityProvider,
    S: EventSink,
{
    pub fn new(config: SimConfig, mobility: M, sink: S, random_seed: u64) -> Result<Self, SimError> {
        config.validate()?;
        let delivery = DeliveryModel::from_seed(&config, random_seed)?;
        Self::with_delivery(config, mobility, sink, delivery)
    }
}

impl<M, S, R> Simulation<M, S, R>
where
    M: MobilityProvider,
    S: EventSink,
    R: Rng,
{
    /// Use a caller supplied random source for delay and delivery draws.
    pub fn with_rng(config: SimConfig, mobility: M, sink: S, rng: R) -> Result<Self, SimError> {
        config.validate()?;
        let delivery = DeliveryModel::with_rng(&config, rng)?;
        Self::with_delivery(config, mobility, sink, delivery)
    }

    fn with_delivery(
        config: SimConfig,
        mut mobility: M,
        sink: S,
        delivery: DeliveryModel<R>,
    ) -> Result<Self, SimError> {
        config.validate()?;
        mobility
            .start()
            .map_err(SimError::MobilityProviderUnavailable)?;

        let mut roadside_units = config.roadside_entities();
        for unit in mobility.roadside_units() {
            if roadside_units.iter().all(|known| known.id != unit.id) {
                roadside_units.push(unit);
            }
        }

        let variant = match config.mode {
            Mode::Simple => MetricVariant::LinkCount,
            Mode::Meshed => MetricVariant::MessageDelivery,
        };

        info!(
            "Starting {:?} run with {} roadside units (rtv {} m, vtv {} m)",
            config.mode,
            roadside_units.len(),
            config.rtv_radius,
            config.vtv_radius
        );

        Ok(Simulation {
            registry: MessageRegistry::new(config.message_lifetime, config.lifetime_decrement()),
            gate: FreshnessGate::new(config.freshness_window),
            ledger: ContactLedger::new(),
            metrics: Metrics::new(variant),
            delivery,
            config,
            mobility,
            sink,
            roadside_units,
            state: RunState::Running,
            sim_time: Time::ZERO,
            summary: None,
            pacing: None,
        })
    }

    /// Sleep `1 / communication_speed` seconds of wall clock time after every tick.
    pub fn with_realtime_pacing(mut self) -> Self {
        self.pacing = Duration::try_from_secs_f64(self.config.lifetime_decrement().seconds()).ok();
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn sim_time(&self) -> Time {
        self.sim_time
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn registry(&self) -> &MessageRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &ContactLedger {
        &self.ledger
    }

    pub fn roadside_units(&self) -> &[Entity] {
        &self.roadside_units
    }

    pub fn mobility(&self) -> &M {
        &self.mobility
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// True when the provider expects no more entities or the run has ended.
    pub fn finished(&self) -> bool {
        self.state != RunState::Running || self.mobility.is_finished()
    }

    /// Steps until the provider runs out, then finalises.
    pub fn run(&mut self) -> Result<RunSummary, SimError> {
        while !self.finished() {
            self.step()?;

            if let Some(pace) = self.pacing {
                std::thread::sleep(pace);
            }
        }

        self.finalize()
    }

    /// Advance the provider by one step and process the resulting tick.
    ///
    /// A provider or sink failure finalises the run before the error is returned.
    pub fn step(&mut self) -> Result<TickReport, SimError> {
        if self.state != RunState::Running {
            return Err(SimError::NotRunning(self.state));
        }

        match self.process_tick() {
            Ok(report) => Ok(report),
            Err(TickFailure::Mobility(source)) => {
                warn!("Mobility provider failed at {} s: {}", self.sim_time, source);
                let partial = self.finalize_after_failure();
                Err(SimError::MobilityProviderFault {
                    source,
                    partial: Box::new(partial),
                })
            }
            Err(TickFailure::Sink(err)) => {
                warn!("Event sink failed at {} s: {}", self.sim_time, err);
                self.finalize_after_failure();
                Err(SimError::Sink(err))
            }
        }
    }

    /// Emits the summary and closes everything. Only the first call emits,
    /// later calls return the same summary.
    pub fn finalize(&mut self) -> Result<RunSummary, SimError> {
        if let Some(summary) = &self.summary {
            return Ok(summary.clone());
        }

        self.state = RunState::Finalizing;

        let summary = self.metrics.finalize();
        self.summary = Some(summary.clone());

        let record = EventRecord {
            time: self.sim_time,
            event: Event::Summary(summary.clone()),
        };
        let written = self
            .sink
            .emit(&record)
            .and_then(|_| self.sink.flush());

        self.mobility.close();
        self.state = RunState::Terminated;

        info!(
            "Finished after {} ticks: sent {}, delivered {}, PDR {:.2}%, max range {:.2} m",
            summary.ticks,
            summary.total_sent,
            summary.total_delivered,
            summary.pdr_percent,
            summary.max_range
        );

        written?;
        Ok(summary)
    }

    fn finalize_after_failure(&mut self) -> RunSummary {
        match self.finalize() {
            Ok(summary) => summary,
            Err(err) => {
                warn!("Could not write final summary: {}", err);
                self.summary
                    .clone()
                    .unwrap_or_else(|| self.metrics.finalize())
            }
        }
    }

    fn process_tick(&mut self) -> Result<TickReport, TickFailure> {
        self.mobility.advance()?;

        let now = self.mobility.sim_time();
        self.sim_time = now;

        let vehicles = self.snapshot()?;

        let mut report = TickReport {
            time: now,
            vehicles: vehicles.len(),
            ..Default::default()
        };

        match self.config.mode {
            Mode::Simple => {
                self.roadside_pass(&vehicles, now, &mut report)?;
                self.vehicle_pass_simple(&vehicles, now, &mut report)?;
            }
            Mode::Meshed => {
                self.vehicle_pass_meshed(&vehicles, now, &mut report)?;
            }
        }

        self.metrics.record_tick();

        debug!(
            "Tick at {} s: {} vehicles, {} rtv links, {} vtv links, {} events, {} live messages",
            now,
            report.vehicles,
            report.rtv_links,
            report.vtv_links,
            report.events,
            self.registry.len()
        );

        Ok(report)
    }

    /// Current vehicles. A provider listing one id twice is faulty.
    fn snapshot(&self) -> Result<Vec<Entity>, MobilityError> {
        let mut seen = HashSet::new();
        self.mobility
            .entity_ids()
            .into_iter()
            .map(|id| {
                if !seen.insert(id.clone()) {
                    return Err(MobilityError::Fault(format!(
                        "vehicle {id} reported twice at {} s",
                        self.mobility.sim_time()
                    )));
                }
                let position = self.mobility.position(&id)?;
                Ok(Entity::vehicle(id, position))
            })
            .collect()
    }

    /// Every in-range vehicle counts as sent and delivered.
    /// Only fresh contacts are logged.
    fn roadside_pass(
        &mut self,
        vehicles: &[Entity],
        now: Time,
        report: &mut TickReport,
    ) -> Result<(), SinkError> {
        if let Some(farthest) = farthest_roadside_distance(vehicles, &self.roadside_units) {
            self.metrics.observe_range(farthest);
        }

        for link in roadside_links(vehicles, &self.roadside_units, self.config.rtv_radius) {
            report.rtv_links += 1;
            self.metrics.record_link();
            self.metrics.record_sent();
            self.metrics.record_delivered();

            if let Some(delay) = self.gate.admit(&mut self.ledger, &link.target, now) {
                self.emit(
                    now,
                    Event::Rtv {
                        source: link.source.clone(),
                        target: link.target.clone(),
                        delay,
                        range: link.distance,
                    },
                )?;
                report.events += 1;
            }

            self.mobility.mark_communicating(&link.target);
        }

        Ok(())
    }

    /// Each side of a link logs the time since its first recorded contact.
    /// The first contact itself is only recorded.
    fn vehicle_pass_simple(
        &mut self,
        vehicles: &[Entity],
        now: Time,
        report: &mut TickReport,
    ) -> Result<(), SinkError> {
        let links = self
            .config
            .link_detection
            .vehicle_links(vehicles, self.config.vtv_radius);

        for link in links {
            report.vtv_links += 1;
            self.metrics.record_link();
            self.metrics.record_sent();

            for (source, target) in [(&link.source, &link.target), (&link.target, &link.source)] {
                if let Some(previous) = self.ledger.first_contact(source, now) {
                    self.emit(
                        now,
                        Event::Vtv {
                            source: source.clone(),
                            target: target.clone(),
                            delay: now - previous,
                            range: link.distance,
                        },
                    )?;
                    report.events += 1;
                }
            }

            self.mobility.mark_communicating(&link.source);
            self.mobility.mark_communicating(&link.target);
        }

        Ok(())
    }

    /// New messages for links without a live one, then one tick of ageing.
    fn vehicle_pass_meshed(
        &mut self,
        vehicles: &[Entity],
        now: Time,
        report: &mut TickReport,
    ) -> Result<(), SinkError> {
        let links = self
            .config
            .link_detection
            .vehicle_links(vehicles, self.config.vtv_radius);

        for link in links {
            report.vtv_links += 1;
            self.metrics.record_link();
            self.metrics.observe_range(link.distance);

            if let Some(MessageEvent::Created(message)) =
                self.registry.on_link(&link, now, &mut self.delivery)
            {
                report.messages_created += 1;
                self.metrics.record_sent();
                if self.delivery.accept() {
                    self.metrics.record_delivered();
                }

                self.emit(
                    now,
                    Event::Vtv {
                        source: message.id.source,
                        target: message.id.target,
                        delay: message.delay,
                        range: message.range,
                    },
                )?;
                report.events += 1;
            }

            self.mobility.mark_communicating(&link.source);
            self.mobility.mark_communicating(&link.target);
        }

        report.messages_expired = self.registry.decay();
        if report.messages_expired > 0 {
            trace!("{} messages expired at {} s", report.messages_expired, now);
        }

        Ok(())
    }

    fn emit(&mut self, time: Time, event: Event) -> Result<(), SinkError> {
        self.sink.emit(&EventRecord { time, event })
    }
}
