use crate::risk_monitor::{RiskMonitor, RiskUpdate};
use crate::simulation::{ParticleSimulation, StepReport};
use airborne_common::error::Result as ModelResult;
use airborne_common::risk::{self, RiskInputs};
use airborne_common::{
    quanta_power_law, EventAction, RoomGeometry, ScheduledEvent, SimulationConfig, Snapshot, MS_PER_HOUR,
};
use anyhow::{Context, Result};
use log::{debug, info, trace};
use std::sync::mpsc::Sender;

/// Pathogen properties supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathogenParams {
    pub max_quanta_rate: f64,
    pub half_life_hours: f64,
}

/// Occupancy supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OccupancyParams {
    pub total_occupants: u32,
    pub positivity_rate_percent: f64,
    pub breathing_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Reset,
    Vacate(bool),
}

/// Wires host inputs into the particle simulation and the risk monitor.
///
/// This is the only place that knows about both; it also plays back the
/// configured event schedule and collects snapshots for the runner.
pub struct Session {
    config: SimulationConfig,
    simulation: ParticleSimulation,
    monitor: RiskMonitor,

    // Current host inputs
    room: RoomGeometry,
    pathogen: PathogenParams,
    occupancy: OccupancyParams,
    ventilation_rate: f64,
    activity_level: f64,

    /// Sorted by time; `next_event` indexes the first not yet applied.
    events: Vec<ScheduledEvent>,
    next_event: usize,
    record_interval_hours: f64,
    next_record_hours: f64,
    recorded_snapshots: Vec<Snapshot>,
}

impl Session {
    /// Builds the simulation and monitor from a validated configuration.
    /// `observer` receives one [`RiskUpdate`] per tick.
    pub fn new(config: SimulationConfig, observer: Option<Sender<RiskUpdate>>) -> Result<Self> {
        config.validate()?;
        let params = config
            .simulation_params()
            .context("Failed to derive simulation parameters")?;
        let room = config.room.geometry();
        let simulation = ParticleSimulation::new(room, params, &config.simulation);

        let pathogen = PathogenParams {
            max_quanta_rate: config.pathogen.max_quanta_rate,
            half_life_hours: config.pathogen.half_life_hours,
        };
        let occupancy = OccupancyParams {
            total_occupants: config.occupancy.total_occupants,
            positivity_rate_percent: config.occupancy.positivity_rate_percent,
            breathing_rate: config.occupancy.breathing_rate,
        };

        let mut events = config.events.clone();
        events.sort_by(|a, b| a.at_hours.total_cmp(&b.at_hours));

        let record_interval_hours = config.output.record_interval_minutes.max(0.0) / 60.0;

        let mut session = Self {
            simulation,
            monitor: RiskMonitor::new(config.risk_inputs(0.0)?, observer),
            room,
            pathogen,
            occupancy,
            ventilation_rate: params.ventilation_rate,
            activity_level: config.occupancy.activity_level,
            events,
            next_event: 0,
            record_interval_hours,
            next_record_hours: 0.0,
            recorded_snapshots: Vec::new(),
            config,
        };
        session.sync_risk_inputs()?;
        info!(
            "Session ready: {} occupants, {} infectious, {:.2} ACH.",
            session.occupancy.total_occupants,
            session.infectious_count(),
            session.ventilation_rate
        );
        Ok(session)
    }

    // --- Host inputs ---

    /// Activity level scales emission through the quanta power law.
    pub fn set_activity_level(&mut self, activity_level: f64) -> ModelResult<()> {
        let quanta_rate = quanta_power_law(self.pathogen.max_quanta_rate, activity_level)?;
        self.activity_level = activity_level;
        self.simulation.set_quanta_rate(quanta_rate);
        self.sync_risk_inputs()
    }

    pub fn set_pathogen(&mut self, pathogen: PathogenParams) -> ModelResult<()> {
        let quanta_rate = quanta_power_law(pathogen.max_quanta_rate, self.activity_level)?;
        self.simulation.set_half_life(pathogen.half_life_hours)?;
        self.simulation.set_quanta_rate(quanta_rate);
        self.pathogen = pathogen;
        self.sync_risk_inputs()
    }

    pub fn set_occupancy(&mut self, occupancy: OccupancyParams) -> ModelResult<()> {
        self.occupancy = occupancy;
        self.simulation.set_infectious_count(self.infectious_count());
        self.sync_risk_inputs()
    }

    pub fn set_ventilation(&mut self, air_changes_per_hour: f64) -> ModelResult<()> {
        self.simulation.set_ventilation_rate(air_changes_per_hour);
        self.ventilation_rate = self.simulation.params().ventilation_rate;
        self.sync_risk_inputs()
    }

    pub fn set_speed_multiplier(&mut self, speed_multiplier: f64) {
        self.simulation.set_speed_multiplier(speed_multiplier);
    }

    /// Starts a room transition; risk uses the new volume straight away.
    pub fn set_room(&mut self, room: RoomGeometry) -> ModelResult<bool> {
        let room = room.sanitized();
        let accepted = self.simulation.request_room(room);
        if accepted {
            self.room = room;
            self.sync_risk_inputs()?;
        }
        Ok(accepted)
    }

    pub fn command(&mut self, command: Command) {
        debug!("Command: {:?}", command);
        match command {
            Command::Reset => {
                self.simulation.reset();
                self.monitor.reset();
            }
            Command::Vacate(vacated) => {
                self.simulation.set_vacated(vacated);
                self.monitor.set_vacated(vacated);
            }
        }
    }

    /// Current inputs to the analytic model, with no exposure set.
    pub fn risk_inputs(&self) -> ModelResult<RiskInputs> {
        Ok(RiskInputs {
            total_occupants: self.occupancy.total_occupants,
            positivity_rate_percent: self.occupancy.positivity_rate_percent,
            quanta_rate: quanta_power_law(self.pathogen.max_quanta_rate, self.activity_level)?,
            breathing_rate: self.occupancy.breathing_rate,
            exposure_hours: 0.0,
            room_volume: self.room.volume_cubic_feet(),
            ventilation_rate: self.ventilation_rate,
            half_life_hours: self.pathogen.half_life_hours,
        })
    }

    fn sync_risk_inputs(&mut self) -> ModelResult<()> {
        let inputs = self.risk_inputs()?;
        self.monitor.set_inputs(inputs);
        Ok(())
    }

    // --- Ticking ---

    /// Applies due events, steps the simulation, publishes risk and records
    /// a snapshot when the record interval has passed.
    pub fn tick(&mut self, dt_ms: f64) -> Result<StepReport> {
        self.apply_due_events()?;

        let report = self.simulation.step(dt_ms);
        let simulated_hours = if dt_ms > 0.0 && dt_ms.is_finite() {
            dt_ms * self.simulation.params().speed_multiplier / MS_PER_HOUR
        } else {
            0.0
        };
        let update = self.monitor.advance(simulated_hours)?;
        trace!(
            "t={:.4} h | particles {} | fixed {:.4} | running {:.4}",
            self.simulated_hours(),
            self.simulation.active_count(),
            update.fixed_hour.probability,
            update.running.probability
        );

        if self.simulated_hours() >= self.next_record_hours {
            self.record_snapshot()?;
        }
        Ok(report)
    }

    fn apply_due_events(&mut self) -> Result<()> {
        let now = self.simulated_hours();
        while let Some(event) = self.events.get(self.next_event) {
            if event.at_hours > now {
                break;
            }
            let event = event.clone();
            self.next_event += 1;
            info!("Applying scheduled event at {:.3} h: {:?}", event.at_hours, event.action);
            self.apply_action(&event.action)
                .with_context(|| format!("Scheduled event at {} h failed", event.at_hours))?;
        }
        Ok(())
    }

    fn apply_action(&mut self, action: &EventAction) -> ModelResult<()> {
        match action {
            EventAction::Vacate(vacated) => self.command(Command::Vacate(*vacated)),
            EventAction::Reset => self.command(Command::Reset),
            EventAction::Ventilation(ach) => self.set_ventilation(*ach)?,
            EventAction::Speed(multiplier) => self.set_speed_multiplier(*multiplier),
            EventAction::Activity(level) => self.set_activity_level(*level)?,
            EventAction::Room(room) => {
                self.set_room(room.geometry())?;
            }
        }
        Ok(())
    }

    /// Captures the current state and advances the next record time.
    pub fn record_snapshot(&mut self) -> Result<()> {
        let update = match self.monitor.latest() {
            Some(update) => *update,
            None => self.monitor.assess()?,
        };
        let positions = if self.config.output.save_positions_in_snapshot {
            Some(self.simulation.positions().to_vec())
        } else {
            None
        };
        let now = self.simulated_hours();
        self.recorded_snapshots.push(Snapshot {
            time_hours: now,
            active_particles: self.simulation.active_count() as u32,
            opacity: self.simulation.opacity(),
            infectious_count: self.infectious_count(),
            fixed_hour_probability: update.fixed_hour.probability,
            running_probability: update.running.probability,
            vacated: self.simulation.params().is_vacated,
            positions,
        });
        if self.record_interval_hours > 0.0 {
            while self.next_record_hours <= now {
                self.next_record_hours += self.record_interval_hours;
            }
        } else {
            self.next_record_hours = now;
        }
        debug!("Snapshot {} recorded at {:.3} h.", self.recorded_snapshots.len(), now);
        Ok(())
    }

    // --- Views ---

    pub fn infectious_count(&self) -> u32 {
        risk::infectious_count(self.occupancy.total_occupants, self.occupancy.positivity_rate_percent)
    }

    pub fn simulated_hours(&self) -> f64 {
        self.simulation.simulated_hours()
    }

    pub fn simulation(&self) -> &ParticleSimulation {
        &self.simulation
    }

    pub fn monitor(&self) -> &RiskMonitor {
        &self.monitor
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn room(&self) -> &RoomGeometry {
        &self.room
    }

    pub fn recorded_snapshots(&self) -> &[Snapshot] {
        &self.recorded_snapshots
    }

    /// Tears down the simulation, returning the recorded snapshots.
    pub fn finish(self) -> Vec<Snapshot> {
        self.simulation.dispose();
        self.recorded_snapshots
    }
}
