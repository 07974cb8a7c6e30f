use serde::{Deserialize, Serialize};
use anyhow::{Context, Result};
use crate::room::{PivotCorner, RoomGeometry};
use crate::risk::{self, RiskInputs};
use crate::sim_params::SimulationParams;
use glam::Vec3;
use std::path::Path;

// Room dimensions and placement
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RoomConfig {
    pub width_ft: f32,
    pub length_ft: f32,
    pub height_ft: f32,
    #[serde(default)]
    pub pivot: PivotCorner,
    #[serde(default)]
    pub offset: [f32; 3],
}

impl RoomConfig {
    pub fn geometry(&self) -> RoomGeometry {
        RoomGeometry::new(self.width_ft, self.length_ft, self.height_ft)
            .with_pivot(self.pivot, Vec3::from_array(self.offset))
            .sanitized()
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PathogenConfig {
    /// Quanta per hour per infectious person at peak activity.
    pub max_quanta_rate: f64,
    pub half_life_hours: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct OccupancyConfig {
    pub total_occupants: u32,
    pub positivity_rate_percent: f64,
    /// Cubic feet inhaled per hour per person.
    #[serde(default = "default_breathing_rate")]
    pub breathing_rate: f64,
    /// 0 = resting, 1 = peak exertion.
    #[serde(default = "default_activity_level")]
    pub activity_level: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct VentilationConfig {
    pub air_changes_per_hour: f64,
}

// Engine and timing settings
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct EngineConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_speed_multiplier")]
    pub speed_multiplier: f64,
    /// Real milliseconds per tick.
    #[serde(default = "default_frame_ms")]
    pub frame_ms: f64,
    /// Simulated hours covered by a headless run.
    #[serde(default = "default_total_hours")]
    pub total_hours: f64,
    #[serde(default)]
    pub seed: u64,
    /// Scene units per foot of room.
    #[serde(default = "default_units_per_foot")]
    pub units_per_foot: f32,
    /// Fraction of the inner room volume particles are spawned in.
    #[serde(default = "default_spawn_volume_factor")]
    pub spawn_volume_factor: f32,
    #[serde(default = "default_fade_out_ms")]
    pub fade_out_ms: f64,
    #[serde(default = "default_wait_ms")]
    pub wait_ms: f64,
    #[serde(default = "default_fade_in_ms")]
    pub fade_in_ms: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            capacity: default_capacity(),
            speed_multiplier: default_speed_multiplier(),
            frame_ms: default_frame_ms(),
            total_hours: default_total_hours(),
            seed: 0,
            units_per_foot: default_units_per_foot(),
            spawn_volume_factor: default_spawn_volume_factor(),
            fade_out_ms: default_fade_out_ms(),
            wait_ms: default_wait_ms(),
            fade_in_ms: default_fade_in_ms(),
        }
    }
}

// Configuration for output settings
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct OutputConfig {
    #[serde(default = "default_base_filename")]
    pub base_filename: String,
    #[serde(default)]
    pub save_positions: bool,
    #[serde(default = "default_true")]
    pub save_stats: bool,
    #[serde(default)]
    pub save_positions_in_snapshot: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
    #[serde(default = "default_record_interval_minutes")]
    pub record_interval_minutes: f64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            base_filename: default_base_filename(),
            save_positions: false,
            save_stats: true,
            save_positions_in_snapshot: false,
            format: None,
            record_interval_minutes: default_record_interval_minutes(),
        }
    }
}

/// A host action applied once simulated time reaches `at_hours`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ScheduledEvent {
    pub at_hours: f64,
    pub action: EventAction,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    Vacate(bool),
    Reset,
    Ventilation(f64),
    Speed(f64),
    Activity(f64),
    Room(RoomConfig),
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub room: RoomConfig,
    pub pathogen: PathogenConfig,
    pub occupancy: OccupancyConfig,
    pub ventilation: VentilationConfig,
    #[serde(default)]
    pub simulation: EngineConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub events: Vec<ScheduledEvent>,
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .with_context(|| format!("Failed to read config file '{}'", path_ref.display()))?;
        let config = Self::from_toml_str(&config_str)
            .with_context(|| format!("Invalid config in '{}'", path_ref.display()))?;
        Ok(config)
    }

    /// Parses and validates a configuration held in memory.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.pathogen.half_life_hours > 0.0) {
            anyhow::bail!("half_life_hours must be positive.");
        }
        if !(self.pathogen.max_quanta_rate >= 0.0) {
            anyhow::bail!("max_quanta_rate must not be negative.");
        }
        if !(0.0..=1.0).contains(&self.occupancy.activity_level) {
            anyhow::bail!("activity_level must be within 0..=1.");
        }
        if !(self.occupancy.breathing_rate > 0.0) {
            anyhow::bail!("breathing_rate must be positive.");
        }
        if !(self.ventilation.air_changes_per_hour >= 0.0) {
            anyhow::bail!("air_changes_per_hour must not be negative.");
        }
        if self.simulation.capacity == 0 {
            anyhow::bail!("capacity must be greater than 0.");
        }
        if !(self.simulation.frame_ms > 0.0) {
            anyhow::bail!("frame_ms must be positive.");
        }
        if !(self.simulation.units_per_foot > 0.0) {
            anyhow::bail!("units_per_foot must be positive.");
        }
        if !(self.simulation.spawn_volume_factor > 0.0 && self.simulation.spawn_volume_factor <= 1.0) {
            anyhow::bail!("spawn_volume_factor must be within (0, 1].");
        }
        for event in &self.events {
            if !(event.at_hours >= 0.0) {
                anyhow::bail!("event times must not be negative.");
            }
        }
        Ok(())
    }

    /// Quanta rate after the activity power law.
    pub fn quanta_rate(&self) -> Result<f64> {
        Ok(risk::quanta_power_law(self.pathogen.max_quanta_rate, self.occupancy.activity_level)?)
    }

    /// Converts the configuration into the parameters read every tick.
    pub fn simulation_params(&self) -> Result<SimulationParams> {
        Ok(SimulationParams {
            quanta_rate: self.quanta_rate()?,
            infectious_count: risk::infectious_count(
                self.occupancy.total_occupants,
                self.occupancy.positivity_rate_percent,
            ),
            ventilation_rate: self.ventilation.air_changes_per_hour,
            half_life_hours: self.pathogen.half_life_hours,
            speed_multiplier: self.simulation.speed_multiplier.max(1.0),
            is_vacated: false,
        })
    }

    /// Risk inputs for the configured room with the given exposure.
    pub fn risk_inputs(&self, exposure_hours: f64) -> Result<RiskInputs> {
        Ok(RiskInputs {
            total_occupants: self.occupancy.total_occupants,
            positivity_rate_percent: self.occupancy.positivity_rate_percent,
            quanta_rate: self.quanta_rate()?,
            breathing_rate: self.occupancy.breathing_rate,
            exposure_hours,
            room_volume: self.room.geometry().volume_cubic_feet(),
            ventilation_rate: self.ventilation.air_changes_per_hour,
            half_life_hours: self.pathogen.half_life_hours,
        })
    }
}

fn default_true() -> bool {
    true
}

fn default_breathing_rate() -> f64 {
    360.0 // ft^3/h, light activity
}

fn default_activity_level() -> f64 {
    1.0
}

fn default_capacity() -> usize {
    20_000
}

fn default_speed_multiplier() -> f64 {
    60.0
}

fn default_frame_ms() -> f64 {
    1000.0 / 60.0
}

fn default_total_hours() -> f64 {
    1.0
}

fn default_units_per_foot() -> f32 {
    0.3048
}

fn default_spawn_volume_factor() -> f32 {
    0.9
}

fn default_fade_out_ms() -> f64 {
    600.0
}

fn default_wait_ms() -> f64 {
    300.0
}

fn default_fade_in_ms() -> f64 {
    600.0
}

fn default_base_filename() -> String {
    "airborne".to_string()
}

fn default_record_interval_minutes() -> f64 {
    5.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
        [room]
        width_ft = 30.0
        length_ft = 30.0
        height_ft = 10.0

        [pathogen]
        max_quanta_rate = 25.0
        half_life_hours = 1.1

        [occupancy]
        total_occupants = 100
        positivity_rate_percent = 10.0

        [ventilation]
        air_changes_per_hour = 1.0
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = SimulationConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.simulation.capacity, 20_000);
        assert_eq!(config.occupancy.breathing_rate, 360.0);
        assert_eq!(config.room.pivot, PivotCorner::FrontLeft);
        assert!(config.events.is_empty());

        let params = config.simulation_params().unwrap();
        assert_eq!(params.infectious_count, 10);
        assert_eq!(params.quanta_rate, 25.0);

        let inputs = config.risk_inputs(1.0).unwrap();
        assert_eq!(inputs.room_volume, 9000.0);
    }

    #[test]
    fn test_events_parse() {
        let text = format!(
            "{}\n{}",
            MINIMAL,
            r#"
            [[events]]
            at_hours = 0.5
            action = { vacate = true }

            [[events]]
            at_hours = 0.75
            action = "reset"

            [[events]]
            at_hours = 1.0
            action = { room = { width_ft = 12.0, length_ft = 14.0, height_ft = 9.0, pivot = "center" } }
            "#
        );
        let config = SimulationConfig::from_toml_str(&text).unwrap();
        assert_eq!(config.events.len(), 3);
        assert_eq!(config.events[0].action, EventAction::Vacate(true));
        assert_eq!(config.events[1].action, EventAction::Reset);
        match &config.events[2].action {
            EventAction::Room(room) => assert_eq!(room.geometry().pivot, PivotCorner::Center),
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_validation_rejects_bad_half_life() {
        let text = MINIMAL.replace("half_life_hours = 1.1", "half_life_hours = 0.0");
        assert!(SimulationConfig::from_toml_str(&text).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_activity() {
        let text = MINIMAL.replace(
            "positivity_rate_percent = 10.0",
            "positivity_rate_percent = 10.0\nactivity_level = 1.5",
        );
        assert!(SimulationConfig::from_toml_str(&text).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = SimulationConfig::load(file.path()).unwrap();
        assert_eq!(config.occupancy.total_occupants, 100);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(SimulationConfig::load("/definitely/not/here.toml").is_err());
    }
}
