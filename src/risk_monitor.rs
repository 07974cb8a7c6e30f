use airborne_common::error::Result;
use airborne_common::{calculate_post_decay, calculate_wells_riley, RiskInputs, RiskResult};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::Sender;

/// One risk assessment published to observers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskUpdate {
    /// Simulated hours since the last reset.
    pub simulated_hours: f64,
    /// Probability for a fixed one-hour stay under current conditions.
    pub fixed_hour: RiskResult,
    /// Probability for the exposure accumulated so far. Uses the post-decay
    /// model while the room is vacated.
    pub running: RiskResult,
    pub vacated: bool,
}

/// Tracks exposure time and publishes risk assessments.
///
/// Observers receive updates over an injected channel; there is no shared
/// broadcaster. If the receiving end goes away the sender is dropped after
/// one warning and the monitor keeps assessing silently.
#[derive(Debug)]
pub struct RiskMonitor {
    inputs: RiskInputs,
    occupied_hours: f64,
    vacated_hours: f64,
    vacated: bool,
    sender: Option<Sender<RiskUpdate>>,
    latest: Option<RiskUpdate>,
}

impl RiskMonitor {
    pub fn new(inputs: RiskInputs, sender: Option<Sender<RiskUpdate>>) -> Self {
        Self {
            inputs,
            occupied_hours: 0.0,
            vacated_hours: 0.0,
            vacated: false,
            sender,
            latest: None,
        }
    }

    pub fn inputs(&self) -> &RiskInputs {
        &self.inputs
    }

    /// Replaces the epidemiological inputs. Accumulated time is kept.
    pub fn set_inputs(&mut self, inputs: RiskInputs) {
        self.inputs = inputs;
    }

    /// Marks the room vacated or re-occupied. The post-decay clock restarts
    /// at each vacate.
    ///
    /// Occupied time is cumulative: on re-occupation the running assessment
    /// returns to the Wells-Riley value for all occupied hours so far, so it
    /// steps up from the decayed value in one tick.
    pub fn set_vacated(&mut self, vacated: bool) {
        if vacated && !self.vacated {
            self.vacated_hours = 0.0;
        }
        self.vacated = vacated;
    }

    pub fn is_vacated(&self) -> bool {
        self.vacated
    }

    pub fn occupied_hours(&self) -> f64 {
        self.occupied_hours
    }

    pub fn vacated_hours(&self) -> f64 {
        self.vacated_hours
    }

    pub fn latest(&self) -> Option<&RiskUpdate> {
        self.latest.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.sender.is_some()
    }

    /// Clears accumulated exposure. The vacate flag is left to the host.
    pub fn reset(&mut self) {
        self.occupied_hours = 0.0;
        self.vacated_hours = 0.0;
        self.latest = None;
    }

    /// Adds `simulated_hours` of exposure, assesses and publishes.
    pub fn advance(&mut self, simulated_hours: f64) -> Result<RiskUpdate> {
        let dt = if simulated_hours.is_finite() { simulated_hours.max(0.0) } else { 0.0 };
        if self.vacated {
            self.vacated_hours += dt;
        } else {
            self.occupied_hours += dt;
        }
        let update = self.assess()?;
        self.publish(update);
        Ok(update)
    }

    /// Computes the current assessment without advancing time or publishing.
    pub fn assess(&self) -> Result<RiskUpdate> {
        let fixed_hour = calculate_wells_riley(&self.inputs.with_exposure_hours(1.0))?;
        let occupied = self.inputs.with_exposure_hours(self.occupied_hours);
        let running = if self.vacated {
            calculate_post_decay(&occupied, self.vacated_hours)
        } else {
            calculate_wells_riley(&occupied)?
        };
        Ok(RiskUpdate {
            simulated_hours: self.occupied_hours + self.vacated_hours,
            fixed_hour,
            running,
            vacated: self.vacated,
        })
    }

    fn publish(&mut self, update: RiskUpdate) {
        self.latest = Some(update);
        if let Some(sender) = &self.sender {
            if sender.send(update).is_err() {
                log::warn!("Risk observer disconnected, no further updates will be sent.");
                self.sender = None;
            }
        }
    }
}
