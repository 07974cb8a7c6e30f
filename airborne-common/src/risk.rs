//! Wells-Riley infection risk.
//!
//! All functions here are pure: the same inputs always produce the same
//! bit pattern, and nothing is cached between calls.
//!
//! Units follow the host: volumes and breathing rates share one volume unit
//! (cubic feet in the dashboard), rates are per hour, times are hours.

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::LN_2;

/// Empirical exponent relating activity level to quanta emission.
pub const QUANTA_ACTIVITY_EXPONENT: f64 = 1.76;

/// Upper bound on probabilities reported after the room has been vacated.
pub const MAX_POST_DECAY_PROBABILITY: f64 = 0.999;

/// Keeps the standard model strictly below one.
const MAX_WELLS_RILEY_PROBABILITY: f64 = 1.0 - f64::EPSILON;

/// Epidemiological inputs to a single risk assessment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskInputs {
    pub total_occupants: u32,
    /// Percent of occupants that are infectious (0-100).
    pub positivity_rate_percent: f64,
    /// Quanta per hour per infectious person.
    pub quanta_rate: f64,
    /// Volume inhaled per hour per person.
    pub breathing_rate: f64,
    pub exposure_hours: f64,
    pub room_volume: f64,
    /// Air changes per hour.
    pub ventilation_rate: f64,
    pub half_life_hours: f64,
}

impl RiskInputs {
    /// Number of infectious occupants, rounded and bounded to the room's headcount.
    pub fn infectious_count(&self) -> u32 {
        infectious_count(self.total_occupants, self.positivity_rate_percent)
    }

    /// Returns a copy with a different exposure duration.
    pub fn with_exposure_hours(mut self, exposure_hours: f64) -> Self {
        self.exposure_hours = exposure_hours;
        self
    }
}

/// Outcome of a risk assessment.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskResult {
    /// Probability of infection for one susceptible occupant, in [0, 1).
    pub probability: f64,
    pub infectious_count: u32,
    pub susceptible_count: u32,
}

/// `round(positivity / 100 * total)`, bounded to `[0, total]`.
pub fn infectious_count(total_occupants: u32, positivity_rate_percent: f64) -> u32 {
    if !positivity_rate_percent.is_finite() {
        return 0;
    }
    let raw = (positivity_rate_percent / 100.0 * total_occupants as f64).round();
    raw.clamp(0.0, total_occupants as f64) as u32
}

/// Biological decay rate (1/h) of a pathogen with the given half-life.
pub fn decay_rate(half_life_hours: f64) -> f64 {
    LN_2 / half_life_hours
}

/// Ventilation plus biological decay (1/h).
pub fn total_removal_rate(ventilation_rate: f64, half_life_hours: f64) -> f64 {
    ventilation_rate + decay_rate(half_life_hours)
}

/// Time (hours) for the airborne concentration to halve once emission stops.
pub fn theoretical_half_life(ventilation_rate: f64, half_life_hours: f64) -> f64 {
    LN_2 / total_removal_rate(ventilation_rate, half_life_hours)
}

fn validate(inputs: &RiskInputs) -> Result<()> {
    if !(inputs.half_life_hours > 0.0) || !inputs.half_life_hours.is_finite() {
        return Err(ModelError::InvalidParameter {
            name: "half_life_hours",
            value: inputs.half_life_hours,
        });
    }
    if !(inputs.ventilation_rate >= 0.0) || !inputs.ventilation_rate.is_finite() {
        return Err(ModelError::InvalidParameter {
            name: "ventilation_rate",
            value: inputs.ventilation_rate,
        });
    }
    if !(inputs.room_volume > 0.0) || !inputs.room_volume.is_finite() {
        return Err(ModelError::InvalidParameter {
            name: "room_volume",
            value: inputs.room_volume,
        });
    }
    Ok(())
}

/// Steady-state quanta concentration for the inputs' occupancy.
fn steady_state_concentration(inputs: &RiskInputs, infectious: u32, removal: f64) -> f64 {
    infectious as f64 * inputs.quanta_rate / (inputs.room_volume * removal)
}

/// Standard Wells-Riley assessment with a time-integrated concentration.
///
/// The room starts with clean air; concentration rises towards steady state
/// at the total removal rate while the infectious occupants are present.
pub fn calculate_wells_riley(inputs: &RiskInputs) -> Result<RiskResult> {
    validate(inputs)?;

    let infectious = inputs.infectious_count();
    let susceptible = inputs.total_occupants - infectious;
    let exposure = inputs.exposure_hours.max(0.0);

    let removal = total_removal_rate(inputs.ventilation_rate, inputs.half_life_hours);
    let steady_state = steady_state_concentration(inputs, infectious, removal);
    let integrated = steady_state * (exposure - (1.0 - (-removal * exposure).exp()) / removal);

    let dose = inputs.breathing_rate * integrated;
    let probability = (1.0 - (-dose).exp()).clamp(0.0, MAX_WELLS_RILEY_PROBABILITY);

    Ok(RiskResult {
        probability,
        infectious_count: infectious,
        susceptible_count: susceptible,
    })
}

/// Risk after the room is vacated.
///
/// `inputs.exposure_hours` is the occupied period. Afterwards no quanta are
/// emitted and the residual concentration decays at the total removal rate;
/// the reported probability scales with that residual concentration.
///
/// Never fails: a non-positive half-life (or any other unusable input)
/// reports a probability of zero so a live dashboard keeps running.
pub fn calculate_post_decay(inputs: &RiskInputs, extended_exposure_hours: f64) -> RiskResult {
    let infectious = inputs.infectious_count();
    let degenerate = RiskResult {
        probability: 0.0,
        infectious_count: infectious,
        susceptible_count: inputs.total_occupants - infectious,
    };

    if !(inputs.half_life_hours > 0.0) {
        return degenerate;
    }
    let occupied = match calculate_wells_riley(inputs) {
        Ok(result) => result,
        Err(e) => {
            log::warn!("Post-decay risk degenerate input: {}", e);
            return degenerate;
        }
    };

    let extended = if extended_exposure_hours.is_finite() {
        extended_exposure_hours.max(0.0)
    } else {
        0.0
    };
    let occupied_hours = inputs.exposure_hours.max(0.0);
    let removal = total_removal_rate(inputs.ventilation_rate, inputs.half_life_hours);
    let steady_state = steady_state_concentration(inputs, occupied.infectious_count, removal);

    let end_concentration = steady_state * (1.0 - (-removal * occupied_hours).exp());
    if !(end_concentration > 0.0) {
        return degenerate;
    }
    let residual = end_concentration * (-removal * extended).exp();

    let start_probability = occupied.probability.min(MAX_POST_DECAY_PROBABILITY);
    let probability = (start_probability * residual / end_concentration)
        .clamp(0.0, MAX_POST_DECAY_PROBABILITY);

    RiskResult {
        probability,
        ..occupied
    }
}

/// Scales a maximum quanta rate by activity level (0 = resting, 1 = peak).
pub fn quanta_power_law(max_quanta_rate: f64, activity_level: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&activity_level) {
        return Err(ModelError::OutOfRange {
            name: "activity_level",
            value: activity_level,
            min: 0.0,
            max: 1.0,
        });
    }
    Ok(max_quanta_rate * activity_level.powf(QUANTA_ACTIVITY_EXPONENT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reference_scenario() -> RiskInputs {
        RiskInputs {
            total_occupants: 100,
            positivity_rate_percent: 10.0,
            quanta_rate: 25.0,
            breathing_rate: 360.0,
            exposure_hours: 1.0,
            room_volume: 9000.0,
            ventilation_rate: 1.0,
            half_life_hours: 1.1,
        }
    }

    fn classroom_after_four_hours() -> RiskInputs {
        RiskInputs {
            total_occupants: 30,
            positivity_rate_percent: 10.0,
            quanta_rate: 100.0,
            breathing_rate: 8.0,
            exposure_hours: 4.0,
            room_volume: 100.0,
            ventilation_rate: 2.0,
            half_life_hours: 1.1,
        }
    }

    #[test]
    fn test_reference_scenario_is_pinned() {
        let result = calculate_wells_riley(&reference_scenario()).unwrap();
        assert_eq!(result.infectious_count, 10);
        assert_eq!(result.susceptible_count, 90);
        assert!((result.probability - 0.955_332_799_142_875_5).abs() < 1e-12);
    }

    #[test]
    fn test_reference_scenario_is_bit_reproducible() {
        let a = calculate_wells_riley(&reference_scenario()).unwrap();
        let b = calculate_wells_riley(&reference_scenario()).unwrap();
        assert_eq!(a.probability.to_bits(), b.probability.to_bits());
    }

    #[test]
    fn test_infectious_count_rounds_and_bounds() {
        assert_eq!(infectious_count(30, 10.0), 3);
        assert_eq!(infectious_count(25, 10.0), 3); // 2.5 rounds up
        assert_eq!(infectious_count(10, 250.0), 10);
        assert_eq!(infectious_count(10, -5.0), 0);
        assert_eq!(infectious_count(10, f64::NAN), 0);
    }

    #[test]
    fn test_zero_exposure_has_zero_risk() {
        let result = calculate_wells_riley(&reference_scenario().with_exposure_hours(0.0)).unwrap();
        assert_eq!(result.probability, 0.0);
    }

    #[test]
    fn test_invalid_half_life_is_rejected() {
        let mut inputs = reference_scenario();
        inputs.half_life_hours = 0.0;
        assert!(matches!(
            calculate_wells_riley(&inputs),
            Err(ModelError::InvalidParameter { name: "half_life_hours", .. })
        ));
        inputs.half_life_hours = -1.0;
        assert!(calculate_wells_riley(&inputs).is_err());
    }

    #[test]
    fn test_zero_ventilation_is_finite() {
        let mut inputs = reference_scenario();
        inputs.ventilation_rate = 0.0;
        let result = calculate_wells_riley(&inputs).unwrap();
        assert!(result.probability.is_finite());
        assert!(result.probability > 0.0);
    }

    #[test]
    fn test_post_decay_halves_at_theoretical_half_life() {
        let inputs = classroom_after_four_hours();
        let half_life = theoretical_half_life(inputs.ventilation_rate, inputs.half_life_hours);
        let at_start = calculate_post_decay(&inputs, 0.0).probability;
        let at_half = calculate_post_decay(&inputs, half_life).probability;
        assert!(at_start > 0.0);
        assert!((at_half - at_start / 2.0).abs() <= 0.05 * at_start / 2.0);
    }

    #[test]
    fn test_post_decay_converges_after_a_day() {
        let inputs = classroom_after_four_hours();
        assert!(calculate_post_decay(&inputs, 24.0).probability < 0.01);
    }

    #[test]
    fn test_post_decay_zero_half_life_is_zero() {
        let mut inputs = classroom_after_four_hours();
        inputs.half_life_hours = 0.0;
        let result = calculate_post_decay(&inputs, 1.0);
        assert_eq!(result.probability, 0.0);
        assert_eq!(result.infectious_count, 3);
    }

    #[test]
    fn test_post_decay_negative_extension_is_clamped() {
        let inputs = classroom_after_four_hours();
        assert_eq!(
            calculate_post_decay(&inputs, -3.0),
            calculate_post_decay(&inputs, 0.0)
        );
    }

    #[test]
    fn test_post_decay_is_capped() {
        let inputs = classroom_after_four_hours();
        assert!(calculate_post_decay(&inputs, 0.0).probability <= MAX_POST_DECAY_PROBABILITY);
    }

    #[test]
    fn test_power_law_endpoints() {
        assert_eq!(quanta_power_law(48.0, 0.0).unwrap(), 0.0);
        assert_eq!(quanta_power_law(48.0, 1.0).unwrap(), 48.0);
        let half = quanta_power_law(100.0, 0.5).unwrap();
        assert!((half - 100.0 * 0.5f64.powf(1.76)).abs() < 1e-12);
    }

    #[test]
    fn test_power_law_rejects_out_of_range() {
        assert!(matches!(
            quanta_power_law(10.0, 1.5),
            Err(ModelError::OutOfRange { .. })
        ));
        assert!(matches!(
            quanta_power_law(10.0, -0.1),
            Err(ModelError::OutOfRange { .. })
        ));
        assert!(quanta_power_law(10.0, f64::NAN).is_err());
    }

    proptest! {
        #[test]
        fn prop_monotonic_in_exposure(
            short in 0.05f64..4.0,
            extra in 0.05f64..4.0,
        ) {
            let base = reference_scenario();
            let shorter = calculate_wells_riley(&base.with_exposure_hours(short)).unwrap();
            let longer = calculate_wells_riley(&base.with_exposure_hours(short + extra)).unwrap();
            prop_assert!(longer.probability > shorter.probability);
        }

        #[test]
        fn prop_monotonic_in_quanta(
            quanta in 0.5f64..20.0,
            extra in 0.5f64..20.0,
        ) {
            let mut low = reference_scenario();
            low.quanta_rate = quanta;
            let mut high = low;
            high.quanta_rate = quanta + extra;
            let low = calculate_wells_riley(&low).unwrap();
            let high = calculate_wells_riley(&high).unwrap();
            prop_assert!(high.probability > low.probability);
        }
    }
}
