//! Perturbation sampler - draws randomized scenarios around a base case.
//!
//! Every field is drawn from `Normal(base, base * pct / 100)` and then
//! clamped to a feasibility floor instead of being rejection-sampled, so a
//! trial never loops and always reaches the oracle with solvable inputs.

use goal_core::{CoreError, Scenario};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Demand cannot go negative.
pub const DEMAND_FLOOR: f64 = 0.0;

/// Below this the three-stage model degenerates.
pub const CAPACITY_FLOOR: f64 = 50.0;

/// Keeps unit economics positive.
pub const PROFIT_FLOOR: f64 = 10.0;

/// Relative standard deviations, in percent of the base value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Uncertainty {
    /// Applied to demand_a and demand_b
    pub demand_pct: f64,

    /// Applied to the three stage capacities
    pub capacity_pct: f64,

    /// Applied to profit_a and profit_b
    pub price_pct: f64,
}

impl Default for Uncertainty {
    fn default() -> Self {
        Self {
            demand_pct: 20.0,
            capacity_pct: 10.0,
            price_pct: 15.0,
        }
    }
}

impl Uncertainty {
    pub fn new(demand_pct: f64, capacity_pct: f64, price_pct: f64) -> Self {
        Self {
            demand_pct,
            capacity_pct,
            price_pct,
        }
    }

    /// No perturbation at all; every draw equals the base value.
    pub fn none() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Percentages must be finite and non-negative.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (label, pct) in [
            ("demand", self.demand_pct),
            ("capacity", self.capacity_pct),
            ("price", self.price_pct),
        ] {
            if !pct.is_finite() || pct < 0.0 {
                return Err(CoreError::config(format!(
                    "{} uncertainty must be a non-negative percentage, got {}",
                    label, pct
                )));
            }
        }
        Ok(())
    }
}

/// Draws one perturbed scenario per call.
#[derive(Debug, Clone, Copy)]
pub struct PerturbationSampler {
    uncertainty: Uncertainty,
}

impl PerturbationSampler {
    /// Creates a sampler, rejecting negative or non-finite percentages.
    pub fn new(uncertainty: Uncertainty) -> Result<Self, CoreError> {
        uncertainty.validate()?;
        Ok(Self { uncertainty })
    }

    pub fn uncertainty(&self) -> Uncertainty {
        self.uncertainty
    }

    /// Rejects a base with any field below its sampling floor.
    ///
    /// Trials are clamped to the floors, so such a base is never what a
    /// trial evaluates, even at zero uncertainty.
    pub fn check_floors(&self, base: &Scenario) -> Result<(), CoreError> {
        let floors = [
            ("demand_a", base.demand_a, DEMAND_FLOOR),
            ("demand_b", base.demand_b, DEMAND_FLOOR),
            ("heat_treatment_capacity", base.heat_treatment_capacity, CAPACITY_FLOOR),
            ("machining_capacity", base.machining_capacity, CAPACITY_FLOOR),
            ("assembly_capacity", base.assembly_capacity, CAPACITY_FLOOR),
            ("profit_a", base.profit_a, PROFIT_FLOOR),
            ("profit_b", base.profit_b, PROFIT_FLOOR),
        ];
        for (field, value, floor) in floors {
            if value < floor {
                return Err(CoreError::config(format!(
                    "{} = {} is below the sampling floor {}",
                    field, value, floor
                )));
            }
        }
        Ok(())
    }

    /// Draws a perturbed copy of `base`.
    ///
    /// Draw order is fixed (demand A, demand B, heat treatment, machining,
    /// assembly, profit A, profit B) so a given generator state always
    /// yields the same scenario. The name is kept.
    pub fn sample<R: Rng + ?Sized>(&self, base: &Scenario, rng: &mut R) -> Scenario {
        let u = &self.uncertainty;

        let demand_a = draw(rng, base.demand_a, u.demand_pct, DEMAND_FLOOR);
        let demand_b = draw(rng, base.demand_b, u.demand_pct, DEMAND_FLOOR);

        let heat_treatment_capacity =
            draw(rng, base.heat_treatment_capacity, u.capacity_pct, CAPACITY_FLOOR);
        let machining_capacity = draw(rng, base.machining_capacity, u.capacity_pct, CAPACITY_FLOOR);
        let assembly_capacity = draw(rng, base.assembly_capacity, u.capacity_pct, CAPACITY_FLOOR);

        let profit_a = draw(rng, base.profit_a, u.price_pct, PROFIT_FLOOR);
        let profit_b = draw(rng, base.profit_b, u.price_pct, PROFIT_FLOOR);

        Scenario {
            name: base.name.clone(),
            heat_treatment_capacity,
            machining_capacity,
            assembly_capacity,
            demand_a,
            demand_b,
            profit_a,
            profit_b,
        }
    }
}

/// `max(floor, mean + mean * pct / 100 * z)` with `z ~ N(0, 1)`.
fn draw<R: Rng + ?Sized>(rng: &mut R, mean: f64, pct: f64, floor: f64) -> f64 {
    let std_dev = mean * pct / 100.0;
    let z: f64 = rng.sample(StandardNormal);
    (mean + std_dev * z).max(floor)
}
