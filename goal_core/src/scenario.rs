//! Scenario and result data model.
//!
//! A [`Scenario`] is the seven-parameter input to the optimization oracle;
//! an [`OptimizationResult`] is what comes back. Both are plain immutable
//! values.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};

// =============================================================================
// STAGES
// =============================================================================

/// One of the three sequential processing stages.
///
/// Used as the closed set of possible bottlenecks so that frequency counts
/// and shift detection are exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    HeatTreatment,
    Machining,
    Assembly,
}

impl Stage {
    /// All stages in routing order.
    pub const ALL: [Stage; 3] = [Stage::HeatTreatment, Stage::Machining, Stage::Assembly];

    /// Returns the stage name.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::HeatTreatment => "heat_treatment",
            Stage::Machining => "machining",
            Stage::Assembly => "assembly",
        }
    }

    /// Position of the stage in routing order.
    pub fn index(&self) -> usize {
        match self {
            Stage::HeatTreatment => 0,
            Stage::Machining => 1,
            Stage::Assembly => 2,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace([' ', '-'], "_").as_str() {
            "heat_treatment" | "heat" => Ok(Stage::HeatTreatment),
            "machining" | "mach" => Ok(Stage::Machining),
            "assembly" | "assy" => Ok(Stage::Assembly),
            _ => Err(format!("Unknown stage: {}", s)),
        }
    }
}

// =============================================================================
// SCENARIO
// =============================================================================

/// A named bundle of the seven oracle parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Display name, carried through to the result
    pub name: String,

    /// Heat treatment capacity (hours)
    pub heat_treatment_capacity: f64,

    /// Machining capacity (hours)
    pub machining_capacity: f64,

    /// Assembly capacity (hours)
    pub assembly_capacity: f64,

    /// Demand ceiling for product A (units)
    pub demand_a: f64,

    /// Demand ceiling for product B (units)
    pub demand_b: f64,

    /// Profit per unit of product A
    pub profit_a: f64,

    /// Profit per unit of product B
    pub profit_b: f64,
}

impl Scenario {
    /// Creates a scenario from capacities `[heat, machining, assembly]`,
    /// demands `[a, b]` and profits `[a, b]`.
    pub fn new(
        name: impl Into<String>,
        capacities: [f64; 3],
        demands: [f64; 2],
        profits: [f64; 2],
    ) -> Self {
        Self {
            name: name.into(),
            heat_treatment_capacity: capacities[0],
            machining_capacity: capacities[1],
            assembly_capacity: capacities[2],
            demand_a: demands[0],
            demand_b: demands[1],
            profit_a: profits[0],
            profit_b: profits[1],
        }
    }

    /// Returns a copy with a different name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Returns the capacity of a stage.
    pub fn capacity(&self, stage: Stage) -> f64 {
        match stage {
            Stage::HeatTreatment => self.heat_treatment_capacity,
            Stage::Machining => self.machining_capacity,
            Stage::Assembly => self.assembly_capacity,
        }
    }

    /// Checks every field against its physical domain.
    ///
    /// Capacities and profits must be finite and positive, demands finite
    /// and non-negative. Reports the first offending field.
    pub fn validate(&self) -> Result<(), CoreError> {
        let positive = [
            ("heat_treatment_capacity", self.heat_treatment_capacity),
            ("machining_capacity", self.machining_capacity),
            ("assembly_capacity", self.assembly_capacity),
        ];
        let non_negative = [("demand_a", self.demand_a), ("demand_b", self.demand_b)];
        let profits = [("profit_a", self.profit_a), ("profit_b", self.profit_b)];

        for (field, value) in positive.into_iter().chain(profits) {
            if !value.is_finite() || value <= 0.0 {
                return Err(CoreError::InvalidScenario { field, value });
            }
        }
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(CoreError::InvalidScenario { field, value });
            }
        }
        Ok(())
    }
}

// =============================================================================
// OPTIMIZATION RESULT
// =============================================================================

/// One oracle answer, tagged with the scenario it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Name of the evaluated scenario
    pub scenario_name: String,

    /// Total profit of the optimal mix
    pub total_throughput: f64,

    /// Units of product A
    pub product_a: f64,

    /// Units of product B
    pub product_b: f64,

    /// Binding stage
    pub bottleneck: Stage,

    /// Heat treatment utilization, percent in [0, 100]
    pub heat_treatment_utilization: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goal_scenario() -> Scenario {
        Scenario::new("Baseline", [160.0, 200.0, 180.0], [50.0, 80.0], [90.0, 60.0])
    }

    #[test]
    fn test_scenario_new_maps_fields() {
        let s = goal_scenario();
        assert_eq!(s.capacity(Stage::HeatTreatment), 160.0);
        assert_eq!(s.capacity(Stage::Machining), 200.0);
        assert_eq!(s.capacity(Stage::Assembly), 180.0);
        assert_eq!(s.demand_b, 80.0);
        assert_eq!(s.profit_a, 90.0);
    }

    #[test]
    fn test_validate_accepts_zero_demand() {
        let mut s = goal_scenario();
        s.demand_a = 0.0;
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let mut s = goal_scenario();
        s.machining_capacity = -1.0;
        assert_eq!(
            s.validate(),
            Err(CoreError::InvalidScenario { field: "machining_capacity", value: -1.0 })
        );

        let mut s = goal_scenario();
        s.profit_b = 0.0;
        assert!(matches!(
            s.validate(),
            Err(CoreError::InvalidScenario { field: "profit_b", .. })
        ));

        let mut s = goal_scenario();
        s.demand_a = f64::NAN;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_stage_round_trip_names() {
        for stage in Stage::ALL {
            assert_eq!(stage.name().parse::<Stage>(), Ok(stage));
        }
        assert_eq!("Heat Treatment".parse::<Stage>(), Ok(Stage::HeatTreatment));
        assert!("paint".parse::<Stage>().is_err());
    }

    #[test]
    fn test_stage_display_and_order() {
        assert_eq!(Stage::HeatTreatment.to_string(), "heat_treatment");
        assert!(Stage::HeatTreatment < Stage::Machining);
        assert!(Stage::Machining < Stage::Assembly);
        assert_eq!(Stage::Assembly.index(), 2);
    }

    #[test]
    fn test_renamed_keeps_parameters() {
        let s = goal_scenario().renamed("Copy");
        assert_eq!(s.name, "Copy");
        assert_eq!(s.heat_treatment_capacity, 160.0);
    }
}
