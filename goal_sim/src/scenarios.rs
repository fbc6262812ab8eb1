//! Built-in scenario presets and scenario file loading.

use crate::error::SimError;
use goal_core::Scenario;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Preset identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetId {
    /// Current plant configuration
    Baseline,

    /// Heat treatment capacity raised to 200 hours
    ElevateBottleneck,

    /// Product A profit raised to 140
    PremiumProductA,
}

impl PresetId {
    /// Returns all presets in comparison order (baseline first).
    pub fn all() -> Vec<PresetId> {
        vec![
            PresetId::Baseline,
            PresetId::ElevateBottleneck,
            PresetId::PremiumProductA,
        ]
    }

    /// Returns the preset name.
    pub fn name(&self) -> &'static str {
        match self {
            PresetId::Baseline => "Baseline",
            PresetId::ElevateBottleneck => "Elevate Bottleneck",
            PresetId::PremiumProductA => "Premium Product A",
        }
    }

    /// Returns a description of the preset.
    pub fn description(&self) -> &'static str {
        match self {
            PresetId::Baseline => "Heat 160h, machining 200h, assembly 180h; demand 50/80; profit 90/60",
            PresetId::ElevateBottleneck => "Baseline with heat treatment capacity raised to 200h",
            PresetId::PremiumProductA => "Baseline with product A profit raised to 140",
        }
    }

    /// Builds the preset scenario.
    pub fn scenario(&self) -> Scenario {
        let baseline = Scenario::new(
            self.name(),
            [160.0, 200.0, 180.0],
            [50.0, 80.0],
            [90.0, 60.0],
        );
        match self {
            PresetId::Baseline => baseline,
            PresetId::ElevateBottleneck => Scenario {
                heat_treatment_capacity: 200.0,
                ..baseline
            },
            PresetId::PremiumProductA => Scenario {
                profit_a: 140.0,
                ..baseline
            },
        }
    }
}

impl std::fmt::Display for PresetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for PresetId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace([' ', '-'], "_").as_str() {
            "baseline" | "base" => Ok(PresetId::Baseline),
            "elevate_bottleneck" | "elevate" => Ok(PresetId::ElevateBottleneck),
            "premium_product_a" | "premium" => Ok(PresetId::PremiumProductA),
            _ => Err(format!("Unknown preset: {}", s)),
        }
    }
}

/// The three presets, baseline first.
pub fn default_comparison_set() -> Vec<Scenario> {
    PresetId::all().iter().map(PresetId::scenario).collect()
}

/// Loads an ordered scenario list from a JSON array file.
///
/// Every entry is validated; the first element is the comparison baseline.
pub fn load_scenarios(path: impl AsRef<Path>) -> Result<Vec<Scenario>, SimError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let scenarios: Vec<Scenario> = serde_json::from_str(&text)?;
    for scenario in &scenarios {
        scenario.validate()?;
    }
    debug!("Loaded {} scenarios from {}", scenarios.len(), path.display());
    Ok(scenarios)
}
