//! Composite weighting regimes.

use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::Pillar;
use crate::error::AppError;

/// Allowed deviation of the weight sum from 1.0.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Named pillar/weight configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Extended when the displacement-risk category resolves, core otherwise.
    Auto,
    /// Vulnerability / demographic change / housing market.
    Core,
    /// The core pillars plus displacement risk and gentrification stage.
    Extended,
}

impl Preset {
    pub fn display_name(self) -> &'static str {
        match self {
            Preset::Auto => "auto",
            Preset::Core => "core (3 pillars)",
            Preset::Extended => "extended (5 pillars)",
        }
    }

    /// The concrete preset whose pillar set `weights` covers exactly.
    pub fn matching(weights: &DviWeights) -> Option<Preset> {
        let pillars = weights.pillars();
        [Preset::Core, Preset::Extended]
            .into_iter()
            .find(|p| DviWeights::for_preset(*p).pillars() == pillars)
    }
}

/// Pillar → non-negative weight, summing to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DviWeights(BTreeMap<Pillar, f64>);

impl DviWeights {
    pub fn core() -> Self {
        Self(BTreeMap::from([
            (Pillar::Vulnerability, 0.40),
            (Pillar::DemographicChange, 0.30),
            (Pillar::HousingMarket, 0.30),
        ]))
    }

    pub fn extended() -> Self {
        Self(BTreeMap::from([
            (Pillar::DisplacementRisk, 0.30),
            (Pillar::Vulnerability, 0.20),
            (Pillar::DemographicChange, 0.15),
            (Pillar::HousingMarket, 0.20),
            (Pillar::Gentrification, 0.15),
        ]))
    }

    /// Defaults for a concrete preset. `Auto` must be resolved first.
    pub fn for_preset(preset: Preset) -> Self {
        match preset {
            Preset::Core | Preset::Auto => Self::core(),
            Preset::Extended => Self::extended(),
        }
    }

    /// Build and validate a custom weighting.
    pub fn new(weights: BTreeMap<Pillar, f64>) -> Result<Self, AppError> {
        let w = Self(weights);
        w.validate()?;
        Ok(w)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.0.is_empty() {
            return Err(AppError::new(AppError::INPUT, "DVI weights must name at least one pillar."));
        }
        for (pillar, w) in &self.0 {
            if !(w.is_finite() && *w >= 0.0) {
                return Err(AppError::new(
                    AppError::INPUT,
                    format!("Invalid weight for `{}`: {w} (must be finite and >= 0).", pillar.key()),
                ));
            }
        }
        let sum: f64 = self.0.values().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(AppError::new(
                AppError::INPUT,
                format!("DVI weights must sum to 1.0 (got {sum:.6})."),
            ));
        }
        Ok(())
    }

    /// Active pillars in canonical order.
    pub fn pillars(&self) -> Vec<Pillar> {
        self.0.keys().copied().collect()
    }

    pub fn get(&self, pillar: Pillar) -> f64 {
        self.0.get(&pillar).copied().unwrap_or(0.0)
    }
}
