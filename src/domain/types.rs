//! Shared domain types.
//!
//! These types are kept small and serializable so they can be used in-memory
//! during scoring, written to the run manifest, and compared in tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::math::Precision;

/// One standardized sub-score contributing to the composite index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pillar {
    DisplacementRisk,
    Vulnerability,
    DemographicChange,
    HousingMarket,
    Gentrification,
}

impl Pillar {
    pub const ALL: [Pillar; 5] = [
        Pillar::DisplacementRisk,
        Pillar::Vulnerability,
        Pillar::DemographicChange,
        Pillar::HousingMarket,
        Pillar::Gentrification,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Pillar::DisplacementRisk => "displacement_risk",
            Pillar::Vulnerability => "vulnerability",
            Pillar::DemographicChange => "demographic_change",
            Pillar::HousingMarket => "housing_market",
            Pillar::Gentrification => "gentrification",
        }
    }

    /// Property name used in the enriched feature collection.
    pub fn export_key(self) -> String {
        format!("s_{}", self.key())
    }

    pub fn from_key(key: &str) -> Option<Pillar> {
        Pillar::ALL.into_iter().find(|p| p.key() == key)
    }
}

/// Raw socioeconomic metric carried per tract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Income,
    HomeValue,
    PctBachelors,
    PctCostBurdened,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Income,
        Metric::HomeValue,
        Metric::PctBachelors,
        Metric::PctCostBurdened,
    ];

    /// Property name used in the enriched feature collection.
    pub fn export_key(self) -> &'static str {
        match self {
            Metric::Income => "median_income",
            Metric::HomeValue => "median_home_value",
            Metric::PctBachelors => "pct_bachelors",
            Metric::PctCostBurdened => "pct_cost_burdened",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Metric::Income => "Median HH Income",
            Metric::HomeValue => "Median Home Value",
            Metric::PctBachelors => "% Bachelor's+",
            Metric::PctCostBurdened => "% Cost Burdened",
        }
    }

    pub fn precision(self) -> Precision {
        match self {
            Metric::Income | Metric::HomeValue => Precision::Currency,
            Metric::PctBachelors | Metric::PctCostBurdened => Precision::Percent,
        }
    }
}

/// Categorical field from the displacement typology extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryField {
    DisplacementRisk,
    VulnerablePopulation,
    DemographicChange,
    HousingMarket,
    GentrificationStage,
}

impl CategoryField {
    pub const ALL: [CategoryField; 5] = [
        CategoryField::DisplacementRisk,
        CategoryField::VulnerablePopulation,
        CategoryField::DemographicChange,
        CategoryField::HousingMarket,
        CategoryField::GentrificationStage,
    ];

    pub fn key(self) -> &'static str {
        match self {
            CategoryField::DisplacementRisk => "displacement_risk",
            CategoryField::VulnerablePopulation => "vulnerable_population",
            CategoryField::DemographicChange => "demographic_change",
            CategoryField::HousingMarket => "housing_market",
            CategoryField::GentrificationStage => "gentrification_stage",
        }
    }

    pub fn from_key(key: &str) -> Option<CategoryField> {
        CategoryField::ALL.into_iter().find(|f| f.key() == key)
    }

    /// Key in the socioeconomic series.
    pub fn export_key(self) -> &'static str {
        match self {
            CategoryField::DisplacementRisk => "displacementRisk",
            CategoryField::VulnerablePopulation => "vulnerablePopulation",
            CategoryField::DemographicChange => "demographicChange",
            CategoryField::HousingMarket => "housingMarket",
            CategoryField::GentrificationStage => "gentrificationStage",
        }
    }

    pub fn for_pillar(pillar: Pillar) -> CategoryField {
        match pillar {
            Pillar::DisplacementRisk => CategoryField::DisplacementRisk,
            Pillar::Vulnerability => CategoryField::VulnerablePopulation,
            Pillar::DemographicChange => CategoryField::DemographicChange,
            Pillar::HousingMarket => CategoryField::HousingMarket,
            Pillar::Gentrification => CategoryField::GentrificationStage,
        }
    }
}

/// Sentinel exported for categorical fields with no value.
pub const UNKNOWN_CATEGORY: &str = "N/A";

/// Raw metric values for one tract (any may be absent).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMetrics {
    pub income: Option<f64>,
    pub home_value: Option<f64>,
    pub pct_bachelors: Option<f64>,
    pub pct_cost_burdened: Option<f64>,
}

impl RawMetrics {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Income => self.income,
            Metric::HomeValue => self.home_value,
            Metric::PctBachelors => self.pct_bachelors,
            Metric::PctCostBurdened => self.pct_cost_burdened,
        }
    }

    pub fn set(&mut self, metric: Metric, value: Option<f64>) {
        let slot = match metric {
            Metric::Income => &mut self.income,
            Metric::HomeValue => &mut self.home_value,
            Metric::PctBachelors => &mut self.pct_bachelors,
            Metric::PctCostBurdened => &mut self.pct_cost_burdened,
        };
        *slot = value.filter(|v| v.is_finite());
    }
}

/// One row per census tract, built once per run from a feature's properties.
#[derive(Debug, Clone, PartialEq)]
pub struct TractRecord {
    /// Normalized 11-character GEOID, when the source carries a usable one.
    pub geo_id: Option<String>,
    pub region_label: String,
    pub neighborhood: Option<String>,
    pub metrics: RawMetrics,
    /// Categorical fields verbatim from the source (absent → `None`).
    pub categories: BTreeMap<CategoryField, String>,
}

impl TractRecord {
    pub fn category(&self, field: CategoryField) -> &str {
        self.categories
            .get(&field)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_CATEGORY)
    }
}

/// Composite outputs for one tract.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeScore {
    /// Unbounded weighted sum of imputed pillar values.
    pub dvi_raw: f64,
    /// `dvi_raw` min-max rescaled to `[0, 100]`, one decimal.
    pub dvi: f64,
}
