//! Semantic concepts and their candidate column aliases.
//!
//! Typology extracts are republished with renamed or truncated columns between
//! vintages (shapefile exports cap names at 10 characters, hence `displaceme`,
//! `vulnerabil`, ...). Each concept lists candidate names in priority order;
//! the resolver picks the first one present.

use serde::{Deserialize, Serialize};

use crate::domain::{CategoryField, Metric, Pillar};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concept {
    TractId,
    TractName,
    Neighborhood,
    Typology,

    // Pre-computed pillar indexes.
    #[serde(rename = "vulnerability")]
    VulnerabilityIndex,
    #[serde(rename = "demographic")]
    DemographicIndex,
    #[serde(rename = "housing")]
    HousingIndex,
    DisplacementIndex,
    GentrificationIndex,

    // Categorical typology fields.
    DisplacementRisk,
    VulnerableFlag,
    DemographicFlag,
    HousingMarket,
    GentrificationStage,

    // Raw metrics.
    Income,
    HomeValue,
    PctBachelors,
    PctCostBurdened,
}

impl Concept {
    pub const ALL: [Concept; 18] = [
        Concept::TractId,
        Concept::TractName,
        Concept::Neighborhood,
        Concept::Typology,
        Concept::VulnerabilityIndex,
        Concept::DemographicIndex,
        Concept::HousingIndex,
        Concept::DisplacementIndex,
        Concept::GentrificationIndex,
        Concept::DisplacementRisk,
        Concept::VulnerableFlag,
        Concept::DemographicFlag,
        Concept::HousingMarket,
        Concept::GentrificationStage,
        Concept::Income,
        Concept::HomeValue,
        Concept::PctBachelors,
        Concept::PctCostBurdened,
    ];

    pub fn from_key(key: &str) -> Option<Concept> {
        Concept::ALL.into_iter().find(|c| c.key() == key)
    }

    pub fn key(self) -> &'static str {
        match self {
            Concept::TractId => "tract_id",
            Concept::TractName => "tract_name",
            Concept::Neighborhood => "neighborhood",
            Concept::Typology => "typology",
            Concept::VulnerabilityIndex => "vulnerability",
            Concept::DemographicIndex => "demographic",
            Concept::HousingIndex => "housing",
            Concept::DisplacementIndex => "displacement_index",
            Concept::GentrificationIndex => "gentrification_index",
            Concept::DisplacementRisk => "displacement_risk",
            Concept::VulnerableFlag => "vulnerable_flag",
            Concept::DemographicFlag => "demographic_flag",
            Concept::HousingMarket => "housing_market",
            Concept::GentrificationStage => "gentrification_stage",
            Concept::Income => "income",
            Concept::HomeValue => "home_value",
            Concept::PctBachelors => "pct_bachelors",
            Concept::PctCostBurdened => "pct_cost_burdened",
        }
    }

    /// Column holding a pre-computed index for `pillar`.
    pub fn direct(pillar: Pillar) -> Concept {
        match pillar {
            Pillar::DisplacementRisk => Concept::DisplacementIndex,
            Pillar::Vulnerability => Concept::VulnerabilityIndex,
            Pillar::DemographicChange => Concept::DemographicIndex,
            Pillar::HousingMarket => Concept::HousingIndex,
            Pillar::Gentrification => Concept::GentrificationIndex,
        }
    }

    pub fn category(field: CategoryField) -> Concept {
        match field {
            CategoryField::DisplacementRisk => Concept::DisplacementRisk,
            CategoryField::VulnerablePopulation => Concept::VulnerableFlag,
            CategoryField::DemographicChange => Concept::DemographicFlag,
            CategoryField::HousingMarket => Concept::HousingMarket,
            CategoryField::GentrificationStage => Concept::GentrificationStage,
        }
    }

    pub fn metric(metric: Metric) -> Concept {
        match metric {
            Metric::Income => Concept::Income,
            Metric::HomeValue => Concept::HomeValue,
            Metric::PctBachelors => Concept::PctBachelors,
            Metric::PctCostBurdened => Concept::PctCostBurdened,
        }
    }
}

/// Declarative table: concept → ordered candidate aliases.
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptCatalog {
    entries: Vec<(Concept, Vec<String>)>,
}

impl Default for ConceptCatalog {
    fn default() -> Self {
        let table: &[(Concept, &[&str])] = &[
            (
                Concept::TractId,
                &[
                    "geoid", "geoid22", "geoid20", "geoid10", "tractce", "tractce20", "tract", "fips",
                    "census_tract", "geo_id",
                ],
            ),
            (
                Concept::TractName,
                &["namelsad", "namelsad20", "name22", "name20", "name", "tract_name", "label"],
            ),
            (
                Concept::Neighborhood,
                &["neighborho", "neighborhood", "neighborhood_name", "nbhd"],
            ),
            (
                Concept::Typology,
                &[
                    "typology", "typ_label", "type", "displ_type", "displacement", "risk_category",
                    "risk_level", "displacement_risk", "displaceme", "gentrification",
                ],
            ),
            (
                Concept::VulnerabilityIndex,
                &[
                    "z_vul", "vulnerability", "vuln_index", "vuln_score", "vul_score", "vulnerable",
                    "z_vulnerability",
                ],
            ),
            (
                Concept::DemographicIndex,
                &[
                    "z_dem", "demographic", "demo_change", "dem_score", "z_demographic",
                    "demographic_change",
                ],
            ),
            (
                Concept::HousingIndex,
                &[
                    "z_hous", "housing", "housing_change", "hous_score", "z_housing", "market_change",
                    "housing_market",
                ],
            ),
            (
                Concept::DisplacementIndex,
                &["z_disp", "displacement_index", "disp_score", "z_displacement"],
            ),
            (
                Concept::GentrificationIndex,
                &["z_gent", "gentrification_index", "gent_score", "z_gentrification"],
            ),
            (
                Concept::DisplacementRisk,
                &["displaceme", "displacement_risk", "displacement_risk_category", "risk_category"],
            ),
            (
                Concept::VulnerableFlag,
                &["vulnerabil", "vulnerable_population", "vulnerable_pop", "vulnerable"],
            ),
            (
                Concept::DemographicFlag,
                &["demographi", "demographic_change_flag", "demo_change_flag", "demographic_change"],
            ),
            (
                Concept::HousingMarket,
                &["housing_ma", "housing_market_type", "housing_market_category", "housing_market"],
            ),
            (
                Concept::GentrificationStage,
                &["gentrifica", "gentrification_stage", "gentrification"],
            ),
            (
                Concept::Income,
                &[
                    "medhhinc", "med_hh_inc", "median_household_income", "median_income", "hh_income",
                    "income", "medincome",
                ],
            ),
            (
                Concept::HomeValue,
                &[
                    "medhomeval", "med_home_val", "median_home_value", "home_value", "medval",
                    "median_value", "homevalue",
                ],
            ),
            (
                Concept::PctBachelors,
                &[
                    "pctbach", "pct_bach", "pct_bachelors", "bachelors", "pct_ba", "bach_pct",
                    "pct_college",
                ],
            ),
            (
                Concept::PctCostBurdened,
                &[
                    "pctcostburd", "pct_cost_burd", "pct_cost_burdened", "cost_burdened", "costburden",
                    "pct_burdened",
                ],
            ),
        ];

        Self {
            entries: table
                .iter()
                .map(|(c, aliases)| (*c, aliases.iter().map(|a| a.to_string()).collect()))
                .collect(),
        }
    }
}

impl ConceptCatalog {
    /// Build a catalog from explicit entries (order is preserved).
    pub fn from_entries(entries: Vec<(Concept, Vec<String>)>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[(Concept, Vec<String>)] {
        &self.entries
    }

    pub fn candidates(&self, concept: Concept) -> &[String] {
        self.entries
            .iter()
            .find(|(c, _)| *c == concept)
            .map(|(_, a)| a.as_slice())
            .unwrap_or(&[])
    }

    /// Put operator-supplied aliases ahead of the built-in ones.
    pub fn prepend_aliases(&mut self, concept: Concept, aliases: &[String]) {
        match self.entries.iter_mut().find(|(c, _)| *c == concept) {
            Some((_, existing)) => {
                let mut merged: Vec<String> = aliases.to_vec();
                merged.extend(existing.iter().filter(|a| !aliases.contains(a)).cloned());
                *existing = merged;
            }
            None => self.entries.push((concept, aliases.to_vec())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepended_aliases_take_priority() {
        let mut catalog = ConceptCatalog::default();
        catalog.prepend_aliases(Concept::Income, &["hhinc_2022".to_string(), "income".to_string()]);
        let c = catalog.candidates(Concept::Income);
        assert_eq!(c[0], "hhinc_2022");
        assert_eq!(c[1], "income");
        assert_eq!(c.iter().filter(|a| *a == "income").count(), 1);
    }

    #[test]
    fn every_pillar_has_a_direct_concept_with_aliases() {
        let catalog = ConceptCatalog::default();
        for pillar in Pillar::ALL {
            assert!(!catalog.candidates(Concept::direct(pillar)).is_empty());
        }
    }
}
