//! Ordinal encodings for categorical typology fields.
//!
//! Each categorical field has a finite vocabulary mapped onto `[0, 1]`.
//! Lookup is exact first, then trimmed and case-insensitive.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{CategoryField, UNKNOWN_CATEGORY};
use crate::error::AppError;

/// Result of encoding one categorical value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Encoded {
    Known(f64),
    /// The value is outside the vocabulary; scored as `0.0`.
    Unknown,
}

impl Encoded {
    pub fn score(self) -> f64 {
        match self {
            Encoded::Known(v) => v,
            Encoded::Unknown => 0.0,
        }
    }
}

/// Vocabulary → score table for one categorical field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodingTable(BTreeMap<String, f64>);

impl EncodingTable {
    pub fn from_pairs(pairs: &[(&str, f64)]) -> Self {
        Self(pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect())
    }

    /// Encode a value; an absent value is looked up as the `N/A` sentinel.
    pub fn encode(&self, value: Option<&str>) -> Encoded {
        let raw = value.unwrap_or(UNKNOWN_CATEGORY);
        if let Some(v) = self.0.get(raw) {
            return Encoded::Known(*v);
        }
        let needle = raw.trim();
        let hit = self
            .0
            .iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(needle))
            .map(|(_, v)| *v);
        match hit {
            Some(v) => Encoded::Known(v),
            None if value.is_none() => Encoded::Known(0.0),
            None => Encoded::Unknown,
        }
    }

    fn validate(&self, field: CategoryField) -> Result<(), AppError> {
        for (label, score) in &self.0 {
            if !(score.is_finite() && (0.0..=1.0).contains(score)) {
                return Err(AppError::new(
                    AppError::INPUT,
                    format!(
                        "Encoding for {:?} maps '{label}' to {score}; scores must lie in [0, 1].",
                        field
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Encoding tables for every categorical field.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingTables(BTreeMap<CategoryField, EncodingTable>);

impl Default for EncodingTables {
    fn default() -> Self {
        let flag = EncodingTable::from_pairs(&[("YES", 1.0), ("NO", 0.0), ("N/A", 0.0)]);
        Self(BTreeMap::from([
            (
                CategoryField::DisplacementRisk,
                EncodingTable::from_pairs(&[
                    ("Chronic Displacement Risk", 1.00),
                    ("Active Displacement Risk", 0.75),
                    ("Vulnerable", 0.50),
                    ("N/A", 0.00),
                ]),
            ),
            (CategoryField::VulnerablePopulation, flag.clone()),
            (CategoryField::DemographicChange, flag),
            (
                CategoryField::HousingMarket,
                EncodingTable::from_pairs(&[
                    ("Appreciated", 1.00),
                    ("Accelerating", 0.75),
                    ("Adjacent", 0.50),
                    ("Stable", 0.15),
                    ("N/A", 0.00),
                ]),
            ),
            (
                CategoryField::GentrificationStage,
                EncodingTable::from_pairs(&[
                    ("Late", 1.00),
                    ("Continued Loss", 0.95),
                    ("Rapid Loss", 0.90),
                    ("Historical Displacement", 0.80),
                    ("Dynamic", 0.65),
                    ("Early: Type 2", 0.55),
                    ("Early: Type 1", 0.50),
                    ("Susceptible", 0.30),
                    ("Stable", 0.10),
                    ("N/A", 0.00),
                ]),
            ),
        ]))
    }
}

impl EncodingTables {
    pub fn table(&self, field: CategoryField) -> Option<&EncodingTable> {
        self.0.get(&field)
    }

    /// Replace one field's table (settings-file override).
    pub fn set(&mut self, field: CategoryField, table: EncodingTable) -> Result<(), AppError> {
        table.validate(field)?;
        self.0.insert(field, table);
        Ok(())
    }
}
