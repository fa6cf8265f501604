//! Pillar score construction.
//!
//! Each pillar is built from the best available evidence, in order:
//!
//! 1. a pre-computed index column,
//! 2. the ordinal encoding of a categorical typology column,
//! 3. z-scores of raw socioeconomic metrics,
//! 4. a constant `0.0`.
//!
//! The chosen path is recorded on the result (`PillarSource`) together with
//! coverage and data-quality counters.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{CategoryField, EncodingTables, Encoded, Metric, Pillar};
use crate::io::TractTable;
use crate::math::{coerce_f64, coerce_text, zscore};
use crate::schema::Concept;

/// How a pillar's values were obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PillarSource {
    Direct { column: String },
    Categorical { column: String },
    ZScore { metrics: Vec<Metric> },
    /// No usable evidence; the pillar is constant `0.0`.
    Default,
}

/// One pillar's values, one per tract, plus provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PillarColumn {
    pub pillar: Pillar,
    pub source: PillarSource,
    #[serde(skip)]
    pub values: Vec<Option<f64>>,
    /// Direct-column cells that were present but not numeric.
    pub invalid: usize,
    /// Categorical values outside the encoding vocabulary, with counts.
    pub unknown_values: BTreeMap<String, usize>,
    /// Raw metrics whose spread was zero or undefined.
    pub flat_metrics: Vec<Metric>,
}

impl PillarColumn {
    fn new(pillar: Pillar, source: PillarSource, values: Vec<Option<f64>>) -> Self {
        Self {
            pillar,
            source,
            values,
            invalid: 0,
            unknown_values: BTreeMap::new(),
            flat_metrics: Vec::new(),
        }
    }

    pub fn present(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn missing(&self) -> usize {
        self.values.len() - self.present()
    }

    pub fn is_degraded(&self) -> bool {
        self.source == PillarSource::Default
    }
}

/// Raw metrics a pillar can be synthesized from when no index or category
/// column exists.
pub fn raw_fallback(pillar: Pillar) -> &'static [Metric] {
    match pillar {
        Pillar::Vulnerability => &[Metric::PctCostBurdened],
        Pillar::DemographicChange => &[Metric::PctBachelors, Metric::Income],
        Pillar::HousingMarket => &[Metric::HomeValue],
        Pillar::DisplacementRisk | Pillar::Gentrification => &[],
    }
}

/// Build every pillar in `pillars`, in the given order.
pub fn build_pillars(
    pillars: &[Pillar],
    table: &TractTable,
    encodings: &EncodingTables,
) -> Vec<PillarColumn> {
    pillars
        .iter()
        .map(|p| build_pillar(*p, table, encodings))
        .collect()
}

/// Build one pillar following the evidence precedence.
pub fn build_pillar(pillar: Pillar, table: &TractTable, encodings: &EncodingTables) -> PillarColumn {
    let built = from_direct(pillar, table)
        .or_else(|| from_category(pillar, table, encodings))
        .or_else(|| from_metrics(pillar, table));

    match built {
        Some(column) => {
            info!(
                pillar = pillar.key(),
                source = ?column.source,
                present = column.present(),
                missing = column.missing(),
                "pillar built"
            );
            column
        }
        None => {
            warn!(pillar = pillar.key(), "no data for pillar; using constant 0.0");
            PillarColumn::new(pillar, PillarSource::Default, vec![Some(0.0); table.len()])
        }
    }
}

fn from_direct(pillar: Pillar, table: &TractTable) -> Option<PillarColumn> {
    let column = table.schema.column(Concept::direct(pillar))?;
    let mut invalid = 0;
    let values: Vec<Option<f64>> = table
        .column_values(column)
        .into_iter()
        .map(|raw| {
            let raw = raw?;
            let v = coerce_f64(raw);
            if v.is_none() && coerce_text(raw).is_some() {
                invalid += 1;
            }
            v
        })
        .collect();

    if values.iter().all(Option::is_none) {
        warn!(
            pillar = pillar.key(),
            column, "index column has no numeric values; trying other sources"
        );
        return None;
    }
    if invalid > 0 {
        warn!(pillar = pillar.key(), column, invalid, "non-numeric index values treated as missing");
    }

    let mut out = PillarColumn::new(
        pillar,
        PillarSource::Direct {
            column: column.to_string(),
        },
        values,
    );
    out.invalid = invalid;
    Some(out)
}

fn from_category(
    pillar: Pillar,
    table: &TractTable,
    encodings: &EncodingTables,
) -> Option<PillarColumn> {
    let field = CategoryField::for_pillar(pillar);
    let column = table.schema.column(Concept::category(field))?;
    let Some(encoding) = encodings.table(field) else {
        warn!(field = field.key(), "no encoding table for categorical field");
        return None;
    };

    let mut unknown: BTreeMap<String, usize> = BTreeMap::new();
    let values = table
        .records
        .iter()
        .map(|r| {
            let raw = r.categories.get(&field).map(String::as_str);
            let encoded = encoding.encode(raw);
            if encoded == Encoded::Unknown {
                if let Some(v) = raw {
                    *unknown.entry(v.to_string()).or_default() += 1;
                }
            }
            Some(encoded.score())
        })
        .collect();

    for (value, count) in &unknown {
        warn!(
            pillar = pillar.key(),
            column,
            value = %value,
            count,
            "unrecognized category scored as 0.0"
        );
    }

    let mut out = PillarColumn::new(
        pillar,
        PillarSource::Categorical {
            column: column.to_string(),
        },
        values,
    );
    out.unknown_values = unknown;
    Some(out)
}

fn from_metrics(pillar: Pillar, table: &TractTable) -> Option<PillarColumn> {
    let mut used = Vec::new();
    let mut flat = Vec::new();
    let mut columns = Vec::new();

    for metric in raw_fallback(pillar) {
        if !table.has_metric(*metric) {
            continue;
        }
        let raw = table.metric_values(*metric);
        if raw.iter().all(Option::is_none) {
            continue;
        }
        let z = zscore(&raw);
        if z.is_flat() {
            warn!(
                pillar = pillar.key(),
                metric = metric.export_key(),
                "metric has zero variance; its z-score is 0.0"
            );
            flat.push(*metric);
        }
        used.push(*metric);
        columns.push(z.into_values());
    }

    if columns.is_empty() {
        return None;
    }

    let values = (0..table.len())
        .map(|i| {
            let available: Vec<f64> = columns.iter().filter_map(|c| c[i]).collect();
            if available.is_empty() {
                None
            } else {
                Some(available.iter().sum::<f64>() / available.len() as f64)
            }
        })
        .collect();

    let mut out = PillarColumn::new(pillar, PillarSource::ZScore { metrics: used }, values);
    out.flat_metrics = flat;
    Some(out)
}
