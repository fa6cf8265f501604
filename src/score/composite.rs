//! Weighted composite of the pillar scores.
//!
//! Missing pillar values are imputed with the pillar median (or `0.0` when the
//! pillar has no values at all), the imputed pillar matrix is multiplied by
//! the weight vector, and the raw sums are min-max rescaled onto `[0, 100]`.

use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use tracing::info;

use crate::domain::{CompositeScore, DviWeights, Pillar};
use crate::math::{median, min_max_scale, Precision};
use crate::score::PillarColumn;

/// Upper bound of the normalized index.
pub const DVI_SCALE: f64 = 100.0;

/// Per-pillar imputation outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Imputation {
    pub pillar: Pillar,
    pub weight: f64,
    /// Value substituted for missing rows.
    pub fill_value: f64,
    pub imputed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeResult {
    #[serde(skip)]
    pub scores: Vec<CompositeScore>,
    /// Imputed pillar values, in the order of the input columns.
    #[serde(skip)]
    pub pillar_values: Vec<(Pillar, Vec<f64>)>,
    pub imputation: Vec<Imputation>,
    pub raw_range: Option<(f64, f64)>,
    pub dvi_range: Option<(f64, f64)>,
}

/// Fill missing values with the column median; returns the fill value and
/// how many rows were filled.
pub fn impute_median(values: &[Option<f64>]) -> (Vec<f64>, f64, usize) {
    let fill = median(values).unwrap_or(0.0);
    let mut imputed = 0;
    let out = values
        .iter()
        .map(|v| match v.filter(|x| x.is_finite()) {
            Some(x) => x,
            None => {
                imputed += 1;
                fill
            }
        })
        .collect();
    (out, fill, imputed)
}

/// Combine pillar columns into raw and normalized composite scores.
///
/// Pillars not named by `weights` contribute with weight `0.0`.
pub fn composite_scores(columns: &[PillarColumn], weights: &DviWeights) -> CompositeResult {
    let n = columns.first().map(|c| c.values.len()).unwrap_or(0);

    let mut imputation = Vec::with_capacity(columns.len());
    let mut pillar_values = Vec::with_capacity(columns.len());
    let mut matrix = DMatrix::<f64>::zeros(n, columns.len());

    for (j, column) in columns.iter().enumerate() {
        let (filled, fill_value, imputed) = impute_median(&column.values);
        for (i, v) in filled.iter().enumerate() {
            matrix[(i, j)] = *v;
        }
        if imputed > 0 {
            info!(pillar = column.pillar.key(), imputed, fill_value, "imputed missing pillar values with median");
        }
        imputation.push(Imputation {
            pillar: column.pillar,
            weight: weights.get(column.pillar),
            fill_value,
            imputed,
        });
        pillar_values.push((column.pillar, filled));
    }

    let w = DVector::from_iterator(columns.len(), columns.iter().map(|c| weights.get(c.pillar)));
    let raw: Vec<f64> = (&matrix * &w).iter().copied().collect();
    let scaled = min_max_scale(&raw, DVI_SCALE);

    let scores: Vec<CompositeScore> = raw
        .iter()
        .zip(&scaled)
        .map(|(r, s)| CompositeScore {
            dvi_raw: *r,
            dvi: Precision::Score.round(Some(*s)).unwrap_or(*s),
        })
        .collect();

    let raw_range = range(scores.iter().map(|s| s.dvi_raw));
    let dvi_range = range(scores.iter().map(|s| s.dvi));

    CompositeResult {
        scores,
        pillar_values,
        imputation,
        raw_range,
        dvi_range,
    }
}

fn range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}
