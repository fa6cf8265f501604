//! Descriptive statistics over columns with missing values.
//!
//! Every function here takes `Option<f64>` slices: `None` (and any non-finite
//! value) is treated as missing and excluded from the estimate rather than
//! imputed as zero.

/// Finite values of a column, in order.
pub fn present(values: &[Option<f64>]) -> Vec<f64> {
    values
        .iter()
        .filter_map(|v| *v)
        .filter(|v| v.is_finite())
        .collect()
}

pub fn mean(values: &[Option<f64>]) -> Option<f64> {
    let xs = present(values);
    if xs.is_empty() {
        return None;
    }
    Some(xs.iter().sum::<f64>() / xs.len() as f64)
}

/// Population standard deviation (divisor `n`).
pub fn population_std(values: &[Option<f64>]) -> Option<f64> {
    let xs = present(values);
    if xs.is_empty() {
        return None;
    }
    let n = xs.len() as f64;
    let mu = xs.iter().sum::<f64>() / n;
    let variance = xs.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / n;
    Some(variance.sqrt())
}

/// Median of the present values (mean of the two middle values for even `n`).
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut xs = present(values);
    if xs.is_empty() {
        return None;
    }
    xs.sort_by(|a, b| a.total_cmp(b));
    let mid = xs.len() / 2;
    if xs.len() % 2 == 0 {
        Some((xs[mid - 1] + xs[mid]) / 2.0)
    } else {
        Some(xs[mid])
    }
}

/// Outcome of standardizing one column.
#[derive(Debug, Clone, PartialEq)]
pub enum ZScores {
    /// `(x - mean) / std` per row; missing rows stay missing.
    Standardized(Vec<Option<f64>>),
    /// Zero or undefined spread: every row (missing ones included) is `0.0`.
    Flat(Vec<Option<f64>>),
}

impl ZScores {
    pub fn values(&self) -> &[Option<f64>] {
        match self {
            ZScores::Standardized(v) | ZScores::Flat(v) => v,
        }
    }

    pub fn into_values(self) -> Vec<Option<f64>> {
        match self {
            ZScores::Standardized(v) | ZScores::Flat(v) => v,
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, ZScores::Flat(_))
    }
}

/// Population z-score of a column.
pub fn zscore(values: &[Option<f64>]) -> ZScores {
    let (Some(mu), Some(sigma)) = (mean(values), population_std(values)) else {
        return ZScores::Flat(vec![Some(0.0); values.len()]);
    };
    if !(sigma.is_finite() && sigma > 0.0) {
        return ZScores::Flat(vec![Some(0.0); values.len()]);
    }
    ZScores::Standardized(
        values
            .iter()
            .map(|v| v.filter(|x| x.is_finite()).map(|x| (x - mu) / sigma))
            .collect(),
    )
}

/// Min-max rescale into `[0, scale]`.
///
/// A degenerate range (all values equal) maps every value to `scale / 2`.
pub fn min_max_scale(values: &[f64], scale: f64) -> Vec<f64> {
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = hi - lo;
    if !range.is_finite() || range == 0.0 {
        return vec![scale / 2.0; values.len()];
    }
    values.iter().map(|v| (v - lo) / range * scale).collect()
}

/// Pearson correlation over rows where both sides are present.
///
/// Returns `None` with fewer than three paired rows or zero spread.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((*x, *y)),
            _ => None,
        })
        .collect();
    if pairs.len() < 3 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in &pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    let denom = (sxx * syy).sqrt();
    if denom > 0.0 { Some(sxy / denom) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_handles_even_and_missing() {
        assert_eq!(median(&[Some(3.0), None, Some(1.0), Some(2.0)]), Some(2.0));
        assert_eq!(median(&[Some(4.0), Some(1.0), Some(2.0), Some(3.0)]), Some(2.5));
        assert_eq!(median(&[None, None]), None);
    }

    #[test]
    fn population_std_uses_n_divisor() {
        // Values 2, 4, 4, 4, 5, 5, 7, 9 have population std exactly 2.
        let xs: Vec<Option<f64>> = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]
            .into_iter()
            .map(Some)
            .collect();
        assert!((population_std(&xs).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn zscore_of_constant_column_is_exactly_zero() {
        let z = zscore(&[Some(5.0), Some(5.0), None, Some(5.0)]);
        assert!(z.is_flat());
        assert_eq!(z.values(), &[Some(0.0), Some(0.0), Some(0.0), Some(0.0)]);
    }

    #[test]
    fn zscore_excludes_missing_from_estimate() {
        let z = zscore(&[Some(1.0), None, Some(3.0)]);
        assert_eq!(z.values(), &[Some(-1.0), None, Some(1.0)]);
    }

    #[test]
    fn min_max_scale_degenerate_range_is_midpoint() {
        assert_eq!(min_max_scale(&[0.7, 0.7, 0.7], 100.0), vec![50.0, 50.0, 50.0]);
        assert_eq!(min_max_scale(&[10.0, 20.0, 30.0], 100.0), vec![0.0, 50.0, 100.0]);
        assert!(min_max_scale(&[], 100.0).is_empty());
    }

    #[test]
    fn min_max_scale_keeps_tiny_nonzero_ranges() {
        let scaled = min_max_scale(&[1e-13, 2e-13, 3e-13], 100.0);
        assert_eq!(scaled[0], 0.0);
        assert!((scaled[1] - 50.0).abs() < 1e-6);
        assert_eq!(scaled[2], 100.0);
    }

    #[test]
    fn pearson_detects_perfect_correlation() {
        let xs = [Some(1.0), Some(2.0), Some(3.0), None];
        let ys = [Some(2.0), Some(4.0), Some(6.0), Some(1.0)];
        assert!((pearson(&xs, &ys).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(pearson(&xs[..2], &ys[..2]), None);
    }
}
