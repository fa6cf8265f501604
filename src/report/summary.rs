//! Run summary statistics: distribution, category breakdown, rankings, and
//! socioeconomic context for the scored tracts.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::data::JoinReport;
use crate::domain::{CategoryField, Metric, Pillar};
use crate::io::TractTable;
use crate::math::{mean, median, pearson, present};
use crate::score::{CompositeResult, PillarColumn, PillarSource};

/// Lower edges of the DVI distribution bins.
const BIN_EDGES: [f64; 5] = [0.0, 20.0, 40.0, 60.0, 80.0];
const BIN_LABELS: [&str; 5] = ["0-20 Low", "20-40", "40-60", "60-80", "80-100 High"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PillarCoverage {
    pub pillar: Pillar,
    pub weight: f64,
    pub source: String,
    pub present: usize,
    pub imputed: usize,
    pub unknown_categories: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DviBin {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub category: String,
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTract {
    pub region: String,
    pub dvi: f64,
    pub displacement_risk: String,
    pub income: Option<f64>,
    pub pct_cost_burdened: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub metric: Metric,
    pub n: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Pearson r against `dvi` (needs at least three paired rows).
    pub dvi_correlation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinCoverage {
    pub matched: usize,
    pub total: usize,
    pub fetched_counties: usize,
    pub failed_counties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub tracts: usize,
    pub columns_resolved: usize,
    /// Concepts with no matching column.
    pub columns_missing: Vec<String>,
    pub pillars: Vec<PillarCoverage>,
    pub join: Option<JoinCoverage>,
    pub dvi_mean: Option<f64>,
    pub dvi_median: Option<f64>,
    pub bins: Vec<DviBin>,
    pub by_category: Vec<CategoryStats>,
    pub top: Vec<RankedTract>,
    pub metrics: Vec<MetricSummary>,
}

/// Short description of where a pillar came from.
pub fn describe_source(source: &PillarSource) -> String {
    match source {
        PillarSource::Direct { column } => format!("index column `{column}`"),
        PillarSource::Categorical { column } => format!("category `{column}`"),
        PillarSource::ZScore { metrics } => {
            let names: Vec<&str> = metrics.iter().map(|m| m.export_key()).collect();
            format!("z-score of {}", names.join(" + "))
        }
        PillarSource::Default => "constant 0.0 (no data)".to_string(),
    }
}

pub fn build_summary(
    table: &TractTable,
    pillars: &[PillarColumn],
    composite: &CompositeResult,
    join: Option<&JoinReport>,
    top_n: usize,
) -> RunSummary {
    let dvi: Vec<f64> = composite.scores.iter().map(|s| s.dvi).collect();
    let dvi_opt: Vec<Option<f64>> = dvi.iter().copied().map(Some).collect();

    let pillar_coverage = pillars
        .iter()
        .zip(&composite.imputation)
        .map(|(p, imp)| PillarCoverage {
            pillar: p.pillar,
            weight: imp.weight,
            source: describe_source(&p.source),
            present: p.present(),
            imputed: imp.imputed,
            unknown_categories: p.unknown_values.values().sum(),
        })
        .collect();

    let join = join.map(|j| JoinCoverage {
        matched: j.matched,
        total: j.total,
        fetched_counties: j.fetched_counties(),
        failed_counties: j.failed_counties().into_iter().map(str::to_string).collect(),
    });

    RunSummary {
        tracts: table.len(),
        columns_resolved: table.schema.matched().len(),
        columns_missing: table
            .schema
            .unmatched()
            .into_iter()
            .map(|c| c.key().to_string())
            .collect(),
        pillars: pillar_coverage,
        join,
        dvi_mean: mean(&dvi_opt),
        dvi_median: median(&dvi_opt),
        bins: dvi_bins(&dvi),
        by_category: by_category(table, &dvi),
        top: top_tracts(table, &dvi, top_n),
        metrics: metric_summaries(table, &dvi_opt),
    }
}

/// Five fixed-width bins; the top bin includes 100.
pub fn dvi_bins(dvi: &[f64]) -> Vec<DviBin> {
    let mut counts = [0usize; 5];
    for v in dvi {
        let idx = BIN_EDGES.iter().rposition(|edge| *v >= *edge).unwrap_or(0);
        counts[idx] += 1;
    }
    BIN_LABELS
        .iter()
        .zip(counts)
        .map(|(label, count)| DviBin {
            label: label.to_string(),
            count,
        })
        .collect()
}

/// DVI statistics per displacement-risk category, highest mean first.
pub fn by_category(table: &TractTable, dvi: &[f64]) -> Vec<CategoryStats> {
    let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for (record, v) in table.records.iter().zip(dvi) {
        groups
            .entry(record.category(CategoryField::DisplacementRisk))
            .or_default()
            .push(*v);
    }

    let mut out: Vec<CategoryStats> = groups
        .into_iter()
        .map(|(category, values)| CategoryStats {
            category: category.to_string(),
            count: values.len(),
            mean: values.iter().sum::<f64>() / values.len() as f64,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
        .collect();
    out.sort_by(|a, b| b.mean.total_cmp(&a.mean));
    out
}

/// The `n` highest-DVI tracts; ties keep input order.
pub fn top_tracts(table: &TractTable, dvi: &[f64], n: usize) -> Vec<RankedTract> {
    let mut order: Vec<usize> = (0..dvi.len()).collect();
    order.sort_by(|a, b| dvi[*b].total_cmp(&dvi[*a]));
    order
        .into_iter()
        .take(n)
        .map(|i| {
            let r = &table.records[i];
            RankedTract {
                region: r.region_label.clone(),
                dvi: dvi[i],
                displacement_risk: r.category(CategoryField::DisplacementRisk).to_string(),
                income: r.metrics.income,
                pct_cost_burdened: r.metrics.pct_cost_burdened,
            }
        })
        .collect()
}

fn metric_summaries(table: &TractTable, dvi: &[Option<f64>]) -> Vec<MetricSummary> {
    Metric::ALL
        .into_iter()
        .filter_map(|metric| {
            let values = table.metric_values(metric);
            let xs = present(&values);
            if xs.is_empty() {
                return None;
            }
            Some(MetricSummary {
                metric,
                n: xs.len(),
                mean: mean(&values)?,
                median: median(&values)?,
                min: xs.iter().copied().fold(f64::INFINITY, f64::min),
                max: xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                dvi_correlation: pearson(dvi, &values),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{build_tract_table, parse_feature_collection};
    use crate::schema::ConceptCatalog;
    use serde_json::json;

    fn table() -> TractTable {
        let features: Vec<_> = [
            ("Vulnerable", 40000.0),
            ("Chronic Displacement Risk", 30000.0),
            ("Vulnerable", 60000.0),
            ("Stable", 90000.0),
        ]
        .iter()
        .enumerate()
        .map(|(i, (risk, income))| {
            json!({"type": "Feature", "geometry": null, "properties": {
                "geoid": format!("{}", 48453000100u64 + i as u64),
                "displaceme": risk,
                "median_income": income
            }})
        })
        .collect();
        let text = json!({"type": "FeatureCollection", "features": features}).to_string();
        build_tract_table(parse_feature_collection(&text).unwrap(), &ConceptCatalog::default())
    }

    #[test]
    fn bins_cover_the_full_range() {
        let bins = dvi_bins(&[0.0, 19.9, 20.0, 55.0, 80.0, 100.0]);
        let counts: Vec<usize> = bins.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![2, 1, 1, 0, 2]);
        assert_eq!(bins[4].label, "80-100 High");
    }

    #[test]
    fn categories_are_ordered_by_mean_dvi() {
        let t = table();
        let stats = by_category(&t, &[50.0, 100.0, 70.0, 0.0]);
        assert_eq!(stats[0].category, "Chronic Displacement Risk");
        assert_eq!(stats[1].category, "Vulnerable");
        assert_eq!(stats[1].count, 2);
        assert_eq!(stats[1].mean, 60.0);
        assert_eq!(stats[1].min, 50.0);
        assert_eq!(stats[2].category, "Stable");
    }

    #[test]
    fn top_tracts_are_ranked_by_dvi() {
        let t = table();
        let top = top_tracts(&t, &[50.0, 100.0, 70.0, 0.0], 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].dvi, 100.0);
        assert_eq!(top[0].displacement_risk, "Chronic Displacement Risk");
        assert_eq!(top[1].income, Some(60000.0));
    }

    #[test]
    fn metric_summary_reports_negative_income_correlation() {
        let t = table();
        let dvi = [Some(50.0), Some(100.0), Some(70.0), Some(0.0)];
        let summaries = metric_summaries(&t, &dvi);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].metric, Metric::Income);
        assert_eq!(summaries[0].n, 4);
        assert_eq!(summaries[0].median, 50000.0);
        assert!(summaries[0].dvi_correlation.unwrap() < 0.0);
    }

    #[test]
    fn sources_are_described_for_humans() {
        assert_eq!(describe_source(&PillarSource::Default), "constant 0.0 (no data)");
        let z = PillarSource::ZScore {
            metrics: vec![Metric::PctBachelors, Metric::Income],
        };
        assert_eq!(describe_source(&z), "z-score of pct_bachelors + median_income");
    }
}
