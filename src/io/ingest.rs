//! Tract table construction.
//!
//! Turns a loaded FeatureCollection into one `TractRecord` per feature, using
//! the schema report to find identifiers, labels, categorical fields and raw
//! metrics. Nothing here is fatal except an unreadable or empty input: missing
//! columns leave the dependent fields empty, and bad cells become `None` and
//! are counted.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::domain::{CategoryField, Metric, RawMetrics, TractRecord};
use crate::error::AppError;
use crate::io::{read_feature_collection, FeatureCollection};
use crate::math::{coerce_f64, coerce_text};
use crate::schema::{resolve_columns, Concept, ConceptCatalog, SchemaReport};

/// Width of a full state+county+tract GEOID.
pub const GEO_ID_WIDTH: usize = 11;

/// Where a raw metric's values came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "column", rename_all = "snake_case")]
pub enum MetricSource {
    /// A property column of the input collection.
    Column(String),
    /// The ACS county join.
    Census,
}

/// Counters collected while building the table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestStats {
    pub features: usize,
    pub with_geo_id: usize,
    /// Non-empty metric cells that could not be read as numbers.
    pub invalid_metric_values: BTreeMap<Metric, usize>,
}

/// The primary dataset plus everything derived from it at load time.
#[derive(Debug, Clone)]
pub struct TractTable {
    pub collection: FeatureCollection,
    pub schema: SchemaReport,
    pub records: Vec<TractRecord>,
    pub metric_sources: BTreeMap<Metric, MetricSource>,
    pub stats: IngestStats,
}

impl TractTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Raw property values of `column`, one per feature (`None` when absent).
    pub fn column_values(&self, column: &str) -> Vec<Option<&Value>> {
        self.collection
            .features
            .iter()
            .map(|f| f.property(column))
            .collect()
    }

    /// Column-major view of one raw metric.
    pub fn metric_values(&self, metric: Metric) -> Vec<Option<f64>> {
        self.records.iter().map(|r| r.metrics.get(metric)).collect()
    }

    pub fn has_metric(&self, metric: Metric) -> bool {
        self.metric_sources.contains_key(&metric)
    }
}

/// Load the primary dataset and build its tract table.
pub fn load_tract_table(path: &Path, catalog: &ConceptCatalog) -> Result<TractTable, AppError> {
    let collection = read_feature_collection(path)?;
    if collection.features.is_empty() {
        return Err(AppError::new(
            AppError::NO_DATA,
            format!("Input '{}' contains no features.", path.display()),
        ));
    }
    info!(path = %path.display(), features = collection.features.len(), "loaded feature collection");
    Ok(build_tract_table(collection, catalog))
}

/// Resolve the schema and build one record per feature, in input order.
pub fn build_tract_table(collection: FeatureCollection, catalog: &ConceptCatalog) -> TractTable {
    let columns = collection.property_columns();
    let schema = resolve_columns(&columns, catalog);
    schema.log();

    let id_col = schema.column(Concept::TractId);
    let name_col = schema.column(Concept::TractName);
    let nbhd_col = schema.column(Concept::Neighborhood);
    let typology_col = schema.column(Concept::Typology);

    let metric_cols: Vec<(Metric, &str)> = Metric::ALL
        .into_iter()
        .filter_map(|m| schema.column(Concept::metric(m)).map(|c| (m, c)))
        .collect();
    let category_cols: Vec<(CategoryField, &str)> = CategoryField::ALL
        .into_iter()
        .filter_map(|f| schema.column(Concept::category(f)).map(|c| (f, c)))
        .collect();

    let mut stats = IngestStats {
        features: collection.features.len(),
        ..IngestStats::default()
    };
    let mut records = Vec::with_capacity(collection.features.len());

    for (i, feature) in collection.features.iter().enumerate() {
        let text = |col: Option<&str>| col.and_then(|c| feature.property(c)).and_then(coerce_text);

        let id_value = id_col.and_then(|c| feature.property(c));
        let geo_id = id_value.and_then(geo_id_from_value);
        if geo_id.is_some() {
            stats.with_geo_id += 1;
        }
        let id_text = geo_id.clone().or_else(|| id_value.and_then(coerce_text));

        let neighborhood = text(nbhd_col);
        let region_label = region_label(
            i,
            neighborhood.as_deref(),
            text(name_col).as_deref(),
            text(typology_col).as_deref(),
            id_text.as_deref(),
        );

        let mut metrics = RawMetrics::default();
        for (metric, col) in &metric_cols {
            let Some(raw) = feature.property(col) else { continue };
            let value = coerce_f64(raw);
            if value.is_none() && coerce_text(raw).is_some() {
                *stats.invalid_metric_values.entry(*metric).or_default() += 1;
            }
            metrics.set(*metric, value);
        }

        let categories = category_cols
            .iter()
            .filter_map(|(field, col)| text(Some(*col)).map(|v| (*field, v)))
            .collect();

        records.push(TractRecord {
            geo_id,
            region_label,
            neighborhood,
            metrics,
            categories,
        });
    }

    for (metric, count) in &stats.invalid_metric_values {
        warn!(metric = metric.export_key(), count, "non-numeric metric values treated as missing");
    }
    if id_col.is_some() && stats.with_geo_id < stats.features {
        warn!(
            usable = stats.with_geo_id,
            total = stats.features,
            "some features lack a usable GEOID"
        );
    }

    let metric_sources = metric_cols
        .iter()
        .map(|(m, c)| (*m, MetricSource::Column(c.to_string())))
        .collect();

    TractTable {
        collection,
        schema,
        records,
        metric_sources,
        stats,
    }
}

/// Normalize a textual GEOID: strip a float suffix, require digits, zero-pad.
pub fn normalize_geo_id(raw: &str) -> Option<String> {
    let mut s = raw.trim();
    if let Some(stripped) = s.strip_suffix(".0") {
        s = stripped;
    }
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{s:0>width$}", width = GEO_ID_WIDTH))
}

/// Normalize a GEOID stored either as a string or as a JSON number.
pub fn geo_id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => normalize_geo_id(s),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return normalize_geo_id(&u.to_string());
            }
            let f = n.as_f64()?;
            if f.is_finite() && f >= 0.0 && f.fract() == 0.0 {
                normalize_geo_id(&format!("{f:.0}"))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// State+county prefix of a normalized GEOID.
pub fn county_code(geo_id: &str) -> Option<&str> {
    geo_id.get(..5).filter(|c| c.len() == 5)
}

/// Human-readable label for one tract.
///
/// Preference order: neighborhood (with the tract name when present), tract
/// name, typology with id, bare id, then a positional fallback.
pub fn region_label(
    index: usize,
    neighborhood: Option<&str>,
    tract_name: Option<&str>,
    typology: Option<&str>,
    tract_id: Option<&str>,
) -> String {
    if let Some(nbhd) = neighborhood {
        return match tract_name {
            Some(name) => format!("{nbhd} (Tract {name})"),
            None => nbhd.to_string(),
        };
    }
    if let Some(name) = tract_name {
        return if name.starts_with("Census Tract") {
            name.to_string()
        } else {
            format!("Census Tract {name}")
        };
    }
    match (typology, tract_id) {
        (Some(typ), Some(id)) => format!("{typ} - Tract {id}"),
        (None, Some(id)) => format!("Tract {id}"),
        _ => format!("Tract_{index}"),
    }
}
