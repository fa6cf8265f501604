//! Export the three run artifacts.
//!
//! Every artifact has exactly one entry per input feature, in input order.
//! Files are serialized fully in memory and then written whole (temp file +
//! rename), so a failed run never leaves a half-written artifact behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, json};
use tracing::info;

use crate::domain::{CategoryField, Metric, OutputPaths};
use crate::error::AppError;
use crate::io::{FeatureCollection, TractTable};
use crate::math::Precision;
use crate::score::CompositeResult;

/// Confidence attached to every socioeconomic row.
pub const ROW_CONFIDENCE: f64 = 1.0;

/// Scored run state handed to the exporters.
pub struct ScoredTracts<'a> {
    pub table: &'a TractTable,
    pub composite: &'a CompositeResult,
    pub period_label: &'a str,
    pub data_year: i32,
}

impl ScoredTracts<'_> {
    fn ensure_aligned(&self) -> Result<(), AppError> {
        let n = self.table.len();
        let bad_pillar = self
            .composite
            .pillar_values
            .iter()
            .any(|(_, v)| v.len() != n);
        if self.composite.scores.len() != n || self.table.collection.features.len() != n || bad_pillar {
            return Err(AppError::new(
                AppError::RUNTIME,
                format!(
                    "Row count mismatch: {n} tracts, {} scores, {} features.",
                    self.composite.scores.len(),
                    self.table.collection.features.len()
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexPoint {
    pub region: String,
    pub period: String,
    pub dvi: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SocioeconomicRow {
    pub region: String,
    pub year: i32,
    pub income_adj: Option<f64>,
    pub home_value: Option<f64>,
    pub pct_bachelors: Option<f64>,
    pub pct_cost_burdened: Option<f64>,
    pub confidence: f64,
    pub displacement_risk: String,
    pub vulnerable_population: String,
    pub demographic_change: String,
    pub housing_market: String,
    pub gentrification_stage: String,
    pub neighborhood: Option<String>,
    pub dvi: f64,
}

/// `[{region, period, dvi}]`, one entry per tract.
pub fn index_series(scored: &ScoredTracts<'_>) -> Vec<IndexPoint> {
    scored
        .table
        .records
        .iter()
        .zip(&scored.composite.scores)
        .map(|(r, s)| IndexPoint {
            region: r.region_label.clone(),
            period: scored.period_label.to_string(),
            dvi: s.dvi,
        })
        .collect()
}

/// Per-tract socioeconomic rows with categorical context.
pub fn socioeconomic_series(scored: &ScoredTracts<'_>) -> Vec<SocioeconomicRow> {
    scored
        .table
        .records
        .iter()
        .zip(&scored.composite.scores)
        .map(|(r, s)| {
            let metric = |m: Metric| m.precision().round(r.metrics.get(m));
            let category = |f: CategoryField| r.category(f).to_string();
            SocioeconomicRow {
                region: r.region_label.clone(),
                year: scored.data_year,
                income_adj: metric(Metric::Income),
                home_value: metric(Metric::HomeValue),
                pct_bachelors: metric(Metric::PctBachelors),
                pct_cost_burdened: metric(Metric::PctCostBurdened),
                confidence: ROW_CONFIDENCE,
                displacement_risk: category(CategoryField::DisplacementRisk),
                vulnerable_population: category(CategoryField::VulnerablePopulation),
                demographic_change: category(CategoryField::DemographicChange),
                housing_market: category(CategoryField::HousingMarket),
                gentrification_stage: category(CategoryField::GentrificationStage),
                neighborhood: r.neighborhood.clone(),
                dvi: s.dvi,
            }
        })
        .collect()
}

/// The input collection with scores appended to each feature's properties.
///
/// Geometry is carried over untouched.
pub fn enriched_collection(scored: &ScoredTracts<'_>) -> FeatureCollection {
    let table = scored.table;
    let mut out = table.collection.clone();

    for (i, feature) in out.features.iter_mut().enumerate() {
        let record = &table.records[i];
        let score = &scored.composite.scores[i];
        let props = feature.properties.get_or_insert_with(Map::new);

        props.insert("region_name".to_string(), json!(record.region_label));
        props.insert("dvi".to_string(), json!(score.dvi));
        props.insert("dvi_raw".to_string(), json!(Precision::Raw.round(Some(score.dvi_raw))));
        for (pillar, values) in &scored.composite.pillar_values {
            props.insert(pillar.export_key(), json!(Precision::Raw.round(Some(values[i]))));
        }
        for metric in table.metric_sources.keys() {
            let value = metric.precision().round(record.metrics.get(*metric));
            props.insert(metric.export_key().to_string(), json!(value));
        }
    }
    out
}

/// Write all three artifacts.
pub fn write_outputs(paths: &OutputPaths, scored: &ScoredTracts<'_>) -> Result<(), AppError> {
    scored.ensure_aligned()?;

    let index = index_series(scored);
    let socio = socioeconomic_series(scored);
    let features = enriched_collection(scored);

    write_json_atomic(&paths.index_series, &index, true)?;
    info!(path = %paths.index_series.display(), rows = index.len(), "wrote index series");
    write_json_atomic(&paths.socioeconomic, &socio, true)?;
    info!(path = %paths.socioeconomic.display(), rows = socio.len(), "wrote socioeconomic series");
    write_json_atomic(&paths.features, &features, false)?;
    info!(path = %paths.features.display(), features = features.features.len(), "wrote enriched features");
    Ok(())
}

/// Serialize `value` and replace `path` with it in one rename.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T, pretty: bool) -> Result<(), AppError> {
    let bytes = if pretty {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    }
    .map_err(|e| AppError::new(AppError::RUNTIME, format!("Failed to serialize '{}': {e}", path.display())))?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| {
            AppError::new(AppError::RUNTIME, format!("Failed to create output directory '{}': {e}", dir.display()))
        })?;
    }

    let tmp = temp_path(path);
    let write = || -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    };
    write().map_err(|e| {
        let _ = fs::remove_file(&tmp);
        AppError::new(AppError::RUNTIME, format!("Failed to write '{}': {e}", path.display()))
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DviWeights, Pillar};
    use crate::io::{build_tract_table, parse_feature_collection};
    use crate::schema::ConceptCatalog;
    use crate::score::{build_pillars, composite_scores};
    use crate::domain::EncodingTables;
    use serde_json::Value;

    const INPUT: &str = r#"{"type":"FeatureCollection","name":"udp","features":[
        {"type":"Feature","geometry":{"type":"Point","coordinates":[-97.70000, 30.25]},"properties":{"GEOID":"48453000101","name":"1.01","Displaceme":"Vulnerable","medhhinc":"52000.4","neighborhood":"Holly"}},
        {"type":"Feature","geometry":{"type":"Point","coordinates":[-97.75, 30.3]},"properties":{"GEOID":"48453000102","name":"1.02","Displaceme":"Chronic Displacement Risk","medhhinc":null}},
        {"type":"Feature","geometry":null,"properties":{"GEOID":"48453000103","Displaceme":"Unheard-Of-Category","medhhinc":"81000"}}
    ]}"#;

    fn run(f: impl FnOnce(&ScoredTracts<'_>)) {
        let table = build_tract_table(parse_feature_collection(INPUT).unwrap(), &ConceptCatalog::default());
        let weights = DviWeights::extended();
        let pillars = build_pillars(&weights.pillars(), &table, &EncodingTables::default());
        let composite = composite_scores(&pillars, &weights);
        let scored = ScoredTracts {
            table: &table,
            composite: &composite,
            period_label: "2018-2022",
            data_year: 2022,
        };
        f(&scored);
    }

    #[test]
    fn series_have_one_row_per_feature_in_order() {
        run(|scored| {
            let index = index_series(scored);
            let socio = socioeconomic_series(scored);
            assert_eq!(index.len(), 3);
            assert_eq!(socio.len(), 3);
            assert_eq!(index[0].region, "Holly (Tract 1.01)");
            assert_eq!(index[1].region, "Census Tract 1.02");
            assert_eq!(index[2].period, "2018-2022");
            assert_eq!(socio[0].income_adj, Some(52000.0));
            assert_eq!(socio[1].income_adj, None);
            assert_eq!(socio[2].displacement_risk, "Unheard-Of-Category");
            assert_eq!(socio[2].gentrification_stage, "N/A");
            assert_eq!(socio[0].neighborhood.as_deref(), Some("Holly"));
            assert!(index.iter().all(|p| (0.0..=100.0).contains(&p.dvi)));
        });
    }

    #[test]
    fn socioeconomic_keys_are_camel_case_with_nulls() {
        run(|scored| {
            let v = serde_json::to_value(&socioeconomic_series(scored)[1]).unwrap();
            let obj = v.as_object().unwrap();
            assert!(obj["incomeAdj"].is_null());
            assert!(obj["neighborhood"].is_null());
            assert_eq!(obj["confidence"], json!(1.0));
            assert_eq!(obj["displacementRisk"], json!("Chronic Displacement Risk"));
            assert_eq!(obj["year"], json!(2022));
        });
    }

    #[test]
    fn enriched_features_keep_geometry_and_gain_scores() {
        run(|scored| {
            let fc = enriched_collection(scored);
            assert_eq!(fc.features.len(), 3);
            assert_eq!(
                fc.features[0].geometry.as_ref().unwrap().get(),
                r#"{"type":"Point","coordinates":[-97.70000, 30.25]}"#
            );
            assert!(fc.features[2].geometry.is_none());

            let props = fc.features[0].properties.as_ref().unwrap();
            assert_eq!(props["region_name"], json!("Holly (Tract 1.01)"));
            assert!(props.contains_key("dvi"));
            assert!(props.contains_key("dvi_raw"));
            for pillar in Pillar::ALL {
                assert!(props.contains_key(&pillar.export_key()));
            }
            assert_eq!(props["median_income"], json!(52000.0));
            assert!(!props.contains_key("median_home_value"));
            // Original properties are kept.
            assert_eq!(props["GEOID"], json!("48453000101"));
        });
    }

    #[test]
    fn write_outputs_creates_all_three_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths {
            index_series: dir.path().join("out/dvi_raw.json"),
            socioeconomic: dir.path().join("out/socioeconomic.json"),
            features: dir.path().join("out/udp_dvi.geojson"),
        };
        run(|scored| write_outputs(&paths, scored).unwrap());

        let index: Vec<Value> =
            serde_json::from_str(&fs::read_to_string(&paths.index_series).unwrap()).unwrap();
        assert_eq!(index.len(), 3);

        let geo = fs::read_to_string(&paths.features).unwrap();
        assert!(geo.contains(r#""coordinates":[-97.70000, 30.25]"#));
        let fc: FeatureCollection = serde_json::from_str(&geo).unwrap();
        assert_eq!(fc.features.len(), 3);
        assert_eq!(fc.members.get("name").cloned(), Some(json!("udp")));

        let leftovers: Vec<_> = fs::read_dir(dir.path().join("out"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
