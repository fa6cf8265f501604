//! The DVI pipeline, shared by every front-end.
//!
//! load -> (optional ACS join) -> pillars -> composite -> exports -> summary
//!
//! `run_pipeline` builds the live Census client when enrichment is enabled;
//! `run_pipeline_with_source` accepts any `CountyStatsSource`, which is how
//! the tests drive the join without network access.

use chrono::Utc;
use tracing::info;

use crate::data::{enrich_with_census, CensusClient, CountyStatsSource, JoinReport};
use crate::domain::{DviWeights, OutputPaths, PipelineConfig, Preset};
use crate::error::AppError;
use crate::io::{load_tract_table, write_outputs, ScoredTracts, TractTable};
use crate::report::{build_summary, write_manifest, RunManifest, RunSummary};
use crate::schema::{Concept, SchemaReport};
use crate::score::{build_pillars, composite_scores, CompositeResult, PillarColumn};

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub table: TractTable,
    /// Concrete preset used (`Auto` is resolved).
    pub preset: Preset,
    pub weights: DviWeights,
    pub pillars: Vec<PillarColumn>,
    pub composite: CompositeResult,
    pub join: Option<JoinReport>,
    pub summary: RunSummary,
    pub outputs: OutputPaths,
}

/// Execute the full pipeline, fetching ACS data when enrichment is enabled.
pub fn run_pipeline(config: &PipelineConfig) -> Result<RunOutput, AppError> {
    if config.census.enabled {
        let client = CensusClient::from_env(&config.census)?;
        info!(endpoint = client.endpoint(), "census enrichment enabled");
        run_pipeline_with_source(config, Some(&client))
    } else {
        run_pipeline_with_source(config, None)
    }
}

/// Execute the pipeline with an explicit (or no) enrichment source.
pub fn run_pipeline_with_source(
    config: &PipelineConfig,
    source: Option<&dyn CountyStatsSource>,
) -> Result<RunOutput, AppError> {
    // 1) Load the primary dataset and resolve its schema.
    let mut table = load_tract_table(&config.input, &config.catalog)?;

    // 2) Replace raw metrics with ACS data, when requested.
    let join = match source {
        Some(source) => enrich_with_census(&mut table, source, &config.census),
        None => None,
    };

    // 3) Pillars for the chosen weighting.
    let (preset, weights) = resolve_weights(config.preset, config.weights.as_ref(), &table.schema)?;
    info!(preset = preset.display_name(), pillars = ?weights.pillars(), "weighting resolved");
    let pillars = build_pillars(&weights.pillars(), &table, &config.encodings);

    // 4) Composite index.
    let composite = composite_scores(&pillars, &weights);
    if let (Some(raw), Some(dvi)) = (composite.raw_range, composite.dvi_range) {
        info!(
            raw_min = raw.0,
            raw_max = raw.1,
            dvi_min = dvi.0,
            dvi_max = dvi.1,
            "composite computed"
        );
    }

    // 5) Artifacts.
    let outputs = config.output_paths();
    let scored = ScoredTracts {
        table: &table,
        composite: &composite,
        period_label: &config.period_label,
        data_year: config.data_year,
    };
    write_outputs(&outputs, &scored)?;

    // 6) Summary and optional manifest.
    let summary = build_summary(&table, &pillars, &composite, join.as_ref(), config.top_n);

    if let Some(path) = &config.report_path {
        let manifest = RunManifest {
            generated_at: Utc::now(),
            tool_version: env!("CARGO_PKG_VERSION"),
            input: config.input.display().to_string(),
            outputs: &outputs,
            preset,
            weights: &weights,
            period_label: &config.period_label,
            data_year: config.data_year,
            schema: &table.schema,
            ingest: &table.stats,
            metric_sources: table
                .metric_sources
                .iter()
                .map(|(m, s)| (m.export_key().to_string(), s))
                .collect(),
            pillars: &pillars,
            composite: &composite,
            join: join.as_ref(),
            summary: &summary,
        };
        write_manifest(path, &manifest)?;
        info!(path = %path.display(), "wrote run manifest");
    }

    Ok(RunOutput {
        table,
        preset,
        weights,
        pillars,
        composite,
        join,
        summary,
        outputs,
    })
}

/// Pick the weighting for this dataset.
///
/// `Auto` becomes `Extended` when the displacement-risk category resolved,
/// else `Core`. Custom weights keep their values but must cover exactly the
/// pillars of the chosen preset; under `Auto` the preset follows the custom
/// pillar set instead.
pub fn resolve_weights(
    preset: Preset,
    custom: Option<&DviWeights>,
    schema: &SchemaReport,
) -> Result<(Preset, DviWeights), AppError> {
    let Some(weights) = custom else {
        let concrete = match preset {
            Preset::Auto if schema.is_resolved(Concept::DisplacementRisk) => Preset::Extended,
            Preset::Auto => Preset::Core,
            other => other,
        };
        return Ok((concrete, DviWeights::for_preset(concrete)));
    };

    let keys = |w: &DviWeights| w.pillars().iter().map(|p| p.key()).collect::<Vec<_>>().join(", ");
    match (preset, Preset::matching(weights)) {
        (Preset::Auto, Some(matched)) => Ok((matched, weights.clone())),
        (explicit, Some(matched)) if explicit == matched => Ok((matched, weights.clone())),
        (Preset::Auto, None) => Err(AppError::new(
            AppError::INPUT,
            format!(
                "Custom weights name [{}]; they must cover the core or extended pillar set.",
                keys(weights)
            ),
        )),
        (explicit, _) => Err(AppError::new(
            AppError::INPUT,
            format!(
                "Custom weights name [{}] but the {} preset uses [{}].",
                keys(weights),
                explicit.display_name(),
                keys(&DviWeights::for_preset(explicit))
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::time::Duration;

    use serde_json::Value;

    use crate::data::{AcsTract, FetchError};
    use crate::domain::{Pillar, RawMetrics, RetryPolicy};
    use crate::schema::{resolve_columns, ConceptCatalog};

    const INPUT: &str = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","geometry":{"type":"Point","coordinates":[-97.71, 30.26]},"properties":{"GEOID":"48453000101.0","NAME":"1.01","Displaceme":"Chronic Displacement Risk","Vulnerabil":"YES","Demographi":"YES","Housing_Ma":"Appreciated","Gentrifica":"Late"}},
        {"type":"Feature","geometry":{"type":"Point","coordinates":[-97.72, 30.27]},"properties":{"GEOID":"48453000102","NAME":"1.02","Displaceme":"Vulnerable","Vulnerabil":"NO","Demographi":"NO","Housing_Ma":"Stable","Gentrifica":"Unheard-Of-Category"}},
        {"type":"Feature","geometry":null,"properties":{"GEOID":"48209010900","NAME":"109","Displaceme":null,"Vulnerabil":"NO","Demographi":"NO","Housing_Ma":"Stable","Gentrifica":"Stable"}}
    ]}"#;

    struct TravisOnly;

    impl CountyStatsSource for TravisOnly {
        fn fetch_county(&self, county: &str) -> Result<Vec<AcsTract>, FetchError> {
            if county != "48453" {
                return Err(FetchError::Status {
                    status: 404,
                    body: String::new(),
                });
            }
            let tract = |geo_id: &str, income: f64| AcsTract {
                geo_id: geo_id.to_string(),
                metrics: RawMetrics {
                    income: Some(income),
                    home_value: Some(300000.0),
                    pct_bachelors: Some(40.04),
                    pct_cost_burdened: Some(55.56),
                },
            };
            Ok(vec![tract("48453000101", 41234.6), tract("48453000102", 80000.0)])
        }
    }

    fn config(dir: &Path) -> PipelineConfig {
        let input = dir.join("udp_austin.geojson");
        std::fs::write(&input, INPUT).unwrap();
        let mut config = PipelineConfig::new(input);
        config.out_dir = dir.join("out");
        config.census.retry = RetryPolicy::immediate(1);
        config.census.request_delay = Duration::ZERO;
        config
    }

    fn read_array(path: &Path) -> Vec<Value> {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn every_artifact_has_one_row_per_input_feature() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.report_path = Some(dir.path().join("out/run.json"));

        let run = run_pipeline_with_source(&config, Some(&TravisOnly)).unwrap();

        assert_eq!(run.preset, Preset::Extended);
        assert_eq!(read_array(&run.outputs.index_series).len(), 3);
        assert_eq!(read_array(&run.outputs.socioeconomic).len(), 3);
        let geo: Value =
            serde_json::from_str(&std::fs::read_to_string(&run.outputs.features).unwrap()).unwrap();
        assert_eq!(geo["features"].as_array().unwrap().len(), 3);
        assert!(dir.path().join("out/run.json").exists());

        for s in &run.composite.scores {
            assert!((0.0..=100.0).contains(&s.dvi));
        }
        let gent = run
            .pillars
            .iter()
            .find(|p| p.pillar == Pillar::Gentrification)
            .unwrap();
        assert_eq!(gent.unknown_values.get("Unheard-Of-Category"), Some(&1));
    }

    #[test]
    fn unmatched_county_keeps_the_tract_with_null_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let run = run_pipeline_with_source(&config, Some(&TravisOnly)).unwrap();

        let join = run.join.as_ref().unwrap();
        assert_eq!((join.matched, join.total), (2, 3));

        let socio = read_array(&run.outputs.socioeconomic);
        assert_eq!(socio[0]["incomeAdj"], 41235.0);
        assert_eq!(socio[0]["pctBachelors"], 40.0);
        assert_eq!(socio[0]["pctCostBurdened"], 55.6);
        assert!(socio[2]["incomeAdj"].is_null());
        assert!(socio[2]["homeValue"].is_null());
        assert_eq!(socio[2]["displacementRisk"], "N/A");

        let geo: Value =
            serde_json::from_str(&std::fs::read_to_string(&run.outputs.features).unwrap()).unwrap();
        let props = &geo["features"][2]["properties"];
        assert!(props["median_income"].is_null());
        assert_eq!(props["region_name"], "Census Tract 109");
    }

    #[test]
    fn missing_input_is_fatal_with_exit_code_two() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::new(dir.path().join("absent.geojson"));
        let err = run_pipeline_with_source(&config, None).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn auto_preset_follows_the_displacement_category() {
        let cols = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let catalog = ConceptCatalog::default();

        let with = resolve_columns(&cols(&["displaceme"]), &catalog);
        let without = resolve_columns(&cols(&["geoid"]), &catalog);
        assert_eq!(resolve_weights(Preset::Auto, None, &with).unwrap().0, Preset::Extended);
        assert_eq!(resolve_weights(Preset::Auto, None, &without).unwrap().0, Preset::Core);
        assert_eq!(resolve_weights(Preset::Core, None, &with).unwrap().1, DviWeights::core());
    }

    #[test]
    fn custom_weights_must_cover_the_preset_pillars() {
        let schema = SchemaReport::default();
        let core_shaped = DviWeights::new(BTreeMap::from([
            (Pillar::Vulnerability, 0.6),
            (Pillar::DemographicChange, 0.2),
            (Pillar::HousingMarket, 0.2),
        ]))
        .unwrap();

        let (preset, w) = resolve_weights(Preset::Auto, Some(&core_shaped), &schema).unwrap();
        assert_eq!(preset, Preset::Core);
        assert_eq!(w.get(Pillar::Vulnerability), 0.6);
        assert_eq!(resolve_weights(Preset::Core, Some(&core_shaped), &schema).unwrap().0, Preset::Core);

        let err = resolve_weights(Preset::Extended, Some(&core_shaped), &schema).unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let partial = DviWeights::new(BTreeMap::from([(Pillar::HousingMarket, 1.0)])).unwrap();
        assert!(resolve_weights(Preset::Extended, Some(&partial), &schema).is_err());
        assert!(resolve_weights(Preset::Auto, Some(&partial), &schema).is_err());
    }

    #[test]
    fn weight_regimes_can_run_side_by_side() {
        let dir = tempfile::tempdir().unwrap();
        let mut core = config(dir.path());
        core.preset = Preset::Core;
        let mut extended = core.clone();
        extended.preset = Preset::Extended;
        extended.out_dir = dir.path().join("out-ext");

        let a = run_pipeline_with_source(&core, None).unwrap();
        let b = run_pipeline_with_source(&extended, None).unwrap();
        assert_eq!(a.pillars.len(), 3);
        assert_eq!(b.pillars.len(), 5);
        assert_eq!(a.table.len(), b.table.len());
    }
}
