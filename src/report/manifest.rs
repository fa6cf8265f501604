//! JSON run manifest (`--report`).
//!
//! Captures everything needed to audit a run after the fact: resolved
//! columns, pillar provenance, imputation, join coverage and the summary.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::data::JoinReport;
use crate::domain::{DviWeights, OutputPaths, Preset};
use crate::error::AppError;
use crate::io::{write_json_atomic, IngestStats, MetricSource};
use crate::report::RunSummary;
use crate::schema::SchemaReport;
use crate::score::{CompositeResult, PillarColumn};

#[derive(Debug, Serialize)]
pub struct RunManifest<'a> {
    pub generated_at: DateTime<Utc>,
    pub tool_version: &'static str,
    pub input: String,
    pub outputs: &'a OutputPaths,
    pub preset: Preset,
    pub weights: &'a DviWeights,
    pub period_label: &'a str,
    pub data_year: i32,
    pub schema: &'a SchemaReport,
    pub ingest: &'a IngestStats,
    pub metric_sources: Vec<(String, &'a MetricSource)>,
    pub pillars: &'a [PillarColumn],
    pub composite: &'a CompositeResult,
    pub join: Option<&'a JoinReport>,
    pub summary: &'a RunSummary,
}

pub fn write_manifest(path: &Path, manifest: &RunManifest<'_>) -> Result<(), AppError> {
    write_json_atomic(path, manifest, true)
}
