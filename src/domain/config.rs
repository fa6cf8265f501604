//! Run configuration.
//!
//! A `PipelineConfig` is assembled from built-in defaults, an optional TOML
//! settings file, and CLI flags (in that order of precedence). Weights,
//! encodings, and the alias catalog are plain values passed into the scoring
//! components, so several regimes can run side by side.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{CategoryField, DviWeights, EncodingTable, EncodingTables, Pillar, Preset};
use crate::error::AppError;
use crate::schema::{Concept, ConceptCatalog};

pub const DEFAULT_PERIOD_LABEL: &str = "2018-2022";
pub const DEFAULT_DATA_YEAR: i32 = 2022;
pub const DEFAULT_ACS_YEAR: u16 = 2022;
pub const DEFAULT_CENSUS_BASE_URL: &str = "https://api.census.gov/data";

/// Retry/backoff policy for one external request.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first (at least 1).
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each failed retry.
    pub backoff: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            backoff: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1) as i32;
        let factor = self.backoff.max(1.0).powi(exp);
        Duration::from_nanos((self.initial_delay.as_nanos() as f64 * factor).round() as u64)
    }

    /// No retries and no waiting; used by tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            backoff: 1.0,
        }
    }
}

/// External ACS enrichment settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CensusSettings {
    pub enabled: bool,
    pub acs_year: u16,
    pub base_url: String,
    /// Optional; loaded from `CENSUS_API_KEY` when not set explicitly.
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Pause between consecutive county requests.
    pub request_delay: Duration,
}

impl Default for CensusSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            acs_year: DEFAULT_ACS_YEAR,
            base_url: DEFAULT_CENSUS_BASE_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            request_delay: Duration::from_millis(300),
        }
    }
}

/// A full run's configuration as understood by the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub out_dir: PathBuf,
    pub period_label: String,
    pub data_year: i32,
    pub preset: Preset,
    /// Custom weights; when set they define the pillar set.
    pub weights: Option<DviWeights>,
    pub encodings: EncodingTables,
    pub catalog: ConceptCatalog,
    pub census: CensusSettings,
    pub top_n: usize,
    pub report_path: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            out_dir: PathBuf::from("."),
            period_label: DEFAULT_PERIOD_LABEL.to_string(),
            data_year: DEFAULT_DATA_YEAR,
            preset: Preset::Auto,
            weights: None,
            encodings: EncodingTables::default(),
            catalog: ConceptCatalog::default(),
            census: CensusSettings::default(),
            top_n: 20,
            report_path: None,
        }
    }

    /// Output paths for the three artifacts.
    pub fn output_paths(&self) -> OutputPaths {
        let stem = self
            .input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("tracts");
        OutputPaths {
            index_series: self.out_dir.join("dvi_raw.json"),
            socioeconomic: self.out_dir.join("socioeconomic.json"),
            features: self.out_dir.join(format!("{stem}_dvi.geojson")),
        }
    }

    /// Merge a settings file over the current values.
    pub fn apply_settings(&mut self, settings: SettingsFile) -> Result<(), AppError> {
        if let Some(labels) = settings.labels {
            if let Some(period) = labels.period {
                self.period_label = period;
            }
            if let Some(year) = labels.year {
                self.data_year = year;
            }
        }

        if let Some(weights) = settings.weights {
            let mut parsed = BTreeMap::new();
            for (key, w) in weights {
                let pillar = Pillar::from_key(&key)
                    .ok_or_else(|| AppError::new(AppError::INPUT, format!("Unknown pillar in [weights]: `{key}`")))?;
                parsed.insert(pillar, w);
            }
            self.weights = Some(DviWeights::new(parsed)?);
        }

        for (key, table) in settings.encodings {
            let field = CategoryField::from_key(&key).ok_or_else(|| {
                AppError::new(AppError::INPUT, format!("Unknown categorical field in [encodings]: `{key}`"))
            })?;
            self.encodings.set(field, table)?;
        }

        for (key, aliases) in settings.aliases {
            let concept = Concept::from_key(&key)
                .ok_or_else(|| AppError::new(AppError::INPUT, format!("Unknown concept in [aliases]: `{key}`")))?;
            self.catalog.prepend_aliases(concept, &aliases);
        }

        if let Some(census) = settings.census {
            census.apply(&mut self.census)?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputPaths {
    pub index_series: PathBuf,
    pub socioeconomic: PathBuf,
    pub features: PathBuf,
}

/// On-disk TOML settings (every section optional).
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    pub labels: Option<LabelSettings>,
    pub weights: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub encodings: BTreeMap<String, EncodingTable>,
    #[serde(default)]
    pub aliases: BTreeMap<String, Vec<String>>,
    pub census: Option<CensusSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabelSettings {
    pub period: Option<String>,
    pub year: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CensusSection {
    pub enabled: Option<bool>,
    pub acs_year: Option<u16>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub backoff: Option<f64>,
    pub request_delay_ms: Option<u64>,
}

impl CensusSection {
    fn apply(self, census: &mut CensusSettings) -> Result<(), AppError> {
        if let Some(v) = self.enabled {
            census.enabled = v;
        }
        if let Some(v) = self.acs_year {
            census.acs_year = v;
        }
        if let Some(v) = self.base_url {
            census.base_url = v;
        }
        if let Some(v) = self.timeout_secs {
            census.timeout = Duration::from_secs(v);
        }
        if let Some(v) = self.max_attempts {
            if v == 0 {
                return Err(AppError::new(AppError::INPUT, "census.max_attempts must be >= 1."));
            }
            census.retry.max_attempts = v;
        }
        if let Some(v) = self.retry_delay_ms {
            census.retry.initial_delay = Duration::from_millis(v);
        }
        if let Some(v) = self.backoff {
            if !(v.is_finite() && v >= 1.0) {
                return Err(AppError::new(AppError::INPUT, "census.backoff must be a finite number >= 1.0."));
            }
            census.retry.backoff = v;
        }
        if let Some(v) = self.request_delay_ms {
            census.request_delay = Duration::from_millis(v);
        }
        Ok(())
    }
}

impl SettingsFile {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(AppError::INPUT, format!("Failed to read settings file '{}': {e}", path.display()))
        })?;
        Self::parse(&text)
            .map_err(|e| AppError::new(AppError::INPUT, format!("Invalid settings file '{}': {e}", path.display())))
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_file_overrides_weights_aliases_and_census() {
        let text = r#"
            [labels]
            period = "2019-2023"
            year = 2023

            [weights]
            vulnerability = 0.5
            housing_market = 0.5

            [encodings.housing_market]
            Appreciated = 1.0
            Stable = 0.2

            [aliases]
            income = ["hhinc_23"]

            [census]
            enabled = true
            max_attempts = 5
            request_delay_ms = 0
        "#;
        let settings = SettingsFile::parse(text).unwrap();
        let mut config = PipelineConfig::new("tracts.geojson");
        config.apply_settings(settings).unwrap();

        assert_eq!(config.period_label, "2019-2023");
        assert_eq!(config.data_year, 2023);
        let weights = config.weights.unwrap();
        assert_eq!(weights.pillars(), vec![Pillar::Vulnerability, Pillar::HousingMarket]);
        assert_eq!(config.catalog.candidates(Concept::Income)[0], "hhinc_23");
        assert!(config.census.enabled);
        assert_eq!(config.census.retry.max_attempts, 5);
        assert_eq!(config.census.request_delay, Duration::ZERO);
    }

    #[test]
    fn unbalanced_weights_in_settings_are_rejected() {
        let settings = SettingsFile::parse("[weights]\nvulnerability = 0.9\n").unwrap();
        let mut config = PipelineConfig::new("tracts.geojson");
        assert_eq!(config.apply_settings(settings).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn backoff_grows_the_retry_delay() {
        let policy = RetryPolicy {
            max_attempts: 4,
            initial_delay: Duration::from_millis(100),
            backoff: 2.0,
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
    }

    #[test]
    fn output_paths_follow_input_stem() {
        let mut config = PipelineConfig::new("data/udp_austin.geojson");
        config.out_dir = PathBuf::from("out");
        let paths = config.output_paths();
        assert_eq!(paths.features, PathBuf::from("out/udp_austin_dvi.geojson"));
        assert_eq!(paths.index_series, PathBuf::from("out/dvi_raw.json"));
    }
}
