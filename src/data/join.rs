//! County-level ACS fetch and the tract left join.
//!
//! Counties are fetched sequentially with a pause between requests. A county
//! that keeps failing after its retries is skipped; the join still runs and
//! its tracts simply end up with null metrics.

use std::collections::{BTreeSet, HashMap};
use std::thread;

use serde::Serialize;
use tracing::{info, warn};

use crate::data::{AcsTract, CountyStatsSource, FetchError};
use crate::domain::{CensusSettings, Metric, RawMetrics, RetryPolicy, TractRecord};
use crate::io::{county_code, MetricSource, TractTable};

/// Result of fetching one county.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchOutcome {
    Fetched { tracts: usize, attempts: u32 },
    Failed { error: String, attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountyFetch {
    pub county: String,
    pub outcome: FetchOutcome,
}

/// Coverage of the enrichment join.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JoinReport {
    pub counties: Vec<CountyFetch>,
    /// Tracts returned by the API across all fetched counties.
    pub acs_tracts: usize,
    /// Primary tracts that found an ACS row.
    pub matched: usize,
    pub total: usize,
}

impl JoinReport {
    pub fn failed_counties(&self) -> Vec<&str> {
        self.counties
            .iter()
            .filter(|c| matches!(c.outcome, FetchOutcome::Failed { .. }))
            .map(|c| c.county.as_str())
            .collect()
    }

    pub fn fetched_counties(&self) -> usize {
        self.counties.len() - self.failed_counties().len()
    }

    pub fn match_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.matched as f64 / self.total as f64
        }
    }
}

/// Unique county codes covered by the records, sorted.
pub fn county_codes(records: &[TractRecord]) -> BTreeSet<String> {
    records
        .iter()
        .filter_map(|r| r.geo_id.as_deref())
        .filter_map(county_code)
        .map(str::to_string)
        .collect()
}

/// Call `source` until it succeeds, fails permanently, or runs out of attempts.
///
/// Returns the final result and the number of attempts made.
pub fn fetch_with_retry(
    source: &dyn CountyStatsSource,
    county: &str,
    policy: &RetryPolicy,
) -> (Result<Vec<AcsTract>, FetchError>, u32) {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match source.fetch_county(county) {
            Ok(rows) => return (Ok(rows), attempt),
            Err(e) if attempt < max_attempts && e.is_retryable() => {
                let delay = policy.delay_after(attempt);
                warn!(county, attempt, error = %e, delay_ms = delay.as_millis() as u64, "census request failed; retrying");
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                attempt += 1;
            }
            Err(e) => return (Err(e), attempt),
        }
    }
}

/// Fetch every county and index the returned tracts by GEOID.
pub fn fetch_counties(
    source: &dyn CountyStatsSource,
    counties: &BTreeSet<String>,
    settings: &CensusSettings,
) -> (HashMap<String, RawMetrics>, Vec<CountyFetch>) {
    info!(counties = counties.len(), acs_year = settings.acs_year, "fetching ACS data");

    let mut by_geo_id = HashMap::new();
    let mut fetches = Vec::with_capacity(counties.len());

    for (i, county) in counties.iter().enumerate() {
        if i > 0 && !settings.request_delay.is_zero() {
            thread::sleep(settings.request_delay);
        }
        let (result, attempts) = fetch_with_retry(source, county, &settings.retry);
        let outcome = match result {
            Ok(rows) => {
                info!(county = %county, tracts = rows.len(), "county fetched");
                let tracts = rows.len();
                for row in rows {
                    by_geo_id.insert(row.geo_id, row.metrics);
                }
                FetchOutcome::Fetched { tracts, attempts }
            }
            Err(e) => {
                warn!(county = %county, attempts, error = %e, "census fetch failed; county skipped");
                FetchOutcome::Failed {
                    error: e.to_string(),
                    attempts,
                }
            }
        };
        fetches.push(CountyFetch {
            county: county.clone(),
            outcome,
        });
    }

    if by_geo_id.is_empty() {
        warn!("no ACS data retrieved; socioeconomic fields will be null");
    }
    (by_geo_id, fetches)
}

/// Replace every record's metrics with its ACS match (or all-null).
///
/// Returns the number of matched records.
pub fn left_join(records: &mut [TractRecord], acs: &HashMap<String, RawMetrics>) -> usize {
    let mut matched = 0;
    for record in records.iter_mut() {
        let hit = record.geo_id.as_ref().and_then(|g| acs.get(g));
        record.metrics = match hit {
            Some(metrics) => {
                matched += 1;
                metrics.clone()
            }
            None => RawMetrics::default(),
        };
    }
    matched
}

/// Fetch ACS data for the table's counties and left-join it in place.
///
/// Returns `None` when no record carries a usable GEOID, in which case the
/// table is left untouched.
pub fn enrich_with_census(
    table: &mut TractTable,
    source: &dyn CountyStatsSource,
    settings: &CensusSettings,
) -> Option<JoinReport> {
    let counties = county_codes(&table.records);
    if counties.is_empty() {
        warn!("no usable GEOIDs; skipping census enrichment");
        return None;
    }

    let (acs, fetches) = fetch_counties(source, &counties, settings);
    let matched = left_join(&mut table.records, &acs);
    for metric in Metric::ALL {
        table.metric_sources.insert(metric, MetricSource::Census);
    }

    let report = JoinReport {
        counties: fetches,
        acs_tracts: acs.len(),
        matched,
        total: table.len(),
    };
    info!(
        matched = report.matched,
        total = report.total,
        rate = %format!("{:.1}%", report.match_rate() * 100.0),
        "census join complete"
    );
    if report.matched < report.total {
        warn!(unmatched = report.total - report.matched, "tracts without ACS data keep null metrics");
    }
    Some(report)
}
