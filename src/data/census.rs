//! Census ACS 5-year API integration.
//!
//! One request per county returns every tract in it as a JSON array of
//! arrays (header row first). Raw ACS estimates are reduced to the four
//! socioeconomic metrics the pipeline carries.

use std::collections::HashMap;

use reqwest::blocking::Client;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{CensusSettings, RawMetrics};
use crate::error::AppError;
use crate::io::normalize_geo_id;
use crate::math::parse_f64;

/// Median household income.
const MEDIAN_INCOME: &str = "B19013_001E";
/// Median owner-occupied home value.
const MEDIAN_HOME_VALUE: &str = "B25077_001E";
/// Population 25 and over (education denominator).
const POP_25_PLUS: &str = "B15003_001E";
/// Bachelor's, master's, professional and doctorate degree counts.
const DEGREE_COUNTS: [&str; 4] = ["B15003_022E", "B15003_023E", "B15003_024E", "B15003_025E"];
/// Renter households (cost-burden denominator).
const RENTER_TOTAL: &str = "B25070_001E";
/// Renters paying 30-34.9%, 35-39.9%, 40-49.9% and 50%+ of income on rent.
const COST_BURDEN_COUNTS: [&str; 4] = ["B25070_007E", "B25070_008E", "B25070_009E", "B25070_010E"];

/// ACS annotation values (e.g. `-666666666`) are at or below this.
const ANNOTATION_THRESHOLD: f64 = -100_000_000.0;

/// Every variable requested per county, in request order.
pub fn acs_variables() -> Vec<&'static str> {
    let mut vars = vec![MEDIAN_INCOME, MEDIAN_HOME_VALUE, POP_25_PLUS];
    vars.extend(DEGREE_COUNTS);
    vars.push(RENTER_TOTAL);
    vars.extend(COST_BURDEN_COUNTS);
    vars
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Census API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed ACS response: {0}")]
    Malformed(String),

    #[error("Empty response")]
    Empty,
}

impl FetchError {
    /// Transport failures, throttling and server errors are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Http(_) => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Json(_) | FetchError::Malformed(_) | FetchError::Empty => false,
        }
    }
}

/// One tract's derived metrics from the ACS.
#[derive(Debug, Clone, PartialEq)]
pub struct AcsTract {
    pub geo_id: String,
    pub metrics: RawMetrics,
}

/// Anything that can return per-tract metrics for a 5-digit county code.
pub trait CountyStatsSource {
    fn fetch_county(&self, county: &str) -> Result<Vec<AcsTract>, FetchError>;
}

pub struct CensusClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl CensusClient {
    pub fn new(settings: &CensusSettings) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| AppError::new(AppError::RUNTIME, format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/{}/acs/acs5",
                settings.base_url.trim_end_matches('/'),
                settings.acs_year
            ),
            api_key: settings.api_key.clone(),
        })
    }

    /// Like `new`, filling the API key from `CENSUS_API_KEY` (`.env` aware).
    ///
    /// The key is optional: the API serves low request volumes without one.
    pub fn from_env(settings: &CensusSettings) -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let mut settings = settings.clone();
        if settings.api_key.is_none() {
            settings.api_key = std::env::var("CENSUS_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty());
        }
        Self::new(&settings)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl CountyStatsSource for CensusClient {
    fn fetch_county(&self, county: &str) -> Result<Vec<AcsTract>, FetchError> {
        let params = tract_query(county, self.api_key.as_deref())?;
        let resp = self.client.get(&self.endpoint).query(&params).send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        let text = resp.text()?;
        if text.trim().is_empty() {
            return Err(FetchError::Empty);
        }
        parse_acs_response(&text)
    }
}

/// Query parameters selecting every tract of one county.
pub fn tract_query(
    county: &str,
    api_key: Option<&str>,
) -> Result<Vec<(&'static str, String)>, FetchError> {
    let (state, county_part) = split_county(county)?;
    let mut params = vec![
        ("get", format!("NAME,{}", acs_variables().join(","))),
        ("for", "tract:*".to_string()),
        ("in", format!("state:{state}")),
        ("in", format!("county:{county_part}")),
    ];
    if let Some(key) = api_key {
        params.push(("key", key.to_string()));
    }
    Ok(params)
}

fn split_county(county: &str) -> Result<(&str, &str), FetchError> {
    if county.len() != 5 || !county.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FetchError::Malformed(format!("invalid county code `{county}`")));
    }
    Ok((&county[..2], &county[2..]))
}

/// Parse an ACS array-of-arrays body into per-tract metrics.
pub fn parse_acs_response(text: &str) -> Result<Vec<AcsTract>, FetchError> {
    let rows: Vec<Vec<Value>> = serde_json::from_str(text)?;
    let mut rows = rows.into_iter();
    let header: Vec<String> = rows
        .next()
        .ok_or(FetchError::Empty)?
        .into_iter()
        .map(|v| v.as_str().unwrap_or_default().to_string())
        .collect();

    let index: HashMap<&str, usize> = header
        .iter()
        .enumerate()
        .map(|(i, h)| (h.as_str(), i))
        .collect();
    for key in ["state", "county", "tract"] {
        if !index.contains_key(key) {
            return Err(FetchError::Malformed(format!("missing `{key}` column")));
        }
    }

    let mut out = Vec::new();
    for row in rows {
        let cell = |name: &str| index.get(name).and_then(|i| row.get(*i));
        let text = |name: &str| cell(name).and_then(Value::as_str).unwrap_or_default();
        let geo = format!("{}{}{}", text("state"), text("county"), text("tract"));
        let Some(geo_id) = normalize_geo_id(&geo) else {
            continue;
        };
        let num = |name: &str| cell(name).and_then(acs_estimate);
        out.push(AcsTract {
            geo_id,
            metrics: derive_metrics(&num),
        });
    }
    Ok(out)
}

/// Read one ACS estimate; annotation sentinels become `None`.
pub fn acs_estimate(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_f64(s),
        _ => None,
    }?;
    if v.is_finite() && v > ANNOTATION_THRESHOLD {
        Some(v)
    } else {
        None
    }
}

/// Reduce raw ACS estimates to the carried metrics.
///
/// Missing numerator components count as zero; a ratio is `None` whenever
/// its denominator is zero or missing.
pub fn derive_metrics(estimate: &dyn Fn(&str) -> Option<f64>) -> RawMetrics {
    let share = |parts: &[&str], denominator: &str| {
        let total = estimate(denominator).filter(|d| *d > 0.0)?;
        let count: f64 = parts.iter().map(|p| estimate(p).unwrap_or(0.0)).sum();
        Some(count / total * 100.0)
    };

    RawMetrics {
        income: estimate(MEDIAN_INCOME),
        home_value: estimate(MEDIAN_HOME_VALUE),
        pct_bachelors: share(&DEGREE_COUNTS, POP_25_PLUS),
        pct_cost_burdened: share(&COST_BURDEN_COUNTS, RENTER_TOTAL),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(rows: &[Value]) -> String {
        let mut header: Vec<Value> = vec![json!("NAME")];
        header.extend(acs_variables().into_iter().map(|v| json!(v)));
        header.extend([json!("state"), json!("county"), json!("tract")]);
        let mut all = vec![Value::Array(header)];
        all.extend(rows.iter().cloned());
        Value::Array(all).to_string()
    }

    #[test]
    fn tract_query_selects_every_tract_of_the_county() {
        let params = tract_query("48453", Some("secret")).unwrap();
        let get = format!("NAME,{}", acs_variables().join(","));
        assert_eq!(
            params,
            vec![
                ("get", get),
                ("for", "tract:*".to_string()),
                ("in", "state:48".to_string()),
                ("in", "county:453".to_string()),
                ("key", "secret".to_string()),
            ]
        );
        assert!(params[0].1.starts_with("NAME,B19013_001E,B25077_001E,B15003_001E"));

        let anonymous = tract_query("06037", None).unwrap();
        assert_eq!(anonymous.len(), 4);
        assert!(anonymous.iter().all(|(name, _)| *name != "key"));

        assert!(matches!(tract_query("4845", None), Err(FetchError::Malformed(_))));
    }

    #[test]
    fn parses_rows_and_derives_ratios() {
        let text = body(&[json!([
            "Census Tract 18.32; Travis County; Texas",
            "65000", "410000", "1000", "200", "100", "50", "50",
            "400", "40", "30", "20", "10",
            "48", "453", "001832"
        ])]);
        let tracts = parse_acs_response(&text).unwrap();
        assert_eq!(tracts.len(), 1);
        assert_eq!(tracts[0].geo_id, "48453001832");
        let m = &tracts[0].metrics;
        assert_eq!(m.income, Some(65000.0));
        assert_eq!(m.home_value, Some(410000.0));
        assert_eq!(m.pct_bachelors, Some(40.0));
        assert_eq!(m.pct_cost_burdened, Some(25.0));
    }

    #[test]
    fn zero_denominator_and_annotations_are_missing() {
        let text = body(&[json!([
            "x",
            "-666666666", null, "0", "5", "0", "0", "0",
            null, "1", "1", "1", "1",
            "48", "453", "000101"
        ])]);
        let tracts = parse_acs_response(&text).unwrap();
        let m = &tracts[0].metrics;
        assert_eq!(m.income, None);
        assert_eq!(m.home_value, None);
        assert_eq!(m.pct_bachelors, None);
        assert_eq!(m.pct_cost_burdened, None);
    }

    #[test]
    fn missing_geography_columns_are_rejected() {
        let err = parse_acs_response(r#"[["NAME","B19013_001E"],["x","1"]]"#).unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
        assert!(!err.is_retryable());
        assert!(matches!(parse_acs_response("[]"), Err(FetchError::Empty)));
    }

    #[test]
    fn county_codes_split_into_state_and_county() {
        assert_eq!(split_county("48453").unwrap(), ("48", "453"));
        assert!(split_county("4845").is_err());
    }

    #[test]
    fn server_errors_are_retryable() {
        let e = FetchError::Status {
            status: 503,
            body: String::new(),
        };
        assert!(e.is_retryable());
        let e = FetchError::Status {
            status: 400,
            body: String::new(),
        };
        assert!(!e.is_retryable());
    }

    #[test]
    fn endpoint_includes_the_acs_year() {
        let settings = CensusSettings {
            acs_year: 2021,
            base_url: "https://api.census.gov/data/".to_string(),
            ..CensusSettings::default()
        };
        let client = CensusClient::new(&settings).unwrap();
        assert_eq!(client.endpoint(), "https://api.census.gov/data/2021/acs/acs5");
    }
}
