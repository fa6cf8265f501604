//! Column auto-discovery.
//!
//! `resolve_columns` is a pure function: it never touches the filesystem and
//! never fails. Concepts with no matching column come back as
//! `Resolution::NotFound` so callers can degrade the dependent pillar or
//! metric instead of aborting.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use crate::schema::{Concept, ConceptCatalog};

/// Outcome of resolving one concept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "column", rename_all = "snake_case")]
pub enum Resolution {
    Matched(String),
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConceptOutcome {
    pub concept: Concept,
    pub resolution: Resolution,
    /// Aliases tried, in priority order.
    pub candidates: Vec<String>,
}

/// Per-concept resolution outcomes, in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaReport {
    pub outcomes: Vec<ConceptOutcome>,
}

impl SchemaReport {
    /// Actual column name matched for `concept`, if any.
    pub fn column(&self, concept: Concept) -> Option<&str> {
        self.outcomes
            .iter()
            .find(|o| o.concept == concept)
            .and_then(|o| match &o.resolution {
                Resolution::Matched(col) => Some(col.as_str()),
                Resolution::NotFound => None,
            })
    }

    pub fn is_resolved(&self, concept: Concept) -> bool {
        self.column(concept).is_some()
    }

    pub fn matched(&self) -> BTreeMap<Concept, &str> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.resolution {
                Resolution::Matched(col) => Some((o.concept, col.as_str())),
                Resolution::NotFound => None,
            })
            .collect()
    }

    pub fn unmatched(&self) -> Vec<Concept> {
        self.outcomes
            .iter()
            .filter(|o| o.resolution == Resolution::NotFound)
            .map(|o| o.concept)
            .collect()
    }

    /// Emit one log line per concept.
    pub fn log(&self) {
        for o in &self.outcomes {
            match &o.resolution {
                Resolution::Matched(col) => {
                    info!(concept = o.concept.key(), column = %col, "column resolved");
                }
                Resolution::NotFound => {
                    let tried: Vec<&str> = o.candidates.iter().take(4).map(String::as_str).collect();
                    warn!(concept = o.concept.key(), tried = ?tried, "column not found");
                }
            }
        }
    }
}

/// Case-insensitive search for the first candidate present in `columns`.
///
/// Candidate order decides priority; the returned name is the column's
/// original spelling.
pub fn find_column(columns: &[String], candidates: &[String]) -> Option<String> {
    let mut by_lower: BTreeMap<String, &String> = BTreeMap::new();
    for col in columns {
        by_lower.entry(normalize_column_name(col)).or_insert(col);
    }
    candidates
        .iter()
        .find_map(|c| by_lower.get(&normalize_column_name(c)).map(|col| (*col).clone()))
}

/// Resolve every concept in `catalog` against `columns`.
pub fn resolve_columns(columns: &[String], catalog: &ConceptCatalog) -> SchemaReport {
    let outcomes = catalog
        .entries()
        .iter()
        .map(|(concept, candidates)| ConceptOutcome {
            concept: *concept,
            resolution: match find_column(columns, candidates) {
                Some(col) => Resolution::Matched(col),
                None => Resolution::NotFound,
            },
            candidates: candidates.clone(),
        })
        .collect();
    SchemaReport { outcomes }
}

fn normalize_column_name(name: &str) -> String {
    // Exports from spreadsheet tools sometimes prefix the first key with a BOM.
    name.trim().trim_start_matches('\u{feff}').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn case_folding_lets_a_later_alias_match() {
        let found = find_column(&cols(&["B", "other"]), &cols(&["a", "b"]));
        assert_eq!(found.as_deref(), Some("B"));
    }

    #[test]
    fn alias_order_decides_between_present_columns() {
        let found = find_column(&cols(&["geoid10", "GEOID"]), &cols(&["geoid", "geoid10"]));
        assert_eq!(found.as_deref(), Some("GEOID"));
    }

    #[test]
    fn report_lists_matched_and_unmatched_concepts() {
        let catalog = ConceptCatalog::from_entries(vec![
            (Concept::TractId, cols(&["geoid22", "geoid"])),
            (Concept::Income, cols(&["medhhinc"])),
        ]);
        let report = resolve_columns(&cols(&["\u{feff}GEOID22", "name22"]), &catalog);

        assert_eq!(report.column(Concept::TractId), Some("\u{feff}GEOID22"));
        assert_eq!(report.unmatched(), vec![Concept::Income]);
        assert_eq!(report.matched().len(), 1);
        assert!(!report.is_resolved(Concept::Income));
    }
}
