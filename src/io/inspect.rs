//! Column inventory for an input collection.
//!
//! Used by `dvi inspect` to show which property keys a new extract carries
//! and how the alias catalog resolves against them.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::AppError;
use crate::io::FeatureCollection;
use crate::math::coerce_text;
use crate::schema::{resolve_columns, ConceptCatalog, Resolution, SchemaReport};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    /// Features where the value is present and not a placeholder.
    pub non_null: usize,
    /// First non-null value, rendered as text.
    pub example: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inventory {
    pub features: usize,
    pub columns: Vec<ColumnSummary>,
    pub schema: SchemaReport,
}

pub fn inventory(collection: &FeatureCollection, catalog: &ConceptCatalog) -> Inventory {
    let names = collection.property_columns();
    let columns = names
        .iter()
        .map(|name| {
            let mut non_null = 0;
            let mut example = None;
            for value in collection.features.iter().filter_map(|f| f.property(name)) {
                if let Some(text) = coerce_text(value) {
                    non_null += 1;
                    example.get_or_insert(text);
                }
            }
            ColumnSummary {
                name: name.clone(),
                non_null,
                example,
            }
        })
        .collect();

    Inventory {
        features: collection.features.len(),
        columns,
        schema: resolve_columns(&names, catalog),
    }
}

/// Plain-text rendering: one line per column, then the resolution table.
pub fn render_inventory(inv: &Inventory) -> String {
    let mut out = String::new();
    out.push_str(&format!("Features: {}\n", inv.features));
    out.push_str(&format!("Columns ({}):\n", inv.columns.len()));
    for col in &inv.columns {
        let example = col
            .example
            .as_deref()
            .map(|e| truncate(e, 40))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "  {:<28} {:>6}/{:<6} e.g. {}\n",
            col.name, col.non_null, inv.features, example
        ));
    }

    out.push_str("\nConcept resolution:\n");
    for o in &inv.schema.outcomes {
        match &o.resolution {
            Resolution::Matched(column) => {
                out.push_str(&format!("  {:<22} -> {}\n", o.concept.key(), column));
            }
            Resolution::NotFound => {
                out.push_str(&format!("  {:<22} -- not found\n", o.concept.key()));
            }
        }
    }
    out
}

/// Write the rendered inventory to `<stem>.columns.txt` beside `input`.
pub fn write_columns_file(input: &Path, inv: &Inventory) -> Result<PathBuf, AppError> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("input");
    let path = input.with_file_name(format!("{stem}.columns.txt"));
    std::fs::write(&path, render_inventory(inv))
        .map_err(|e| AppError::new(AppError::RUNTIME, format!("Failed to write '{}': {e}", path.display())))?;
    Ok(path)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
