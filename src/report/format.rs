//! Formatted terminal output.
//!
//! Formatting lives in one place so the scoring code stays free of
//! presentation concerns and output changes are localized.

use crate::domain::OutputPaths;
use crate::report::{RankedTract, RunSummary};

const RULE_WIDTH: usize = 70;

/// Run-level facts printed above the statistics.
#[derive(Debug, Clone)]
pub struct RunHeader {
    pub input: String,
    pub preset: String,
    pub period_label: String,
    pub data_year: i32,
}

/// Format the full run summary.
pub fn format_run_summary(header: &RunHeader, summary: &RunSummary) -> String {
    let mut out = String::new();

    out.push_str(&rule('='));
    out.push_str("dvi - Displacement Vulnerability Index\n");
    out.push_str(&rule('='));
    out.push_str(&format!("Input:   {}\n", header.input));
    out.push_str(&format!("Preset:  {}\n", header.preset));
    out.push_str(&format!("Period:  {} (data year {})\n", header.period_label, header.data_year));
    out.push_str(&format!("Tracts:  {}\n", summary.tracts));
    out.push_str(&format!("Columns: {} resolved", summary.columns_resolved));
    if !summary.columns_missing.is_empty() {
        out.push_str(&format!(", not found: {}", summary.columns_missing.join(", ")));
    }
    out.push('\n');

    out.push_str("\nPillars:\n");
    for p in &summary.pillars {
        let mut line = format!(
            "  {:<20} w={:.2}  present={:<5} imputed={:<5} {}",
            p.pillar.key(),
            p.weight,
            p.present,
            p.imputed,
            p.source
        );
        if p.unknown_categories > 0 {
            line.push_str(&format!("  ({} unrecognized)", p.unknown_categories));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }

    if let Some(join) = &summary.join {
        out.push_str(&format!(
            "\nACS join: {} / {} tracts matched ({:.0}%)\n",
            join.matched,
            join.total,
            pct(join.matched, join.total)
        ));
        out.push_str(&format!(
            "  counties: {} fetched, {} failed\n",
            join.fetched_counties,
            join.failed_counties.len()
        ));
        if !join.failed_counties.is_empty() {
            out.push_str(&format!("  failed counties: {}\n", join.failed_counties.join(", ")));
        }
    }

    out.push('\n');
    out.push_str(&section("DVI DISTRIBUTION"));
    for bin in &summary.bins {
        out.push_str(&format!("  {:<14} {:>6}\n", bin.label, bin.count));
    }

    if !summary.by_category.is_empty() {
        out.push('\n');
        out.push_str(&section("DVI BY DISPLACEMENT RISK CATEGORY"));
        out.push_str(&format!(
            "  {:<32} {:>6} {:>7} {:>7} {:>7}\n",
            "category", "count", "mean", "min", "max"
        ));
        for c in &summary.by_category {
            out.push_str(&format!(
                "  {:<32} {:>6} {:>7.1} {:>7.1} {:>7.1}\n",
                truncate(&c.category, 32),
                c.count,
                c.mean,
                c.min,
                c.max
            ));
        }
    }

    if !summary.top.is_empty() {
        out.push('\n');
        out.push_str(&section(&format!("TOP {} MOST VULNERABLE TRACTS", summary.top.len())));
        out.push_str(&format_top_table(&summary.top));
    }

    if !summary.metrics.is_empty() {
        out.push('\n');
        out.push_str(&section("SOCIOECONOMIC SUMMARY"));
        for m in &summary.metrics {
            out.push_str(&format!(
                "  {:<20} n={:>4}  mean={:>12.1}  median={:>12.1}  min={:>12.1}  max={:>12.1}\n",
                m.metric.display_name(),
                m.n,
                m.mean,
                m.median,
                m.min,
                m.max
            ));
        }
        out.push_str("\n  Correlation with DVI:\n");
        for m in &summary.metrics {
            if let Some(r) = m.dvi_correlation {
                out.push_str(&format!("    {:<20} r = {r:+.3}\n", m.metric.display_name()));
            }
        }
    }

    out.push('\n');
    out.push_str(&rule('='));
    out.push_str(&format!("Total tracts:  {}\n", summary.tracts));
    out.push_str(&format!("Mean DVI:      {}\n", fmt_opt(summary.dvi_mean, 1)));
    out.push_str(&format!("Median DVI:    {}\n", fmt_opt(summary.dvi_median, 1)));
    out.push_str(&rule('='));

    out
}

/// Format the list of written artifacts.
pub fn format_outputs(paths: &OutputPaths) -> String {
    let mut out = String::from("Outputs:\n");
    for p in [&paths.index_series, &paths.socioeconomic, &paths.features] {
        out.push_str(&format!("  {}\n", p.display()));
    }
    out
}

fn format_top_table(rows: &[RankedTract]) -> String {
    let mut out = String::new();
    let with_metrics = rows.iter().any(|r| r.income.is_some() || r.pct_cost_burdened.is_some());

    let mut header = format!("  {:<40} {:>6} {:<28}", "region", "dvi", "displacement risk");
    if with_metrics {
        header.push_str(&format!(" {:>10} {:>8}", "income", "burden%"));
    }
    out.push_str(header.trim_end());
    out.push('\n');

    for r in rows {
        let mut line = format!(
            "  {:<40} {:>6.1} {:<28}",
            truncate(&r.region, 40),
            r.dvi,
            truncate(&r.displacement_risk, 28)
        );
        if with_metrics {
            line.push_str(&format!(
                " {:>10} {:>8}",
                fmt_opt(r.income, 0),
                fmt_opt(r.pct_cost_burdened, 1)
            ));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

fn rule(ch: char) -> String {
    let mut s: String = std::iter::repeat_n(ch, RULE_WIDTH).collect();
    s.push('\n');
    s
}

fn section(title: &str) -> String {
    format!("{}{title}\n{}", rule('='), rule('='))
}

fn pct(n: usize, total: usize) -> f64 {
    if total == 0 { 0.0 } else { n as f64 / total as f64 * 100.0 }
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    match v {
        Some(x) => format!("{x:.decimals$}"),
        None => "-".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
