//! # Export Module
//!
//! Output surfaces for the review/export collaborator: linked pairs as JSON
//! lines, and a human-readable summary of the contingency table.

use crate::model::FieldSpec;
use crate::retrieve::LinkedPair;
use crate::tabulate::FrequencyTable;
use anyhow::Result;
use std::fmt::Write as _;

/// Serialize linked pairs as one JSON object per line.
pub fn export_pairs_jsonl(pairs: &[LinkedPair]) -> Result<String> {
    let mut out = String::new();
    for pair in pairs {
        out.push_str(&serde_json::to_string(pair)?);
        out.push('\n');
    }
    Ok(out)
}

/// Render the contingency table as an aligned text summary.
pub fn export_table_summary(table: &FrequencyTable, fields: &[FieldSpec]) -> String {
    let mut summary = String::new();

    summary.push_str("Agreement Pattern Counts\n");
    summary.push_str("========================\n\n");

    let names: Vec<&str> = fields.iter().map(|spec| spec.name.as_str()).collect();
    let _ = writeln!(summary, "Fields: {}\n", names.join(", "));

    for (pattern, count) in table.patterns() {
        let _ = writeln!(summary, "  {}  {:>14}", pattern.display(table.width()), count);
    }
    let _ = writeln!(summary, "\nTotal pairs: {}", table.total());
    let _ = writeln!(summary, "Observed patterns: {}", table.len());

    summary
}
