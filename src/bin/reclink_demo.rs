//! Demo: link two generated record sets end to end and print the resulting
//! contingency table, thresholds, and a sample of the linked pairs.
//!
//! The fitter used here is a deliberately naive frequency-weighted stand-in
//! for the external latent-class estimator; it only exists so the demo can
//! run self-contained.

use anyhow::Result;
use reclink::test_support::generate_linkage;
use reclink::{
    export, FittedRow, FittedTable, FrequencyTable, LinkError, Linker, ProbabilityFitter, Symbol,
};

/// Scores a pattern by its agreement share: agreements pull toward 1,
/// disagreements toward 0, missing fields are uninformative.
struct AgreementShareFitter {
    width: usize,
}

impl ProbabilityFitter for AgreementShareFitter {
    fn fit(&self, table: &FrequencyTable) -> Result<FittedTable, LinkError> {
        let mut rows = Vec::new();
        let mut match_mass = 0.0;
        let mut total = 0.0;

        for (pattern, count) in table.patterns() {
            let symbols = pattern.decode(self.width);
            let mut weight = 0.0;
            let mut informative = 0usize;
            for symbol in &symbols {
                match symbol {
                    Symbol::Agree => {
                        weight += 1.0;
                        informative += 1;
                    }
                    Symbol::Disagree => informative += 1,
                    Symbol::Missing => {}
                }
            }
            let probability = if informative == 0 {
                0.5
            } else {
                // squared share separates near-matches from the bulk
                (weight / informative as f64).powi(2).clamp(0.001, 0.999)
            };
            match_mass += probability * count as f64;
            total += count as f64;
            rows.push(FittedRow {
                pattern,
                count,
                probability,
            });
        }

        Ok(FittedTable {
            rows,
            match_proportion: if total > 0.0 { match_mass / total } else { 0.0 },
        })
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let generated = generate_linkage(400, 300, 0.3, 0.05, 42);
    let width = generated.fields.len();
    let linker = Linker::new(
        generated.set_a,
        generated.set_b,
        generated.interner,
        generated.fields.clone(),
    )?;

    let artifacts = linker.build_agreement()?;
    let table = linker.tabulate(&artifacts)?;
    println!("{}", export::export_table_summary(&table, &generated.fields));

    let fitted = AgreementShareFitter { width }.fit(&table)?;
    let thresholds = linker.thresholds(&table, &fitted, 0.05, 0.05)?;
    println!(
        "thresholds: link at p >= {:.4}, review down to p >= {:.4}",
        thresholds.high, thresholds.low
    );

    let pairs = linker.linked_pairs(&artifacts, &fitted, &thresholds)?;
    println!("linked + review pairs: {}", pairs.len());
    for pair in pairs.iter().take(10) {
        println!(
            "  A{} <-> B{}  p={:.4}  {:?}",
            pair.a, pair.b, pair.probability, pair.decision
        );
    }

    let jsonl = export::export_pairs_jsonl(&pairs)?;
    println!("\nfirst export line: {}", jsonl.lines().next().unwrap_or(""));

    Ok(())
}
