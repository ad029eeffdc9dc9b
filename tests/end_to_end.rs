//! End-to-end linkage over the documented 3x3 scenario and over a larger
//! generated dataset: indices, agreement, tabulation, thresholds, and pair
//! retrieval all the way to the exported output.

use reclink::export::export_pairs_jsonl;
use reclink::{
    Decision, FieldSpec, FittedRow, FittedTable, Linker, PatternCode, RecordSet, StringInterner,
    Symbol, ThresholdPair,
};

#[test]
fn three_by_three_scenario_links_expected_pairs() -> anyhow::Result<()> {
    let mut interner = StringInterner::new();
    let field = interner.intern_field("code");
    let x = interner.intern_value("x");
    let y = interner.intern_value("y");

    let mut set_a = RecordSet::new(3);
    set_a.add_column(field, vec![Some(x), Some(x), Some(y)])?;
    let mut set_b = RecordSet::new(3);
    set_b.add_column(field, vec![Some(x), Some(y), Some(y)])?;

    let linker = Linker::new(set_a, set_b, interner, vec![FieldSpec::exact("code", field)])?;
    let artifacts = linker.build_agreement()?;

    // the agreement matrix is exactly the bucket cross products
    let mut agree_pairs = linker.pairs_for_pattern(&artifacts, &[Symbol::Agree])?;
    agree_pairs.sort_unstable();
    assert_eq!(agree_pairs, vec![(0, 0), (1, 0), (2, 1), (2, 2)]);

    let table = linker.tabulate(&artifacts)?;
    assert_eq!(table.total(), 9);
    assert_eq!(table.count(PatternCode::encode(&[Symbol::Agree])?), 4);
    assert_eq!(table.count(PatternCode::encode(&[Symbol::Disagree])?), 5);
    assert_eq!(table.count(PatternCode::encode(&[Symbol::Missing])?), 0);

    // hand-fitted probabilities: agreement means match here
    let fitted = FittedTable {
        rows: vec![
            FittedRow {
                pattern: PatternCode::encode(&[Symbol::Agree])?,
                count: 4,
                probability: 0.98,
            },
            FittedRow {
                pattern: PatternCode::encode(&[Symbol::Disagree])?,
                count: 5,
                probability: 0.01,
            },
        ],
        match_proportion: 4.0 / 9.0,
    };
    let thresholds = linker.thresholds(&table, &fitted, 0.05, 0.05)?;
    assert_eq!(thresholds.high, 0.98);
    assert_eq!(thresholds.low, 0.01);

    // the agreeing pairs link; the disagreeing ones sit at the low cutoff
    // and land in the review band
    let pairs = linker.linked_pairs(&artifacts, &fitted, &thresholds)?;
    let mut linked: Vec<(u32, u32)> = pairs
        .iter()
        .filter(|p| p.decision == Decision::Link)
        .map(|p| (p.a, p.b))
        .collect();
    linked.sort_unstable();
    assert_eq!(linked, vec![(0, 0), (1, 0), (2, 1), (2, 2)]);
    let reviewed = pairs
        .iter()
        .filter(|p| p.decision == Decision::Review)
        .count();
    assert_eq!(reviewed, 5);

    let jsonl = export_pairs_jsonl(&pairs)?;
    assert_eq!(jsonl.trim_end().lines().count(), 9);
    Ok(())
}

#[test]
fn generated_dataset_round_trips_every_pattern() -> anyhow::Result<()> {
    let generated = reclink::test_support::generate_linkage(120, 90, 0.25, 0.08, 7);
    let width = generated.fields.len();
    let linker = Linker::new(
        generated.set_a,
        generated.set_b,
        generated.interner,
        generated.fields,
    )?;

    let artifacts = linker.build_agreement()?;
    let table = linker.tabulate(&artifacts)?;

    // total mass covers the whole cross product
    assert_eq!(table.total(), 120 * 90);

    // every observed pattern retrieves exactly its tabulated count, and
    // every retrieved pair re-derives to the pattern it came from
    for (pattern, count) in table.patterns() {
        let symbols = pattern.decode(width);
        let pairs = linker.pairs_for_pattern(&artifacts, &symbols)?;
        assert_eq!(
            pairs.len() as u64,
            count,
            "pattern {} count mismatch",
            pattern.display(width)
        );
    }
    Ok(())
}

#[test]
fn composite_field_goes_missing_when_any_component_is() -> anyhow::Result<()> {
    use reclink::Measure;

    let mut interner = StringInterner::new();
    let first = interner.intern_field("first");
    let last = interner.intern_field("last");
    let john = interner.intern_value("john");
    let smith = interner.intern_value("smith");

    // A0 has both components; A1 is missing one
    let mut set_a = RecordSet::new(2);
    set_a.add_column(first, vec![Some(john), Some(john)])?;
    set_a.add_column(last, vec![Some(smith), None])?;

    let mut set_b = RecordSet::new(1);
    set_b.add_column(first, vec![Some(john)])?;
    set_b.add_column(last, vec![Some(smith)])?;

    let spec = FieldSpec::fuzzy_composite("name", vec![first, last], Measure::JaroWinkler, 0.9);
    let linker = Linker::new(set_a, set_b, interner, vec![spec])?;
    let artifacts = linker.build_agreement()?;
    let table = linker.tabulate(&artifacts)?;

    assert_eq!(table.count(PatternCode::encode(&[Symbol::Agree])?), 1);
    assert_eq!(table.count(PatternCode::encode(&[Symbol::Missing])?), 1);
    assert_eq!(table.count(PatternCode::encode(&[Symbol::Disagree])?), 0);

    // a pattern requiring disagreement must not surface the missing pair
    let disagree = linker.pairs_for_pattern(&artifacts, &[Symbol::Disagree])?;
    assert!(disagree.is_empty());
    Ok(())
}

#[test]
fn review_band_sits_between_thresholds() -> anyhow::Result<()> {
    use reclink::{decide, Decision};

    let thresholds = ThresholdPair {
        low: 0.2,
        high: 0.85,
    };
    assert_eq!(decide(0.86, &thresholds), Decision::Link);
    assert_eq!(decide(0.5, &thresholds), Decision::Review);
    assert_eq!(decide(0.19, &thresholds), Decision::NonLink);
    Ok(())
}
