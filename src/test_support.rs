//! Seeded synthetic data for tests and the demo binary: two person record
//! sets with tunable value overlap and missingness.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::model::{FieldSpec, RecordSet, StringInterner, ValueId};
use crate::similarity::Measure;

const SURNAMES: &[&str] = &[
    "smith", "johnson", "garcia", "miller", "jones", "davis", "lopez", "wilson",
];
const FIRST_NAMES: &[&str] = &[
    "james", "mary", "robert", "linda", "michael", "elena", "david", "sarah",
];
const CITIES: &[&str] = &["rome", "oslo", "lima", "kyoto", "porto", "quito"];

/// A generated linkage scenario: two sides, the shared interner, and the
/// linked fields over them.
#[derive(Debug, Clone)]
pub struct GeneratedLinkage {
    pub set_a: RecordSet,
    pub set_b: RecordSet,
    pub interner: StringInterner,
    pub fields: Vec<FieldSpec>,
}

/// Generate two record sets of `n1` and `n2` records. With probability
/// `overlap` a side-B record copies a side-A record's values (so the code
/// column matches exactly and the name columns match fuzzily after a typo);
/// each cell is independently missing with probability `missing`.
pub fn generate_linkage(
    n1: usize,
    n2: usize,
    overlap: f64,
    missing: f64,
    seed: u64,
) -> GeneratedLinkage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut interner = StringInterner::new();

    let surname = interner.intern_field("surname");
    let first = interner.intern_field("first_name");
    let city = interner.intern_field("city");
    let code = interner.intern_field("code");

    let mut rows_a: Vec<[String; 4]> = Vec::with_capacity(n1);
    for idx in 0..n1 {
        rows_a.push([
            SURNAMES[rng.random_range(0..SURNAMES.len())].to_string(),
            FIRST_NAMES[rng.random_range(0..FIRST_NAMES.len())].to_string(),
            CITIES[rng.random_range(0..CITIES.len())].to_string(),
            format!("id{:06}", idx),
        ]);
    }

    let mut rows_b: Vec<[String; 4]> = Vec::with_capacity(n2);
    for idx in 0..n2 {
        if !rows_a.is_empty() && rng.random_bool(overlap) {
            let source = &rows_a[rng.random_range(0..rows_a.len())];
            let mut row = source.clone();
            // a single-character typo keeps the pair fuzzy-matchable
            if rng.random_bool(0.5) {
                row[0] = inject_typo(&row[0], &mut rng);
            }
            rows_b.push(row);
        } else {
            rows_b.push([
                SURNAMES[rng.random_range(0..SURNAMES.len())].to_string(),
                FIRST_NAMES[rng.random_range(0..FIRST_NAMES.len())].to_string(),
                CITIES[rng.random_range(0..CITIES.len())].to_string(),
                format!("id{:06}", n1 + idx),
            ]);
        }
    }

    let mut build_set = |rows: &[[String; 4]], rng: &mut StdRng| -> RecordSet {
        let mut set = RecordSet::new(rows.len());
        for (column, field) in [surname, first, city, code].into_iter().enumerate() {
            let cells: Vec<Option<ValueId>> = rows
                .iter()
                .map(|row| {
                    if rng.random_bool(missing) {
                        None
                    } else {
                        Some(interner.intern_value(&row[column]))
                    }
                })
                .collect();
            set.add_column(field, cells).expect("columns sized to rows");
        }
        set
    };

    let set_a = build_set(&rows_a, &mut rng);
    let set_b = build_set(&rows_b, &mut rng);

    let fields = vec![
        FieldSpec::fuzzy("surname", surname, Measure::JaroWinkler, 0.88),
        FieldSpec::fuzzy("first_name", first, Measure::NormalizedLevenshtein, 0.8),
        FieldSpec::exact("city", city),
        FieldSpec::exact("code", code),
    ];

    GeneratedLinkage {
        set_a,
        set_b,
        interner,
        fields,
    }
}

fn inject_typo(value: &str, rng: &mut StdRng) -> String {
    let mut chars: Vec<char> = value.chars().collect();
    if chars.is_empty() {
        return value.to_string();
    }
    let pos = rng.random_range(0..chars.len());
    let replacement = (b'a' + rng.random_range(0..26u8)) as char;
    chars[pos] = replacement;
    chars.into_iter().collect()
}
