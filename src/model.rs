//! # Data Model
//!
//! Core data structures for record linkage: compact identifiers, string
//! interning, column-oriented record sets with explicit missing markers,
//! field comparison specs, and the agreement-pattern encoding.

use crate::error::LinkError;
use crate::similarity::Measure;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Compact identifier for fields (columns)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId(pub u32);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{}", self.0)
    }
}

/// Compact identifier for interned values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId(pub u32);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.0)
    }
}

/// String interner for field names and record values.
///
/// All record values are interned; a record cell is `Option<ValueId>`, so
/// "missing" is an explicit variant and never a value in the domain's own
/// value space. Ids are dense indices into the storage vectors, so the
/// reverse lookup is a vector index rather than a second map.
#[derive(Debug, Clone, Default)]
pub struct StringInterner {
    field_ids: HashMap<String, FieldId>,
    fields: Vec<String>,
    value_ids: HashMap<String, ValueId>,
    values: Vec<String>,
}

impl StringInterner {
    /// Create a new string interner
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a field name and return its ID
    pub fn intern_field(&mut self, field: &str) -> FieldId {
        if let Some(&id) = self.field_ids.get(field) {
            return id;
        }
        let id = FieldId(self.fields.len() as u32);
        self.field_ids.insert(field.to_string(), id);
        self.fields.push(field.to_string());
        id
    }

    /// Intern a value string and return its ID
    pub fn intern_value(&mut self, value: &str) -> ValueId {
        if let Some(&id) = self.value_ids.get(value) {
            return id;
        }
        let id = ValueId(self.values.len() as u32);
        self.value_ids.insert(value.to_string(), id);
        self.values.push(value.to_string());
        id
    }

    /// Get the string for a field ID
    pub fn get_field(&self, id: FieldId) -> Option<&str> {
        self.fields.get(id.0 as usize).map(String::as_str)
    }

    /// Get the string for a value ID
    pub fn get_value(&self, id: ValueId) -> Option<&str> {
        self.values.get(id.0 as usize).map(String::as_str)
    }

    pub fn get_field_id(&self, field: &str) -> Option<FieldId> {
        self.field_ids.get(field).copied()
    }

    pub fn get_value_id(&self, value: &str) -> Option<ValueId> {
        self.value_ids.get(value).copied()
    }

    /// Field label for error reporting; falls back to the compact id for a
    /// field never interned here.
    pub fn field_label(&self, id: FieldId) -> String {
        match self.get_field(id) {
            Some(name) => name.to_string(),
            None => id.to_string(),
        }
    }
}

/// One source's records, column-oriented and immutable once built.
///
/// Every registered column has exactly `len` cells; a cell is `None` when the
/// record has no observed value for that column.
#[derive(Debug, Clone)]
pub struct RecordSet {
    len: usize,
    columns: HashMap<FieldId, Vec<Option<ValueId>>>,
}

impl RecordSet {
    /// Create an empty record set holding `len` records.
    pub fn new(len: usize) -> Self {
        Self {
            len,
            columns: HashMap::new(),
        }
    }

    /// Register a column. The cell count must match the record count.
    pub fn add_column(
        &mut self,
        field: FieldId,
        cells: Vec<Option<ValueId>>,
    ) -> Result<(), LinkError> {
        if cells.len() != self.len {
            return Err(LinkError::InvalidInput(format!(
                "column {} has {} cells, record set has {} records",
                field,
                cells.len(),
                self.len
            )));
        }
        self.columns.insert(field, cells);
        Ok(())
    }

    /// Get a column's cells, if registered.
    pub fn column(&self, field: FieldId) -> Option<&[Option<ValueId>]> {
        self.columns.get(&field).map(Vec::as_slice)
    }

    pub fn has_column(&self, field: FieldId) -> bool {
        self.columns.contains_key(&field)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// How a linked field is compared between the two sides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompareMode {
    /// Interned-value equality over the component tuple.
    Exact,
    /// String similarity; the field agrees when the (component-averaged)
    /// score reaches `threshold`.
    Fuzzy { measure: Measure, threshold: f64 },
}

/// A linked field: one or more component columns carrying representations of
/// the same underlying attribute, plus a comparison mode.
///
/// Composite fields list several components; their similarity is the mean of
/// the per-component scores, and the field counts as missing for a record
/// whenever any component is missing.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub components: Vec<FieldId>,
    pub mode: CompareMode,
}

impl FieldSpec {
    /// An exact-match field over a single column.
    pub fn exact(name: impl Into<String>, component: FieldId) -> Self {
        Self {
            name: name.into(),
            components: vec![component],
            mode: CompareMode::Exact,
        }
    }

    /// A fuzzy field over a single column.
    pub fn fuzzy(
        name: impl Into<String>,
        component: FieldId,
        measure: Measure,
        threshold: f64,
    ) -> Self {
        Self {
            name: name.into(),
            components: vec![component],
            mode: CompareMode::Fuzzy { measure, threshold },
        }
    }

    /// A composite fuzzy field averaging similarity over several
    /// sub-representations of the same attribute.
    pub fn fuzzy_composite(
        name: impl Into<String>,
        components: Vec<FieldId>,
        measure: Measure,
        threshold: f64,
    ) -> Self {
        Self {
            name: name.into(),
            components,
            mode: CompareMode::Fuzzy { measure, threshold },
        }
    }

    pub fn is_fuzzy(&self) -> bool {
        matches!(self.mode, CompareMode::Fuzzy { .. })
    }
}

/// Per-field comparison outcome for one record pair.
///
/// Missing dominates: whenever either side's value is absent the outcome is
/// `Missing`, regardless of what the agreement set would say.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbol {
    Agree,
    Disagree,
    Missing,
}

impl Symbol {
    pub(crate) fn to_bits(self) -> u32 {
        match self {
            Symbol::Agree => 0,
            Symbol::Disagree => 1,
            Symbol::Missing => 2,
        }
    }

    pub(crate) fn from_bits(bits: u32) -> Symbol {
        // 0b11 is never produced by the encoder.
        match bits & 0b11 {
            0 => Symbol::Agree,
            1 => Symbol::Disagree,
            _ => Symbol::Missing,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Symbol::Agree => 'A',
            Symbol::Disagree => 'D',
            Symbol::Missing => 'M',
        };
        write!(f, "{}", c)
    }
}

/// Maximum number of linked fields a pattern code can carry.
pub const MAX_FIELDS: usize = 16;

/// A joint agreement pattern packed two bits per field into a `u32`.
///
/// Field 0 occupies the lowest bits. Used as the tabulation key so counting
/// never allocates per cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatternCode(pub u32);

impl PatternCode {
    /// Pack a symbol tuple. Fails for schemas wider than [`MAX_FIELDS`].
    pub fn encode(symbols: &[Symbol]) -> Result<Self, LinkError> {
        if symbols.len() > MAX_FIELDS {
            return Err(LinkError::InvalidInput(format!(
                "{} linked fields exceed the pattern limit of {}",
                symbols.len(),
                MAX_FIELDS
            )));
        }
        let mut code = 0u32;
        for (idx, symbol) in symbols.iter().enumerate() {
            code |= symbol.to_bits() << (2 * idx);
        }
        Ok(Self(code))
    }

    /// Unpack into one symbol per field.
    pub fn decode(self, width: usize) -> Vec<Symbol> {
        (0..width)
            .map(|idx| Symbol::from_bits(self.0 >> (2 * idx)))
            .collect()
    }

    /// The symbol for one field position.
    pub fn symbol_at(self, field: usize) -> Symbol {
        Symbol::from_bits(self.0 >> (2 * field))
    }

    /// Render as an `A`/`D`/`M` string, field 0 first.
    pub fn display(self, width: usize) -> String {
        self.decode(width).iter().map(Symbol::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interner_round_trip() {
        let mut interner = StringInterner::new();

        let name = interner.intern_field("surname");
        let city = interner.intern_field("city");
        let name_again = interner.intern_field("surname");

        assert_eq!(name, name_again);
        assert_ne!(name, city);
        assert_eq!(interner.get_field(name), Some("surname"));

        let v1 = interner.intern_value("smith");
        let v2 = interner.intern_value("smyth");
        assert_ne!(v1, v2);
        assert_eq!(interner.get_value_id("smith"), Some(v1));

        assert_eq!(interner.field_label(name), "surname");
        assert_eq!(interner.field_label(FieldId(99)), "F99");
    }

    #[test]
    fn test_record_set_rejects_ragged_columns() {
        let mut set = RecordSet::new(3);
        let err = set
            .add_column(FieldId(0), vec![Some(ValueId(1)), None])
            .unwrap_err();
        assert!(matches!(err, LinkError::InvalidInput(_)));

        set.add_column(FieldId(0), vec![Some(ValueId(1)), None, Some(ValueId(2))])
            .unwrap();
        assert_eq!(set.column(FieldId(0)).unwrap().len(), 3);
        assert_eq!(set.column(FieldId(0)).unwrap()[1], None);
    }

    #[test]
    fn test_pattern_code_round_trip() {
        let symbols = vec![
            Symbol::Agree,
            Symbol::Missing,
            Symbol::Disagree,
            Symbol::Agree,
        ];
        let code = PatternCode::encode(&symbols).unwrap();
        assert_eq!(code.decode(4), symbols);
        assert_eq!(code.symbol_at(1), Symbol::Missing);
        assert_eq!(code.display(4), "AMDA");
    }

    #[test]
    fn test_pattern_code_bit_layout() {
        let code = PatternCode::encode(&[Symbol::Disagree, Symbol::Missing]).unwrap();
        // field 0 in the low bits, two bits per field
        assert_eq!(code.0, 0b10_01);
    }

    #[test]
    fn test_pattern_code_width_limit() {
        let wide = vec![Symbol::Agree; MAX_FIELDS + 1];
        assert!(PatternCode::encode(&wide).is_err());
        let ok = vec![Symbol::Missing; MAX_FIELDS];
        assert!(PatternCode::encode(&ok).is_ok());
    }
}
