//! Generic record sorting: a comparator factory over named fields and an
//! explicitly stable sort.
//!
//! Every list page sorts the rows of the currently fetched page on the
//! client. The comparator never fails on missing or mixed-type values, and
//! stability is guaranteed by construction (index tagging) rather than by
//! leaning on the standard sort's behavior.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// Field Values
// ============================================================================

/// A sortable cell value extracted from an API record.
///
/// ISO-8601 date and datetime strings are carried as `Text`; their
/// lexicographic order equals chronological order, so no separate date
/// variant is needed.
///
/// Values form a total order so comparisons never fail:
/// `Missing < Number < Text`, NaN numbers compare as 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Absent or non-comparable value. Sorts before everything else.
    Missing,
    Number(f64),
    Text(String),
}

impl FieldValue {
    fn rank(&self) -> u8 {
        match self {
            FieldValue::Missing => 0,
            FieldValue::Number(_) => 1,
            FieldValue::Text(_) => 2,
        }
    }

    /// Total-order comparison between two values.
    pub fn compare(&self, other: &FieldValue) -> Ordering {
        match (self, other) {
            (FieldValue::Number(a), FieldValue::Number(b)) => {
                let a = if a.is_nan() { 0.0 } else { *a };
                let b = if b.is_nan() { 0.0 } else { *b };
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
            (FieldValue::Text(a), FieldValue::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Number(v as f64)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Missing, Into::into)
    }
}

// ============================================================================
// Sort State
// ============================================================================

/// Direction of the active sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// The one active sort of a list page: a field name and a direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortState {
    pub field: String,
    pub direction: SortDirection,
}

impl SortState {
    pub fn new(field: &str, direction: SortDirection) -> Self {
        Self {
            field: field.to_string(),
            direction,
        }
    }
}

// ============================================================================
// Derived Records
// ============================================================================

/// The flattened, sortable projection of one API record.
///
/// Enrichment maps each raw record to a `DerivedRecord` before sorting:
/// nested entities are replaced by their display names and computed values
/// (duration, counts) become plain fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedRecord {
    /// Unique identifier of the underlying record.
    pub id: i64,
    pub fields: HashMap<String, FieldValue>,
}

impl DerivedRecord {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            fields: HashMap::new(),
        }
    }

    /// Builder-style field insertion.
    pub fn with(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }
}

/// Records that can be flattened into their sortable projection.
pub trait TableRecord {
    fn derived(&self) -> DerivedRecord;
}

// ============================================================================
// Comparator Factory
// ============================================================================

/// Build a binary comparator over two derived records for a named field.
///
/// Ascending puts lower field values first, descending higher first; equal
/// values compare `Equal`. A record missing the field compares as
/// [`FieldValue::Missing`], so the comparator is total and never fails.
pub fn field_comparator(
    field: &str,
    direction: SortDirection,
) -> impl Fn(&DerivedRecord, &DerivedRecord) -> Ordering {
    let field = field.to_string();
    move |a, b| {
        let ord = match (a.fields.get(&field), b.fields.get(&field)) {
            (Some(x), Some(y)) => x.compare(y),
            (Some(x), None) => x.compare(&FieldValue::Missing),
            (None, Some(y)) => FieldValue::Missing.compare(y),
            (None, None) => Ordering::Equal,
        };
        match direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    }
}

// ============================================================================
// Stable Sort
// ============================================================================

/// Sort a sequence by a comparator, breaking ties by original input position.
///
/// Each element is tagged with its index, sorted by (comparator, index), and
/// untagged, so equal-key groups keep their first-seen order no matter how
/// often the sort is reapplied.
pub fn stable_sort<T, F>(items: &[T], cmp: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T, &T) -> Ordering,
{
    let mut tagged: Vec<(usize, &T)> = items.iter().enumerate().collect();
    tagged.sort_by(|a, b| cmp(a.1, b.1).then(a.0.cmp(&b.0)));
    tagged.into_iter().map(|(_, item)| item.clone()).collect()
}
