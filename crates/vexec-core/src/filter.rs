//! Subfield filter primitives.
//!
//! A subfield filter is a predicate on a single column that the scan reader
//! evaluates directly while decoding, letting it skip rows or whole blocks.
//! The variants here mirror exactly what the readers recognize; anything a
//! filter expression cannot be lowered into stays above the scan as a
//! residual expression instead.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Path of the column a filter applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Subfield(String);

impl Subfield {
    pub fn new(path: impl Into<String>) -> Self {
        Subfield(path.into())
    }

    pub fn path(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subfield {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The per-scan pushdown set: one filter per referenced column.
pub type SubfieldFilters = HashMap<Subfield, SubfieldFilter>;

/// Discriminant of a [`SubfieldFilter`], used for capability checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterKind {
    AlwaysTrue,
    AlwaysFalse,
    IsNull,
    IsNotNull,
    BoolValue,
    BigintRange,
    BigintValuesUsingBitmask,
    BigintValuesUsingHashTable,
    BigintMultiRange,
    FloatRange,
    DoubleRange,
    BytesRange,
    BytesValues,
    MultiRange,
}

/// A contiguous range of 64-bit integers.
///
/// Either side may be unbounded; the stored bound value is a placeholder in
/// that case and must not be read. `null_allowed` decides whether NULL rows
/// pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BigintRange {
    pub lower: i64,
    pub lower_unbounded: bool,
    pub lower_exclusive: bool,
    pub upper: i64,
    pub upper_unbounded: bool,
    pub upper_exclusive: bool,
    pub null_allowed: bool,
}

impl BigintRange {
    /// The degenerate single-value range `[value, value]`.
    pub fn point(value: i64, null_allowed: bool) -> Self {
        BigintRange {
            lower: value,
            lower_unbounded: false,
            lower_exclusive: false,
            upper: value,
            upper_unbounded: false,
            upper_exclusive: false,
            null_allowed,
        }
    }
}

/// A contiguous range of 64-bit floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoubleRange {
    pub lower: f64,
    pub lower_unbounded: bool,
    pub lower_exclusive: bool,
    pub upper: f64,
    pub upper_unbounded: bool,
    pub upper_exclusive: bool,
    pub null_allowed: bool,
}

impl DoubleRange {
    pub fn point(value: f64, null_allowed: bool) -> Self {
        DoubleRange {
            lower: value,
            lower_unbounded: false,
            lower_exclusive: false,
            upper: value,
            upper_unbounded: false,
            upper_exclusive: false,
            null_allowed,
        }
    }
}

/// A contiguous range of 32-bit floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloatRange {
    pub lower: f32,
    pub lower_unbounded: bool,
    pub lower_exclusive: bool,
    pub upper: f32,
    pub upper_unbounded: bool,
    pub upper_exclusive: bool,
    pub null_allowed: bool,
}

/// A lexicographic range of byte strings.
///
/// Unbounded sides store an empty string; `*_unbounded` is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BytesRange {
    pub lower: String,
    pub lower_unbounded: bool,
    pub lower_exclusive: bool,
    pub upper: String,
    pub upper_unbounded: bool,
    pub upper_exclusive: bool,
    pub null_allowed: bool,
}

impl BytesRange {
    pub fn point(value: String, null_allowed: bool) -> Self {
        BytesRange {
            lower: value.clone(),
            lower_unbounded: false,
            lower_exclusive: false,
            upper: value,
            upper_unbounded: false,
            upper_exclusive: false,
            null_allowed,
        }
    }
}

/// A single-column filter the scan reader can evaluate.
///
/// `MultiRange` and `BigintMultiRange` are disjunctions: a row passes if it
/// passes any member range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SubfieldFilter {
    AlwaysTrue,
    AlwaysFalse,
    IsNull,
    IsNotNull,
    BoolValue {
        value: bool,
        null_allowed: bool,
    },
    BigintRange(BigintRange),
    BigintValuesUsingBitmask {
        min: i64,
        max: i64,
        values: Vec<i64>,
        null_allowed: bool,
    },
    BigintValuesUsingHashTable {
        min: i64,
        max: i64,
        values: Vec<i64>,
        null_allowed: bool,
    },
    BigintMultiRange {
        ranges: Vec<BigintRange>,
        null_allowed: bool,
    },
    FloatRange(FloatRange),
    DoubleRange(DoubleRange),
    BytesRange(BytesRange),
    BytesValues {
        values: Vec<String>,
        null_allowed: bool,
    },
    MultiRange {
        ranges: Vec<SubfieldFilter>,
        null_allowed: bool,
    },
}

impl SubfieldFilter {
    pub fn kind(&self) -> FilterKind {
        match self {
            SubfieldFilter::AlwaysTrue => FilterKind::AlwaysTrue,
            SubfieldFilter::AlwaysFalse => FilterKind::AlwaysFalse,
            SubfieldFilter::IsNull => FilterKind::IsNull,
            SubfieldFilter::IsNotNull => FilterKind::IsNotNull,
            SubfieldFilter::BoolValue { .. } => FilterKind::BoolValue,
            SubfieldFilter::BigintRange(_) => FilterKind::BigintRange,
            SubfieldFilter::BigintValuesUsingBitmask { .. } => {
                FilterKind::BigintValuesUsingBitmask
            }
            SubfieldFilter::BigintValuesUsingHashTable { .. } => {
                FilterKind::BigintValuesUsingHashTable
            }
            SubfieldFilter::BigintMultiRange { .. } => FilterKind::BigintMultiRange,
            SubfieldFilter::FloatRange(_) => FilterKind::FloatRange,
            SubfieldFilter::DoubleRange(_) => FilterKind::DoubleRange,
            SubfieldFilter::BytesRange(_) => FilterKind::BytesRange,
            SubfieldFilter::BytesValues { .. } => FilterKind::BytesValues,
            SubfieldFilter::MultiRange { .. } => FilterKind::MultiRange,
        }
    }
}

/// Build an integer value-set filter.
///
/// A single value degenerates to a point range. For more values the
/// representation is chosen by the span of the set: a dense set becomes a
/// bitmask, a sparse one a hash table.
pub fn create_bigint_values(values: Vec<i64>, null_allowed: bool) -> SubfieldFilter {
    debug_assert!(!values.is_empty(), "value set filter requires at least one value");
    if values.len() == 1 {
        return SubfieldFilter::BigintRange(BigintRange::point(values[0], null_allowed));
    }

    let mut min = values[0];
    let mut max = values[0];
    for &value in &values {
        min = min.min(value);
        max = max.max(value);
    }

    let span = (max as i128) - (min as i128);
    if span > 100 * values.len() as i128 {
        SubfieldFilter::BigintValuesUsingHashTable {
            min,
            max,
            values,
            null_allowed,
        }
    } else {
        SubfieldFilter::BigintValuesUsingBitmask {
            min,
            max,
            values,
            null_allowed,
        }
    }
}

/// Build a floating-point value-set filter.
///
/// There is no dedicated double value-set primitive, so the set becomes a
/// disjunction of point ranges.
pub fn create_double_values(values: Vec<f64>, null_allowed: bool) -> SubfieldFilter {
    debug_assert!(!values.is_empty(), "value set filter requires at least one value");
    if values.len() == 1 {
        return SubfieldFilter::DoubleRange(DoubleRange::point(values[0], null_allowed));
    }
    SubfieldFilter::MultiRange {
        ranges: values
            .into_iter()
            .map(|v| SubfieldFilter::DoubleRange(DoubleRange::point(v, null_allowed)))
            .collect(),
        null_allowed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_value_becomes_point_range() {
        let filter = create_bigint_values(vec![42], true);
        assert_eq!(filter, SubfieldFilter::BigintRange(BigintRange::point(42, true)));
    }

    #[test]
    fn test_dense_values_use_bitmask() {
        let filter = create_bigint_values(vec![1, 2, 3], false);
        assert_eq!(filter.kind(), FilterKind::BigintValuesUsingBitmask);
        if let SubfieldFilter::BigintValuesUsingBitmask { min, max, .. } = filter {
            assert_eq!((min, max), (1, 3));
        }
    }

    #[test]
    fn test_sparse_values_use_hash_table() {
        let filter = create_bigint_values(vec![1, 1_000_000], true);
        assert_eq!(filter.kind(), FilterKind::BigintValuesUsingHashTable);
    }

    #[test]
    fn test_sparse_detection_survives_extreme_bounds() {
        let filter = create_bigint_values(vec![i64::MIN, i64::MAX], true);
        assert_eq!(filter.kind(), FilterKind::BigintValuesUsingHashTable);
    }

    #[test]
    fn test_double_values_lower_to_point_ranges() {
        let filter = create_double_values(vec![1.5, 2.5], true);
        let SubfieldFilter::MultiRange { ranges, null_allowed } = filter else {
            panic!("expected MultiRange");
        };
        assert!(null_allowed);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].kind(), FilterKind::DoubleRange);
    }
}
