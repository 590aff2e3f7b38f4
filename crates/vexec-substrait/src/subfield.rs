//! Lowering of column constraints into subfield filter primitives.
//!
//! Each initialized [`FilterInfo`] becomes exactly one filter primitive:
//! a value set, a not-equal pair of half-open ranges, a bare null check, or
//! one/many bounded ranges. Multi-range primitives are disjunctions, which
//! is why the accumulator only ever produces several ranges for a single
//! `or` (or a not-equal); the separation step keeps everything else out.

use crate::error::ConvertError;
use crate::filter_info::FilterInfo;
use std::collections::HashMap;
use vexec_core::connector::FileFormat;
use vexec_core::filter::{
    create_bigint_values, create_double_values, BigintRange, BytesRange, DoubleRange,
    FilterKind, Subfield, SubfieldFilter, SubfieldFilters,
};
use vexec_core::types::{RowType, TypeKind};
use vexec_core::variant::Variant;

/// Lower the accumulated constraints into the scan's pushdown set.
///
/// Columns with no constraints are skipped; a constrained column whose type
/// has no filter primitive is an error.
pub(crate) fn build_subfield_filters(
    infos: &HashMap<usize, FilterInfo>,
    row: &RowType,
) -> Result<SubfieldFilters, ConvertError> {
    let mut filters = SubfieldFilters::new();
    for column in 0..row.size() {
        let Some(info) = infos.get(&column) else {
            continue;
        };
        if !info.is_initialized() {
            continue;
        }
        let kind = row.kind_of(column).unwrap_or(TypeKind::Unknown);
        let filter = match kind {
            TypeKind::Integer | TypeKind::Bigint => construct_bigint_filter(info)?,
            TypeKind::Double => construct_double_filter(info)?,
            TypeKind::Varchar => construct_bytes_filter(info)?,
            other => {
                return Err(ConvertError::NotImplemented(format!(
                    "subfield filters are not supported for {} columns",
                    other
                )))
            }
        };
        // AlwaysTrue means the constraints cancelled out to "no restriction";
        // such a column gets no entry in the pushdown set.
        if matches!(filter, SubfieldFilter::AlwaysTrue) {
            continue;
        }
        let name = row.name_of(column).unwrap_or_default();
        filters.insert(Subfield::new(name), filter);
    }
    Ok(filters)
}

/// Whether a scan of the given format can evaluate every produced filter.
///
/// Parquet readers only understand single ranges and value sets; everything
/// else forces the whole conjunction back above the scan. All other formats
/// evaluate the full filter vocabulary.
pub fn is_pushdown_supported(format: FileFormat, filters: &SubfieldFilters) -> bool {
    match format {
        FileFormat::Parquet => filters.values().all(|filter| {
            matches!(
                filter.kind(),
                FilterKind::BigintRange
                    | FilterKind::DoubleRange
                    | FilterKind::BytesValues
                    | FilterKind::BytesRange
                    | FilterKind::BigintValuesUsingBitmask
                    | FilterKind::BigintValuesUsingHashTable
            )
        }),
        _ => true,
    }
}

fn bigint_of(value: &Variant) -> Result<i64, ConvertError> {
    value.as_bigint().ok_or_else(|| {
        ConvertError::UnsupportedExpression(format!(
            "{} value in an integer filter",
            value.kind()
        ))
    })
}

fn double_of(value: &Variant) -> Result<f64, ConvertError> {
    value.as_double().ok_or_else(|| {
        ConvertError::UnsupportedExpression(format!(
            "{} value in a double filter",
            value.kind()
        ))
    })
}

fn utf8_of(value: &Variant) -> Result<String, ConvertError> {
    value.as_utf8().map(str::to_string).ok_or_else(|| {
        ConvertError::UnsupportedExpression(format!(
            "{} value in a string filter",
            value.kind()
        ))
    })
}

fn assert_exclusive_constraints(info: &FilterInfo, what: &str) {
    let range_count = info.lower_bounds.len().max(info.upper_bounds.len());
    assert_eq!(
        range_count, 0,
        "range bounds cannot coexist with {} on one column",
        what
    );
}

fn construct_bigint_filter(info: &FilterInfo) -> Result<SubfieldFilter, ConvertError> {
    let null_allowed = info.null_allowed;

    if !info.values.is_empty() {
        assert_exclusive_constraints(info, "an IN filter");
        assert!(
            info.not_value.is_none(),
            "not-equal cannot coexist with an IN filter on one column"
        );
        let values = info
            .values
            .iter()
            .map(bigint_of)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(create_bigint_values(values, null_allowed));
    }

    if let Some(not_value) = &info.not_value {
        assert_exclusive_constraints(info, "a not-equal filter");
        let value = bigint_of(not_value)?;
        // (col < v) OR (col > v), in ascending range order.
        return Ok(SubfieldFilter::BigintMultiRange {
            ranges: vec![
                BigintRange {
                    lower: i64::MIN,
                    lower_unbounded: true,
                    lower_exclusive: false,
                    upper: value,
                    upper_unbounded: false,
                    upper_exclusive: true,
                    null_allowed,
                },
                BigintRange {
                    lower: value,
                    lower_unbounded: false,
                    lower_exclusive: true,
                    upper: i64::MAX,
                    upper_unbounded: true,
                    upper_exclusive: false,
                    null_allowed,
                },
            ],
            null_allowed,
        });
    }

    let range_count = info.lower_bounds.len().max(info.upper_bounds.len());
    if range_count == 0 {
        return Ok(if null_allowed {
            SubfieldFilter::AlwaysTrue
        } else {
            SubfieldFilter::IsNotNull
        });
    }

    let mut ranges = Vec::with_capacity(range_count);
    for index in 0..range_count {
        let mut range = BigintRange {
            lower: i64::MIN,
            lower_unbounded: true,
            lower_exclusive: false,
            upper: i64::MAX,
            upper_unbounded: true,
            upper_exclusive: false,
            null_allowed,
        };
        if let Some(Some(bound)) = info.lower_bounds.get(index) {
            range.lower = bigint_of(bound)?;
            range.lower_unbounded = false;
            range.lower_exclusive = info.lower_exclusives[index];
        }
        if let Some(Some(bound)) = info.upper_bounds.get(index) {
            range.upper = bigint_of(bound)?;
            range.upper_unbounded = false;
            range.upper_exclusive = info.upper_exclusives[index];
        }
        ranges.push(range);
    }

    if ranges.len() == 1 {
        Ok(SubfieldFilter::BigintRange(ranges.remove(0)))
    } else {
        Ok(SubfieldFilter::BigintMultiRange {
            ranges,
            null_allowed,
        })
    }
}

fn construct_double_filter(info: &FilterInfo) -> Result<SubfieldFilter, ConvertError> {
    let null_allowed = info.null_allowed;

    if !info.values.is_empty() {
        assert_exclusive_constraints(info, "an IN filter");
        assert!(
            info.not_value.is_none(),
            "not-equal cannot coexist with an IN filter on one column"
        );
        let values = info
            .values
            .iter()
            .map(double_of)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(create_double_values(values, null_allowed));
    }

    if let Some(not_value) = &info.not_value {
        assert_exclusive_constraints(info, "a not-equal filter");
        let value = double_of(not_value)?;
        return Ok(SubfieldFilter::MultiRange {
            ranges: vec![
                SubfieldFilter::DoubleRange(DoubleRange {
                    lower: f64::MIN,
                    lower_unbounded: true,
                    lower_exclusive: false,
                    upper: value,
                    upper_unbounded: false,
                    upper_exclusive: true,
                    null_allowed,
                }),
                SubfieldFilter::DoubleRange(DoubleRange {
                    lower: value,
                    lower_unbounded: false,
                    lower_exclusive: true,
                    upper: f64::MAX,
                    upper_unbounded: true,
                    upper_exclusive: false,
                    null_allowed,
                }),
            ],
            null_allowed,
        });
    }

    let range_count = info.lower_bounds.len().max(info.upper_bounds.len());
    if range_count == 0 {
        return Ok(if null_allowed {
            SubfieldFilter::AlwaysTrue
        } else {
            SubfieldFilter::IsNotNull
        });
    }

    let mut ranges = Vec::with_capacity(range_count);
    for index in 0..range_count {
        let mut range = DoubleRange {
            lower: f64::MIN,
            lower_unbounded: true,
            lower_exclusive: false,
            upper: f64::MAX,
            upper_unbounded: true,
            upper_exclusive: false,
            null_allowed,
        };
        if let Some(Some(bound)) = info.lower_bounds.get(index) {
            range.lower = double_of(bound)?;
            range.lower_unbounded = false;
            range.lower_exclusive = info.lower_exclusives[index];
        }
        if let Some(Some(bound)) = info.upper_bounds.get(index) {
            range.upper = double_of(bound)?;
            range.upper_unbounded = false;
            range.upper_exclusive = info.upper_exclusives[index];
        }
        ranges.push(SubfieldFilter::DoubleRange(range));
    }

    if ranges.len() == 1 {
        Ok(ranges.remove(0))
    } else {
        Ok(SubfieldFilter::MultiRange {
            ranges,
            null_allowed,
        })
    }
}

fn construct_bytes_filter(info: &FilterInfo) -> Result<SubfieldFilter, ConvertError> {
    let null_allowed = info.null_allowed;

    if !info.values.is_empty() {
        assert_exclusive_constraints(info, "an IN filter");
        assert!(
            info.not_value.is_none(),
            "not-equal cannot coexist with an IN filter on one column"
        );
        let values = info
            .values
            .iter()
            .map(utf8_of)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(SubfieldFilter::BytesValues {
            values,
            null_allowed,
        });
    }

    if let Some(not_value) = &info.not_value {
        assert_exclusive_constraints(info, "a not-equal filter");
        let value = utf8_of(not_value)?;
        return Ok(SubfieldFilter::MultiRange {
            ranges: vec![
                SubfieldFilter::BytesRange(BytesRange {
                    lower: String::new(),
                    lower_unbounded: true,
                    lower_exclusive: false,
                    upper: value.clone(),
                    upper_unbounded: false,
                    upper_exclusive: true,
                    null_allowed,
                }),
                SubfieldFilter::BytesRange(BytesRange {
                    lower: value,
                    lower_unbounded: false,
                    lower_exclusive: true,
                    upper: String::new(),
                    upper_unbounded: true,
                    upper_exclusive: false,
                    null_allowed,
                }),
            ],
            null_allowed,
        });
    }

    let range_count = info.lower_bounds.len().max(info.upper_bounds.len());
    if range_count == 0 {
        return Ok(if null_allowed {
            SubfieldFilter::AlwaysTrue
        } else {
            SubfieldFilter::IsNotNull
        });
    }

    let mut ranges = Vec::with_capacity(range_count);
    for index in 0..range_count {
        let mut range = BytesRange {
            lower: String::new(),
            lower_unbounded: true,
            lower_exclusive: false,
            upper: String::new(),
            upper_unbounded: true,
            upper_exclusive: false,
            null_allowed,
        };
        if let Some(Some(bound)) = info.lower_bounds.get(index) {
            range.lower = utf8_of(bound)?;
            range.lower_unbounded = false;
            range.lower_exclusive = info.lower_exclusives[index];
        }
        if let Some(Some(bound)) = info.upper_bounds.get(index) {
            range.upper = utf8_of(bound)?;
            range.upper_unbounded = false;
            range.upper_exclusive = info.upper_exclusives[index];
        }
        ranges.push(SubfieldFilter::BytesRange(range));
    }

    if ranges.len() == 1 {
        Ok(ranges.remove(0))
    } else {
        Ok(SubfieldFilter::MultiRange {
            ranges,
            null_allowed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_equal_builds_two_half_open_ranges() {
        let mut info = FilterInfo::default();
        info.set_not_value(Some(Variant::I64(5)));
        let filter = construct_bigint_filter(&info).unwrap();
        let SubfieldFilter::BigintMultiRange { ranges, null_allowed } = filter else {
            panic!("expected BigintMultiRange");
        };
        assert!(null_allowed);
        assert_eq!(ranges.len(), 2);
        assert!(ranges[0].lower_unbounded);
        assert_eq!(ranges[0].upper, 5);
        assert!(ranges[0].upper_exclusive);
        assert_eq!(ranges[1].lower, 5);
        assert!(ranges[1].lower_exclusive);
        assert!(ranges[1].upper_unbounded);
    }

    #[test]
    fn test_pure_null_constraint_builds_is_not_null() {
        let mut info = FilterInfo::default();
        info.forbid_null();
        let filter = construct_bigint_filter(&info).unwrap();
        assert_eq!(filter, SubfieldFilter::IsNotNull);
    }

    #[test]
    fn test_single_range_is_not_wrapped() {
        let mut info = FilterInfo::default();
        info.set_lower(Some(Variant::I64(10)), false);
        info.set_upper(Some(Variant::I64(100)), true);
        let filter = construct_bigint_filter(&info).unwrap();
        assert_eq!(
            filter,
            SubfieldFilter::BigintRange(BigintRange {
                lower: 10,
                lower_unbounded: false,
                lower_exclusive: false,
                upper: 100,
                upper_unbounded: false,
                upper_exclusive: true,
                null_allowed: true,
            })
        );
    }

    #[test]
    fn test_disjunct_bounds_wrap_into_multi_range() {
        let mut info = FilterInfo::default();
        info.set_lower(Some(Variant::I64(1)), false);
        info.set_upper(Some(Variant::I64(1)), false);
        info.set_lower(Some(Variant::I64(5)), false);
        info.set_upper(Some(Variant::I64(5)), false);
        let filter = construct_bigint_filter(&info).unwrap();
        let SubfieldFilter::BigintMultiRange { ranges, .. } = filter else {
            panic!("expected BigintMultiRange");
        };
        assert_eq!(ranges.len(), 2);
        assert_eq!((ranges[0].lower, ranges[0].upper), (1, 1));
        assert_eq!((ranges[1].lower, ranges[1].upper), (5, 5));
    }

    #[test]
    fn test_bytes_range_flags_unbounded_sides() {
        let mut info = FilterInfo::default();
        info.set_lower(Some(Variant::Utf8("m".into())), true);
        let filter = construct_bytes_filter(&info).unwrap();
        let SubfieldFilter::BytesRange(range) = filter else {
            panic!("expected BytesRange");
        };
        assert_eq!(range.lower, "m");
        assert!(range.lower_exclusive);
        assert!(range.upper_unbounded);
        assert_eq!(range.upper, "");
    }

    #[test]
    fn test_parquet_rejects_multi_range() {
        let mut filters = SubfieldFilters::new();
        filters.insert(Subfield::new("c0"), SubfieldFilter::IsNotNull);
        assert!(!is_pushdown_supported(FileFormat::Parquet, &filters));
        assert!(is_pushdown_supported(FileFormat::Dwrf, &filters));
    }
}
