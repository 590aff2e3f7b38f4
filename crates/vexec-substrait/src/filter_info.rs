//! Per-column constraint accumulation.
//!
//! Every pushdown candidate updates the [`FilterInfo`] of the column it
//! references. The bound lists are parallel: entry `i` of `lower_bounds`
//! pairs with entry `i` of `lower_exclusives`, and a disjunction (`or`)
//! contributes one list entry per branch. The accumulated record is lowered
//! into filter primitives by the [`subfield`](crate::subfield) module once
//! the whole conjunction has been walked.

use crate::error::ConvertError;
use crate::expr::{literal_variant, parse_reference_segment};
use crate::functions::FunctionRegistry;
use crate::pushdown::{
    field_or_literal, scalar_children, value_arguments, EQUAL, GT, GTE, IN, IS_NOT_NULL, LT,
    LTE, NOT, OR,
};
use std::collections::HashMap;
use substrait::proto;
use substrait::proto::expression::literal::LiteralType;
use substrait::proto::expression::{RexType, ScalarFunction};
use vexec_core::types::{RowType, TypeKind};
use vexec_core::variant::Variant;

/// Constraints accumulated for one input column.
///
/// Bounds are optional: a comparison without a literal contributes an
/// unbounded side. `null_allowed` starts `true` and only `is_not_null`
/// clears it.
#[derive(Debug, Clone)]
pub struct FilterInfo {
    pub lower_bounds: Vec<Option<Variant>>,
    pub lower_exclusives: Vec<bool>,
    pub upper_bounds: Vec<Option<Variant>>,
    pub upper_exclusives: Vec<bool>,
    /// The value of a single `NOT(col = literal)` clause.
    pub not_value: Option<Variant>,
    /// The value list of an `IN (...)` clause.
    pub values: Vec<Variant>,
    pub null_allowed: bool,
    initialized: bool,
}

impl Default for FilterInfo {
    fn default() -> Self {
        FilterInfo {
            lower_bounds: Vec::new(),
            lower_exclusives: Vec::new(),
            upper_bounds: Vec::new(),
            upper_exclusives: Vec::new(),
            not_value: None,
            values: Vec::new(),
            null_allowed: true,
            initialized: false,
        }
    }
}

impl FilterInfo {
    pub fn set_lower(&mut self, bound: Option<Variant>, exclusive: bool) {
        self.lower_bounds.push(bound);
        self.lower_exclusives.push(exclusive);
        self.initialized = true;
    }

    pub fn set_upper(&mut self, bound: Option<Variant>, exclusive: bool) {
        self.upper_bounds.push(bound);
        self.upper_exclusives.push(exclusive);
        self.initialized = true;
    }

    pub fn set_not_value(&mut self, value: Option<Variant>) {
        self.not_value = value;
        self.initialized = true;
    }

    pub fn set_values(&mut self, values: Vec<Variant>) {
        self.values = values;
        self.initialized = true;
    }

    pub fn forbid_null(&mut self) {
        self.null_allowed = false;
        self.initialized = true;
    }

    /// Whether any constraint has been recorded.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Fold the pushdown candidates into one `FilterInfo` per column index.
///
/// `not(child)` applies its child with the comparison reversed; the
/// branches of an `or` all land on the same column (the separation step
/// guarantees it) and each contributes one disjunct.
pub(crate) fn accumulate_filter_info(
    functions: &[ScalarFunction],
    row: &RowType,
    registry: &FunctionRegistry,
) -> Result<HashMap<usize, FilterInfo>, ConvertError> {
    let mut infos: HashMap<usize, FilterInfo> =
        (0..row.size()).map(|i| (i, FilterInfo::default())).collect();

    for function in functions {
        match registry.base_name(function.function_reference)? {
            NOT => {
                let child = not_child(function)?;
                apply_comparison(child, row, registry, true, &mut infos)?;
            }
            OR => {
                for child in scalar_children(function) {
                    apply_comparison(child, row, registry, false, &mut infos)?;
                }
            }
            _ => apply_comparison(function, row, registry, false, &mut infos)?,
        }
    }
    Ok(infos)
}

/// The single scalar-call child of a `not`.
fn not_child(function: &ScalarFunction) -> Result<&ScalarFunction, ConvertError> {
    let child = value_arguments(function)
        .next()
        .ok_or_else(|| ConvertError::InvalidPlan("not without an argument".into()))?;
    match &child.rex_type {
        Some(RexType::ScalarFunction(inner)) => Ok(inner),
        _ => Err(ConvertError::UnsupportedExpression(
            "not over a non-function expression".into(),
        )),
    }
}

/// Apply one comparison leaf to the constraint map. `reverse` flips the
/// comparison (the leaf sits under a `not`): `gte` contributes an upper
/// bound instead of a lower one, `equal` becomes a not-equal value.
fn apply_comparison(
    function: &ScalarFunction,
    row: &RowType,
    registry: &FunctionRegistry,
    reverse: bool,
    infos: &mut HashMap<usize, FilterInfo>,
) -> Result<(), ConvertError> {
    let mut name = registry.base_name(function.function_reference)?;
    if name == IN {
        return set_in_values(function, infos);
    }

    let Some(shape) = field_or_literal(function) else {
        return Err(ConvertError::UnsupportedExpression(
            "comparison arguments must be a field reference with an optional literal".into(),
        ));
    };
    if shape.literal_first {
        // `10 < c0` is `c0 > 10`: canonicalize to field-on-left.
        name = flip_comparison(name);
    }

    let kind = row.kind_of(shape.field_index).ok_or_else(|| {
        ConvertError::InvalidPlan(format!(
            "filter references column {} of a row with {} columns",
            shape.field_index,
            row.size()
        ))
    })?;
    let value = shape
        .literal
        .map(|literal| column_variant(literal, kind))
        .transpose()?;

    let info = infos.entry(shape.field_index).or_default();
    match name {
        IS_NOT_NULL => {
            if reverse {
                return Err(ConvertError::NotImplemented(
                    "reverse is not supported for is_not_null".into(),
                ));
            }
            info.forbid_null();
        }
        GTE => {
            if reverse {
                info.set_upper(value, true);
            } else {
                info.set_lower(value, false);
            }
        }
        GT => {
            if reverse {
                info.set_upper(value, false);
            } else {
                info.set_lower(value, true);
            }
        }
        LTE => {
            if reverse {
                info.set_lower(value, true);
            } else {
                info.set_upper(value, false);
            }
        }
        LT => {
            if reverse {
                info.set_lower(value, false);
            } else {
                info.set_upper(value, true);
            }
        }
        EQUAL => {
            if reverse {
                info.set_not_value(value);
            } else {
                info.set_lower(value.clone(), false);
                info.set_upper(value, false);
            }
        }
        other => {
            return Err(ConvertError::NotImplemented(format!(
                "filter function '{}'",
                other
            )))
        }
    }
    Ok(())
}

/// Record the value list of `in(col, [v, ...])`.
fn set_in_values(
    function: &ScalarFunction,
    infos: &mut HashMap<usize, FilterInfo>,
) -> Result<(), ConvertError> {
    let args: Vec<_> = value_arguments(function).collect();
    if args.len() != 2 {
        return Err(ConvertError::InvalidPlan(
            "two arguments are expected for the in filter".into(),
        ));
    }
    let column = match &args[0].rex_type {
        Some(RexType::Selection(reference)) => parse_reference_segment(reference)?,
        _ => {
            return Err(ConvertError::InvalidPlan(
                "a field reference is expected as the first in argument".into(),
            ))
        }
    };
    let values = match &args[1].rex_type {
        Some(RexType::Literal(literal)) => match &literal.literal_type {
            Some(LiteralType::List(list)) => list
                .values
                .iter()
                .map(literal_variant)
                .collect::<Result<Vec<_>, _>>()?,
            _ => {
                return Err(ConvertError::InvalidPlan(
                    "a literal list is expected as the second in argument".into(),
                ))
            }
        },
        _ => {
            return Err(ConvertError::InvalidPlan(
                "a literal list is expected as the second in argument".into(),
            ))
        }
    };
    infos.entry(column).or_default().set_values(values);
    Ok(())
}

/// Convert a comparison literal to the variant the column's type expects.
/// Comparisons never cross types; 32-bit integers widen to BIGINT.
fn column_variant(
    literal: &proto::expression::Literal,
    kind: TypeKind,
) -> Result<Variant, ConvertError> {
    let value = literal_variant(literal)?;
    match (kind, value) {
        (TypeKind::Integer, value @ Variant::I32(_)) => Ok(value),
        (TypeKind::Bigint, Variant::I32(v)) => Ok(Variant::I64(i64::from(v))),
        (TypeKind::Bigint, value @ Variant::I64(_)) => Ok(value),
        (TypeKind::Double, value @ Variant::F64(_)) => Ok(value),
        (TypeKind::Varchar, value @ Variant::Utf8(_)) => Ok(value),
        (
            TypeKind::Integer | TypeKind::Bigint | TypeKind::Double | TypeKind::Varchar,
            value,
        ) => Err(ConvertError::UnsupportedExpression(format!(
            "{} literal compared against a {} column",
            value.kind(),
            kind
        ))),
        (other, _) => Err(ConvertError::NotImplemented(format!(
            "subfield filters are not supported for {} columns",
            other
        ))),
    }
}

fn flip_comparison(name: &str) -> &str {
    match name {
        GTE => LTE,
        GT => LT,
        LTE => GTE,
        LT => GT,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_allowed_by_default() {
        let info = FilterInfo::default();
        assert!(info.null_allowed);
        assert!(!info.is_initialized());
    }

    #[test]
    fn test_bound_lists_stay_parallel() {
        let mut info = FilterInfo::default();
        info.set_lower(Some(Variant::I64(1)), false);
        info.set_lower(Some(Variant::I64(5)), true);
        assert_eq!(info.lower_bounds.len(), info.lower_exclusives.len());
        assert!(info.is_initialized());
    }

    #[test]
    fn test_forbid_null_initializes() {
        let mut info = FilterInfo::default();
        info.forbid_null();
        assert!(!info.null_allowed);
        assert!(info.is_initialized());
    }

    #[test]
    fn test_flip_comparison() {
        assert_eq!(flip_comparison(GTE), LTE);
        assert_eq!(flip_comparison(LT), GT);
        assert_eq!(flip_comparison(EQUAL), EQUAL);
    }
}
