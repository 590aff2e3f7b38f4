//! Scan filter analysis: what can the reader evaluate itself?
//!
//! A `ReadRel` filter is assumed to be a boolean conjunction. Analysis runs
//! in four steps:
//!
//! 1. **Flatten**: nested `and` calls are flattened into a list of leaves.
//!    Leaves that are not scalar calls (bare literals, boolean columns)
//!    bypass classification and become residuals verbatim.
//! 2. **Separate**: each scalar-call leaf is classified as a pushdown
//!    candidate or a residual, per the eligibility rules below.
//! 3. **Accumulate + lower**: candidates fold into per-column
//!    [`FilterInfo`](crate::filter_info::FilterInfo) records, which lower
//!    into typed subfield filter primitives.
//! 4. **Format veto**: if the scan's file format cannot evaluate one of
//!    the produced primitives, pushdown is abandoned wholesale and the
//!    entire original conjunction becomes the residual.
//!
//! Eligibility in short: a supported comparison over a field (optionally
//! with one literal) can be pushed; `not` only over a comparison; `or` only
//! when every branch lands on the same column. A column constrained by `in`
//! accepts only further `in`/`is_not_null` constraints; ranges on it stay
//! residual, because value sets and ranges cannot be combined under the
//! disjunctive multi-range representation.

use crate::error::ConvertError;
use crate::expr::ExprConverter;
use crate::filter_info::accumulate_filter_info;
use crate::functions::FunctionRegistry;
use crate::subfield::{build_subfield_filters, is_pushdown_supported};
use std::collections::HashSet;
use substrait::proto;
use substrait::proto::expression::literal::LiteralType;
use substrait::proto::expression::{RexType, ScalarFunction};
use substrait::proto::function_argument::ArgType;
use tracing::debug;
use vexec_core::connector::FileFormat;
use vexec_core::expr::TypedExpr;
use vexec_core::filter::SubfieldFilters;
use vexec_core::types::{RowType, TypeKind};

pub(crate) const AND: &str = "and";
pub(crate) const OR: &str = "or";
pub(crate) const NOT: &str = "not";
pub(crate) const IN: &str = "in";
pub(crate) const IS_NOT_NULL: &str = "is_not_null";
pub(crate) const GTE: &str = "gte";
pub(crate) const GT: &str = "gt";
pub(crate) const LTE: &str = "lte";
pub(crate) const LT: &str = "lt";
pub(crate) const EQUAL: &str = "equal";

const I32_TAG: &str = "i32";
const I64_TAG: &str = "i64";

/// Comparisons the accumulator knows how to fold.
const SUPPORTED_COMMON: [&str; 7] = [IS_NOT_NULL, GTE, GT, LTE, LT, EQUAL, IN];
/// Comparisons that may appear under `not`.
const SUPPORTED_UNDER_NOT: [&str; 5] = [GTE, GT, LTE, LT, EQUAL];

/// What scan filter analysis produced for one `ReadRel`.
#[derive(Debug, Default)]
pub struct FilterAnalysis {
    /// Column -> filter primitive, for the scan reader.
    pub subfield_filters: SubfieldFilters,
    /// The conjunction of everything that could not be pushed, or `None`.
    pub remaining_filter: Option<TypedExpr>,
}

/// One conjunct of a flattened scan filter.
#[derive(Debug, Clone)]
pub(crate) enum FilterLeaf {
    /// A scalar function call, subject to classification.
    Call(ScalarFunction),
    /// Any other expression; passed through as a residual untouched.
    Opaque(proto::Expression),
}

impl FilterLeaf {
    fn to_expression(&self) -> proto::Expression {
        match self {
            FilterLeaf::Call(function) => proto::Expression {
                rex_type: Some(RexType::ScalarFunction(function.clone())),
            },
            FilterLeaf::Opaque(expression) => expression.clone(),
        }
    }
}

/// Analyze the filter of one scan.
pub fn analyze_scan_filter(
    filter: &proto::Expression,
    row: &RowType,
    format: FileFormat,
    exprs: &ExprConverter,
) -> Result<FilterAnalysis, ConvertError> {
    let registry = exprs.functions();

    let mut leaves = Vec::new();
    flatten_conjunction(filter, registry, &mut leaves)?;
    debug!(leaves = leaves.len(), "flattened scan filter conjunction");

    let (candidates, residuals) = separate_filters(&leaves, registry)?;
    debug!(
        pushdown = candidates.len(),
        residual = residuals.len(),
        "separated scan filter"
    );

    let infos = accumulate_filter_info(&candidates, row, registry)?;
    let mut subfield_filters = build_subfield_filters(&infos, row)?;

    let residual_leaves: Vec<FilterLeaf>;
    if !is_pushdown_supported(format, &subfield_filters) {
        // All-or-nothing: the format cannot evaluate one of the produced
        // primitives, so the whole original conjunction stays above the scan.
        debug!(%format, "scan format vetoed pushdown; reverting to a residual conjunction");
        subfield_filters.clear();
        residual_leaves = leaves;
    } else {
        residual_leaves = residuals;
    }

    let remaining_filter = connect_with_and(&residual_leaves, row, exprs)?;
    Ok(FilterAnalysis {
        subfield_filters,
        remaining_filter,
    })
}

/// Flatten nested `and` calls into a list of conjunct leaves.
pub(crate) fn flatten_conjunction(
    expression: &proto::Expression,
    registry: &FunctionRegistry,
    leaves: &mut Vec<FilterLeaf>,
) -> Result<(), ConvertError> {
    match &expression.rex_type {
        Some(RexType::ScalarFunction(function)) => {
            if registry.base_name(function.function_reference)? == AND {
                for argument in &function.arguments {
                    match &argument.arg_type {
                        Some(ArgType::Value(child)) => {
                            flatten_conjunction(child, registry, leaves)?
                        }
                        _ => {
                            return Err(ConvertError::InvalidPlan(
                                "non-expression argument in an and call".into(),
                            ))
                        }
                    }
                }
            } else {
                leaves.push(FilterLeaf::Call(function.clone()));
            }
        }
        Some(_) => leaves.push(FilterLeaf::Opaque(expression.clone())),
        None => {
            return Err(ConvertError::InvalidPlan(
                "filter expression without rex_type".into(),
            ))
        }
    }
    Ok(())
}

/// Partition leaves into pushdown candidates and residuals.
pub(crate) fn separate_filters(
    leaves: &[FilterLeaf],
    registry: &FunctionRegistry,
) -> Result<(Vec<ScalarFunction>, Vec<FilterLeaf>), ConvertError> {
    // Columns already claimed by an IN condition: ranges and equalities on
    // them cannot be combined with the value set and must stay residual.
    let in_columns = in_column_indices(leaves, registry)?;
    let mut not_equal_columns = HashSet::new();
    let mut in_claimed = HashSet::new();

    let mut candidates = Vec::new();
    let mut residuals = Vec::new();
    for leaf in leaves {
        let FilterLeaf::Call(function) = leaf else {
            residuals.push(leaf.clone());
            continue;
        };
        let name = registry.base_name(function.function_reference)?;
        let eligible = match name {
            NOT => can_push_not(function, registry, &in_columns, &mut not_equal_columns)?,
            OR => can_push_or(function, registry, &in_columns)?,
            IN => {
                // A second IN on the same column would overwrite the first;
                // only one value set per column is representable.
                match in_shape_column(function) {
                    Some(column) => in_claimed.insert(column),
                    None => false,
                }
            }
            _ => can_push_common(function, name, &in_columns)?,
        };
        if eligible {
            candidates.push(function.clone());
        } else {
            debug!(function = name, "filter leaf is not eligible for pushdown");
            residuals.push(leaf.clone());
        }
    }
    Ok((candidates, residuals))
}

/// The value-expression arguments of a scalar call.
pub(crate) fn value_arguments(
    function: &ScalarFunction,
) -> impl Iterator<Item = &proto::Expression> {
    function.arguments.iter().filter_map(|argument| match &argument.arg_type {
        Some(ArgType::Value(expression)) => Some(expression),
        _ => None,
    })
}

/// The scalar-call children of a call (e.g. the branches of an `or`).
pub(crate) fn scalar_children(
    function: &ScalarFunction,
) -> impl Iterator<Item = &ScalarFunction> {
    value_arguments(function).filter_map(|expression| match &expression.rex_type {
        Some(RexType::ScalarFunction(child)) => Some(child),
        _ => None,
    })
}

/// Shape of an eligible comparison: one field reference, at most one
/// literal, in either order.
pub(crate) struct FieldLiteral<'a> {
    pub field_index: usize,
    pub literal: Option<&'a proto::expression::Literal>,
    pub literal_first: bool,
}

/// Match a call against the field / field-with-literal shape.
///
/// Returns `None` for anything else (two literals, nested calls, masked
/// references); those leaves are simply not eligible.
pub(crate) fn field_or_literal(function: &ScalarFunction) -> Option<FieldLiteral<'_>> {
    let arguments: Vec<_> = value_arguments(function).collect();
    match arguments.as_slice() {
        [only] => match &only.rex_type {
            Some(RexType::Selection(reference)) => {
                let field_index = crate::expr::parse_reference_segment(reference).ok()?;
                Some(FieldLiteral {
                    field_index,
                    literal: None,
                    literal_first: false,
                })
            }
            _ => None,
        },
        [first, second] => {
            let mut field_index = None;
            let mut literal = None;
            let mut literal_first = false;
            for (position, argument) in [first, second].into_iter().enumerate() {
                match &argument.rex_type {
                    Some(RexType::Selection(reference)) => {
                        field_index =
                            Some(crate::expr::parse_reference_segment(reference).ok()?);
                    }
                    Some(RexType::Literal(value)) => {
                        literal = Some(value);
                        literal_first = position == 0;
                    }
                    _ => return None,
                }
            }
            Some(FieldLiteral {
                field_index: field_index?,
                literal: Some(literal?),
                literal_first,
            })
        }
        _ => None,
    }
}

/// Whether every scalar-call child references the same column.
fn children_on_same_field(function: &ScalarFunction) -> bool {
    let mut columns = Vec::new();
    for argument in value_arguments(function) {
        let Some(RexType::ScalarFunction(child)) = &argument.rex_type else {
            return false;
        };
        for parameter in value_arguments(child) {
            if let Some(RexType::Selection(reference)) = &parameter.rex_type {
                match crate::expr::parse_reference_segment(reference) {
                    Ok(index) => columns.push(index),
                    Err(_) => return false,
                }
            }
        }
    }
    columns.windows(2).all(|pair| pair[0] == pair[1])
}

/// Column index of a well-shaped `in(field, [literals])`, `None` otherwise.
fn in_shape_column(function: &ScalarFunction) -> Option<usize> {
    let arguments: Vec<_> = value_arguments(function).collect();
    let [field, list] = arguments.as_slice() else {
        return None;
    };
    let Some(RexType::Selection(reference)) = &field.rex_type else {
        return None;
    };
    let Some(RexType::Literal(literal)) = &list.rex_type else {
        return None;
    };
    if !matches!(literal.literal_type, Some(LiteralType::List(_))) {
        return None;
    }
    crate::expr::parse_reference_segment(reference).ok()
}

/// Columns constrained by any well-shaped `in` leaf of the conjunction.
fn in_column_indices(
    leaves: &[FilterLeaf],
    registry: &FunctionRegistry,
) -> Result<HashSet<usize>, ConvertError> {
    let mut columns = HashSet::new();
    for leaf in leaves {
        let FilterLeaf::Call(function) = leaf else {
            continue;
        };
        if registry.base_name(function.function_reference)? == IN {
            if let Some(column) = in_shape_column(function) {
                columns.insert(column);
            }
        }
    }
    Ok(columns)
}

/// Eligibility of a plain comparison leaf.
fn can_push_common(
    function: &ScalarFunction,
    name: &str,
    in_columns: &HashSet<usize>,
) -> Result<bool, ConvertError> {
    if !SUPPORTED_COMMON.contains(&name) {
        return Ok(false);
    }
    let Some(shape) = field_or_literal(function) else {
        return Ok(false);
    };
    if !in_columns.contains(&shape.field_index) {
        return Ok(true);
    }
    // Only a null check may join an IN-constrained column.
    Ok(name == IS_NOT_NULL)
}

/// Eligibility of `not(child)`.
///
/// Only a single comparison may sit under the `not`, and at most one
/// `not(equal)` per column: the conjunction of two would need intersecting
/// multi-ranges, which the disjunctive representation cannot express.
fn can_push_not(
    function: &ScalarFunction,
    registry: &FunctionRegistry,
    in_columns: &HashSet<usize>,
    not_equal_columns: &mut HashSet<usize>,
) -> Result<bool, ConvertError> {
    let arguments: Vec<_> = value_arguments(function).collect();
    let [child] = arguments.as_slice() else {
        return Ok(false);
    };
    let Some(RexType::ScalarFunction(inner)) = &child.rex_type else {
        // `not` over a boolean literal could only be pushed as an
        // always-true / always-false range, which is not produced here.
        return Ok(false);
    };

    let inner_name = registry.base_name(inner.function_reference)?;
    if !SUPPORTED_UNDER_NOT.contains(&inner_name) {
        return Ok(false);
    }
    let Some(shape) = field_or_literal(inner) else {
        return Ok(false);
    };
    if in_columns.contains(&shape.field_index) {
        return Ok(false);
    }
    if inner_name == EQUAL && !not_equal_columns.insert(shape.field_index) {
        return Ok(false);
    }
    Ok(true)
}

/// Eligibility of `or(a, b, ...)`.
fn can_push_or(
    function: &ScalarFunction,
    registry: &FunctionRegistry,
    in_columns: &HashSet<usize>,
) -> Result<bool, ConvertError> {
    if !children_on_same_field(function) {
        return Ok(false);
    }

    let mut in_exists = false;
    for child in value_arguments(function) {
        let Some(RexType::ScalarFunction(inner)) = &child.rex_type else {
            return Ok(false);
        };
        let inner_name = registry.base_name(inner.function_reference)?;
        if !SUPPORTED_COMMON.contains(&inner_name) {
            return Ok(false);
        }
        let Some(shape) = field_or_literal(inner) else {
            return Ok(false);
        };
        if in_columns.contains(&shape.field_index) {
            return Ok(false);
        }

        if inner_name == IN || inner_name == IS_NOT_NULL {
            // An integer value set lowers to a bitmask or hash table, and
            // those cannot be members of a disjunctive multi-range.
            let types = registry.signature_types(inner.function_reference)?;
            if types.contains(&I32_TAG) || types.contains(&I64_TAG) {
                return Ok(false);
            }
            if inner_name == IN {
                if in_exists {
                    return Ok(false);
                }
                in_exists = true;
            }
        }
    }
    Ok(true)
}

/// Join residual leaves into one left-deep `and` expression.
pub(crate) fn connect_with_and(
    leaves: &[FilterLeaf],
    row: &RowType,
    exprs: &ExprConverter,
) -> Result<Option<TypedExpr>, ConvertError> {
    let mut residual: Option<TypedExpr> = None;
    for leaf in leaves {
        let translated = exprs.to_typed(&leaf.to_expression(), row)?;
        residual = Some(match residual {
            None => translated,
            Some(accumulated) => TypedExpr::Call {
                kind: TypeKind::Boolean,
                name: AND.to_string(),
                args: vec![accumulated, translated],
            },
        });
    }
    Ok(residual)
}
