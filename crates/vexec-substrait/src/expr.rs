//! Substrait expression translation.
//!
//! Translates decoded Substrait expressions into engine-native typed
//! expressions. Field references resolve against the row type of the input
//! they are bound to, literals become tagged [`Variant`]s, and scalar
//! functions become calls named from the plan's function registry.

use crate::error::ConvertError;
use crate::functions::FunctionRegistry;
use crate::types::parse_type;
use ordered_float::OrderedFloat;
use substrait::proto;
use substrait::proto::expression::literal::LiteralType;
use substrait::proto::expression::{
    field_reference, reference_segment, FieldReference, RexType, ScalarFunction,
};
use substrait::proto::function_argument::ArgType;
use vexec_core::expr::{FieldAccess, TypedExpr};
use vexec_core::types::RowType;
use vexec_core::variant::Variant;

/// Translates Substrait expressions against a function registry.
#[derive(Debug, Default)]
pub struct ExprConverter {
    functions: FunctionRegistry,
}

impl ExprConverter {
    pub fn new(functions: FunctionRegistry) -> Self {
        ExprConverter { functions }
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Translate an expression bound against `row`.
    ///
    /// Fails with [`ConvertError::UnsupportedExpression`] for expression
    /// kinds the engine has no counterpart for.
    pub fn to_typed(
        &self,
        expr: &proto::Expression,
        row: &RowType,
    ) -> Result<TypedExpr, ConvertError> {
        match &expr.rex_type {
            Some(RexType::Selection(reference)) => {
                Ok(TypedExpr::Field(self.field_access(reference, row)?))
            }
            Some(RexType::Literal(literal)) => Ok(TypedExpr::Constant {
                value: literal_variant(literal)?,
            }),
            Some(RexType::ScalarFunction(function)) => self.call_from_function(function, row),
            Some(other) => Err(ConvertError::UnsupportedExpression(format!(
                "expression kind {:?}",
                other
            ))),
            None => Err(ConvertError::UnsupportedExpression(
                "expression without rex_type".into(),
            )),
        }
    }

    /// Resolve a field reference into a column of `row`.
    pub fn field_access(
        &self,
        reference: &FieldReference,
        row: &RowType,
    ) -> Result<FieldAccess, ConvertError> {
        let index = parse_reference_segment(reference)?;
        let kind = row.kind_of(index).ok_or_else(|| {
            ConvertError::InvalidPlan(format!(
                "field index {} out of range for a row of {} columns",
                index,
                row.size()
            ))
        })?;
        let name = row
            .name_of(index)
            .unwrap_or_default()
            .to_string();
        Ok(FieldAccess { name, index, kind })
    }

    /// Translate a scalar function call. The call's name comes from the
    /// registry (signature stripped) and its result type from the declared
    /// output type.
    pub fn call_from_function(
        &self,
        function: &ScalarFunction,
        row: &RowType,
    ) -> Result<TypedExpr, ConvertError> {
        let name = self
            .functions
            .base_name(function.function_reference)?
            .to_string();
        let mut args = Vec::with_capacity(function.arguments.len());
        for argument in &function.arguments {
            match &argument.arg_type {
                Some(ArgType::Value(value)) => args.push(self.to_typed(value, row)?),
                _ => {
                    return Err(ConvertError::UnsupportedExpression(format!(
                        "non-value argument of function '{}'",
                        name
                    )))
                }
            }
        }
        let kind = match &function.output_type {
            Some(ty) => parse_type(ty)?,
            None => {
                return Err(ConvertError::InvalidPlan(format!(
                    "scalar function '{}' without an output type",
                    name
                )))
            }
        };
        Ok(TypedExpr::Call { kind, name, args })
    }
}

/// Column index of a direct struct-field reference.
pub fn parse_reference_segment(reference: &FieldReference) -> Result<usize, ConvertError> {
    match &reference.reference_type {
        Some(field_reference::ReferenceType::DirectReference(segment)) => {
            match &segment.reference_type {
                Some(reference_segment::ReferenceType::StructField(field)) => {
                    if field.child.is_some() {
                        return Err(ConvertError::NotImplemented(
                            "nested field references".into(),
                        ));
                    }
                    Ok(field.field as usize)
                }
                _ => Err(ConvertError::UnsupportedExpression(
                    "reference segment is not a struct field".into(),
                )),
            }
        }
        _ => Err(ConvertError::UnsupportedExpression(
            "only direct field references are supported".into(),
        )),
    }
}

/// Convert a Substrait literal into a tagged variant, preserving its
/// declared type (i32, i64, fp64, string). List literals become arrays so
/// residual `IN` expressions stay translatable.
pub fn literal_variant(literal: &proto::expression::Literal) -> Result<Variant, ConvertError> {
    let literal_type = literal.literal_type.as_ref().ok_or_else(|| {
        ConvertError::UnsupportedExpression("literal without a literal_type".into())
    })?;
    match literal_type {
        LiteralType::Boolean(v) => Ok(Variant::Bool(*v)),
        LiteralType::I32(v) => Ok(Variant::I32(*v)),
        LiteralType::I64(v) => Ok(Variant::I64(*v)),
        LiteralType::Fp64(v) => Ok(Variant::F64(OrderedFloat(*v))),
        LiteralType::String(v) => Ok(Variant::Utf8(v.clone())),
        LiteralType::Null(_) => Ok(Variant::Null),
        LiteralType::List(list) => Ok(Variant::Array(
            list.values
                .iter()
                .map(literal_variant)
                .collect::<Result<Vec<_>, _>>()?,
        )),
        other => Err(ConvertError::UnsupportedExpression(format!(
            "literal kind {:?}",
            other
        ))),
    }
}
