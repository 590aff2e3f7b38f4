//! Substrait type and schema parsing.

use crate::error::ConvertError;
use substrait::proto;
use vexec_core::types::{RowType, TypeKind};

/// Map a Substrait type to the engine's scalar type tag.
pub fn parse_type(ty: &proto::Type) -> Result<TypeKind, ConvertError> {
    use substrait::proto::r#type::Kind;

    let kind = ty
        .kind
        .as_ref()
        .ok_or_else(|| ConvertError::InvalidPlan("type without a kind".into()))?;
    match kind {
        Kind::Bool(_) => Ok(TypeKind::Boolean),
        Kind::I32(_) => Ok(TypeKind::Integer),
        Kind::I64(_) => Ok(TypeKind::Bigint),
        Kind::Fp32(_) => Ok(TypeKind::Real),
        Kind::Fp64(_) => Ok(TypeKind::Double),
        Kind::String(_) | Kind::Varchar(_) => Ok(TypeKind::Varchar),
        Kind::List(_) => Ok(TypeKind::Array),
        other => Err(ConvertError::NotImplemented(format!(
            "substrait type {:?}",
            other
        ))),
    }
}

/// Parse a `NamedStruct` base schema into a row type.
pub fn parse_named_struct(named: &proto::NamedStruct) -> Result<RowType, ConvertError> {
    let names = named.names.clone();
    let kinds = match &named.r#struct {
        Some(fields) => fields
            .types
            .iter()
            .map(parse_type)
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    if names.len() != kinds.len() {
        return Err(ConvertError::InvalidPlan(format!(
            "named struct declares {} names for {} types",
            names.len(),
            kinds.len()
        )));
    }
    Ok(RowType::new(names, kinds))
}
