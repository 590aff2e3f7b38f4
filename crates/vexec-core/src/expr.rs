//! Engine-native typed expressions.
//!
//! These are the expressions that land in plan nodes: filter predicates,
//! projection lists, join conditions, and aggregate calls. They are fully
//! resolved: field accesses carry the column index and type of the input
//! row they were bound against, and calls carry their result type.

use crate::types::TypeKind;
use crate::variant::Variant;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A resolved reference to one column of an input row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldAccess {
    pub name: String,
    pub index: usize,
    pub kind: TypeKind,
}

impl fmt::Display for FieldAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A typed scalar expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypedExpr {
    /// Reference to an input column.
    Field(FieldAccess),
    /// A constant literal.
    Constant { value: Variant },
    /// A named function call with a known result type.
    Call {
        kind: TypeKind,
        name: String,
        args: Vec<TypedExpr>,
    },
}

impl TypedExpr {
    pub fn kind(&self) -> TypeKind {
        match self {
            TypedExpr::Field(field) => field.kind,
            TypedExpr::Constant { value } => value.kind(),
            TypedExpr::Call { kind, .. } => *kind,
        }
    }
}

impl fmt::Display for TypedExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedExpr::Field(field) => write!(f, "{}", field),
            TypedExpr::Constant { value } => write!(f, "{}", value),
            TypedExpr::Call { name, args, .. } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}
