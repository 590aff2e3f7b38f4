//! Tagged literal scalar values.

use crate::types::TypeKind;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal scalar value with its type tag.
///
/// Uses `OrderedFloat` for the double case so variants can serve as hash
/// map keys and participate in `Eq` comparisons, the same strategy the
/// engine uses everywhere a float must be hashable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(OrderedFloat<f64>),
    Utf8(String),
    /// A list of scalar values, e.g. the right-hand side of `IN`.
    Array(Vec<Variant>),
}

impl Variant {
    pub fn kind(&self) -> TypeKind {
        match self {
            Variant::Null => TypeKind::Unknown,
            Variant::Bool(_) => TypeKind::Boolean,
            Variant::I32(_) => TypeKind::Integer,
            Variant::I64(_) => TypeKind::Bigint,
            Variant::F64(_) => TypeKind::Double,
            Variant::Utf8(_) => TypeKind::Varchar,
            Variant::Array(_) => TypeKind::Array,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    /// The value as an `i64`, widening 32-bit integers.
    pub fn as_bigint(&self) -> Option<i64> {
        match self {
            Variant::I32(v) => Some(i64::from(*v)),
            Variant::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Variant::F64(v) => Some(v.into_inner()),
            _ => None,
        }
    }

    pub fn as_utf8(&self) -> Option<&str> {
        match self {
            Variant::Utf8(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Null => write!(f, "null"),
            Variant::Bool(v) => write!(f, "{}", v),
            Variant::I32(v) => write!(f, "{}", v),
            Variant::I64(v) => write!(f, "{}", v),
            Variant::F64(v) => write!(f, "{}", v),
            Variant::Utf8(v) => write!(f, "\"{}\"", v),
            Variant::Array(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}
