//! Scalar type tags and row schemas.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar type tag for a column or expression.
///
/// The converter only needs to distinguish the kinds that affect filter
/// primitive selection and vector materialization; there is no nested type
/// tree here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Boolean,
    /// 32-bit signed integer.
    Integer,
    /// 64-bit signed integer.
    Bigint,
    /// 32-bit floating point.
    Real,
    /// 64-bit floating point.
    Double,
    Varchar,
    Array,
    #[default]
    Unknown,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeKind::Boolean => "BOOLEAN",
            TypeKind::Integer => "INTEGER",
            TypeKind::Bigint => "BIGINT",
            TypeKind::Real => "REAL",
            TypeKind::Double => "DOUBLE",
            TypeKind::Varchar => "VARCHAR",
            TypeKind::Array => "ARRAY",
            TypeKind::Unknown => "UNKNOWN",
        };
        write!(f, "{}", name)
    }
}

/// A flat row schema: parallel lists of column names and type kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowType {
    names: Vec<String>,
    kinds: Vec<TypeKind>,
}

impl RowType {
    /// Build a row type from parallel name/kind lists.
    ///
    /// The lists must have equal length.
    pub fn new(names: Vec<String>, kinds: Vec<TypeKind>) -> Self {
        assert_eq!(
            names.len(),
            kinds.len(),
            "row type requires one kind per column name"
        );
        Self { names, kinds }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn size(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn kinds(&self) -> &[TypeKind] {
        &self.kinds
    }

    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn kind_of(&self, index: usize) -> Option<TypeKind> {
        self.kinds.get(index).copied()
    }

    /// Concatenate two row types, e.g. to form a join's output schema.
    pub fn concat(&self, other: &RowType) -> RowType {
        let mut names = Vec::with_capacity(self.size() + other.size());
        names.extend(self.names.iter().cloned());
        names.extend(other.names.iter().cloned());
        let mut kinds = Vec::with_capacity(self.size() + other.size());
        kinds.extend_from_slice(&self.kinds);
        kinds.extend_from_slice(&other.kinds);
        RowType::new(names, kinds)
    }
}

impl fmt::Display for RowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ROW(")?;
        for (i, (name, kind)) in self.names.iter().zip(&self.kinds).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", name, kind)?;
        }
        write!(f, ")")
    }
}
