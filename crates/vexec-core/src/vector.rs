//! Literal-backed columnar vectors.
//!
//! Virtual tables carry their data inline in the plan; conversion
//! materializes the literals into these owned column vectors. Every slot is
//! optional so NULLs survive the round trip.

use crate::types::{RowType, TypeKind};
use crate::variant::Variant;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VectorError {
    #[error("cannot place {value} value into {column} column")]
    KindMismatch { value: TypeKind, column: TypeKind },
    #[error("column vectors are not supported for {0} columns")]
    UnsupportedType(TypeKind),
    #[error("row vector expects {expected} columns of {size} values, got {actual}")]
    Shape {
        expected: usize,
        size: usize,
        actual: usize,
    },
}

/// One column of literal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnVector {
    Boolean(Vec<Option<bool>>),
    Integer(Vec<Option<i32>>),
    Bigint(Vec<Option<i64>>),
    Double(Vec<Option<f64>>),
    Varchar(Vec<Option<String>>),
}

impl ColumnVector {
    pub fn len(&self) -> usize {
        match self {
            ColumnVector::Boolean(v) => v.len(),
            ColumnVector::Integer(v) => v.len(),
            ColumnVector::Bigint(v) => v.len(),
            ColumnVector::Double(v) => v.len(),
            ColumnVector::Varchar(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialize a column of the given kind from literal variants.
    ///
    /// NULL variants become NULL slots; 32-bit integers widen into BIGINT
    /// columns. Any other kind mismatch is an error.
    pub fn from_variants(kind: TypeKind, values: &[Variant]) -> Result<Self, VectorError> {
        fn slot<T>(
            value: &Variant,
            column: TypeKind,
            extract: impl Fn(&Variant) -> Option<T>,
        ) -> Result<Option<T>, VectorError> {
            if value.is_null() {
                return Ok(None);
            }
            extract(value).map(Some).ok_or(VectorError::KindMismatch {
                value: value.kind(),
                column,
            })
        }

        match kind {
            TypeKind::Boolean => values
                .iter()
                .map(|v| {
                    slot(v, kind, |v| match v {
                        Variant::Bool(b) => Some(*b),
                        _ => None,
                    })
                })
                .collect::<Result<_, _>>()
                .map(ColumnVector::Boolean),
            TypeKind::Integer => values
                .iter()
                .map(|v| {
                    slot(v, kind, |v| match v {
                        Variant::I32(i) => Some(*i),
                        _ => None,
                    })
                })
                .collect::<Result<_, _>>()
                .map(ColumnVector::Integer),
            TypeKind::Bigint => values
                .iter()
                .map(|v| slot(v, kind, Variant::as_bigint))
                .collect::<Result<_, _>>()
                .map(ColumnVector::Bigint),
            TypeKind::Double => values
                .iter()
                .map(|v| slot(v, kind, Variant::as_double))
                .collect::<Result<_, _>>()
                .map(ColumnVector::Double),
            TypeKind::Varchar => values
                .iter()
                .map(|v| slot(v, kind, |v| v.as_utf8().map(str::to_string)))
                .collect::<Result<_, _>>()
                .map(ColumnVector::Varchar),
            other => Err(VectorError::UnsupportedType(other)),
        }
    }
}

/// A batch of rows stored column-wise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowVector {
    pub row_type: RowType,
    pub size: usize,
    pub columns: Vec<ColumnVector>,
}

impl RowVector {
    /// Assemble a row vector, checking that there is one column vector per
    /// schema column and that all columns have the same length.
    pub fn new(row_type: RowType, columns: Vec<ColumnVector>) -> Result<Self, VectorError> {
        if columns.len() != row_type.size() {
            return Err(VectorError::Shape {
                expected: row_type.size(),
                size: 0,
                actual: columns.len(),
            });
        }
        let size = columns.first().map_or(0, ColumnVector::len);
        for column in &columns {
            if column.len() != size {
                return Err(VectorError::Shape {
                    expected: row_type.size(),
                    size,
                    actual: column.len(),
                });
            }
        }
        Ok(RowVector {
            row_type,
            size,
            columns,
        })
    }
}
